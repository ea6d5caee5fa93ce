// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search terms
//!
//! Immutable value types for each ParadeDB query kind. Every term validates
//! itself when built, so anything that reaches the resolver in
//! [`super::expression`] is already well-formed on its own.
//!
//! # Rendered forms
//!
//! ```text
//! 'running shoes'::pdb.slop(2)::pdb.whitespace     -- Phrase
//! 'sheos'::pdb.fuzzy(1, t)                           -- Fuzzy (prefix)
//! pdb.proximity('running' ## 2 ## 'shoes')           -- Proximity
//! pdb.parse('running AND shoes', lenient => true)    -- Parse
//! pdb.term('shoes')::pdb.boost(2.0)                  -- Term
//! pdb.phrase_prefix(ARRAY['running', 'sh'])          -- PhrasePrefix
//! pdb.range_term('(10, 12]'::int4range, 'Intersects') -- RangeTerm
//! ```

use std::fmt;
use std::ops::{BitAnd, BitOr};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::sql::{format_float, quote_literal, require_identifier, Literal};

/// Largest boost magnitude ParadeDB accepts.
pub const MAX_BOOST: f64 = 2048.0;

/// Maximum fuzzy edit distance.
pub const MAX_FUZZY_DISTANCE: u8 = 2;

/// Score modifier attached to a term or expression
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Scoring {
    Boost(f64),
    Const(f64),
}

impl Scoring {
    pub fn boost(value: f64) -> Result<Self> {
        if !value.is_finite() || value.abs() > MAX_BOOST {
            return Err(SearchError::value(format!(
                "boost must be between -{MAX_BOOST} and {MAX_BOOST}, got {value}."
            )));
        }
        Ok(Scoring::Boost(value))
    }

    pub fn constant(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(SearchError::value(format!("const must be a finite number, got {value}.")));
        }
        Ok(Scoring::Const(value))
    }

    /// Cast suffix, e.g. `::pdb.boost(2.0)`.
    pub fn suffix(&self) -> String {
        match self {
            Scoring::Boost(v) => format!("::pdb.boost({})", format_float(*v)),
            Scoring::Const(v) => format!("::pdb.const({})", format_float(*v)),
        }
    }

    /// Store `next` in `slot`, refusing to replace a boost with a const or vice versa.
    pub(crate) fn assign(slot: &mut Option<Scoring>, next: Scoring) -> Result<()> {
        match (slot.as_ref(), next) {
            (Some(Scoring::Boost(_)), Scoring::Const(_))
            | (Some(Scoring::Const(_)), Scoring::Boost(_)) => {
                Err(SearchError::value("boost and const are mutually exclusive."))
            }
            _ => {
                *slot = Some(next);
                Ok(())
            }
        }
    }
}

pub(crate) fn scoring_suffix(scoring: &Option<Scoring>) -> String {
    scoring.as_ref().map(Scoring::suffix).unwrap_or_default()
}

/// Generates `boost`/`constant` builder methods for terms with a `scoring` slot.
macro_rules! scoring_builders {
    ($ty:ty) => {
        impl $ty {
            pub fn boost(mut self, value: f64) -> Result<Self> {
                Scoring::assign(&mut self.scoring, Scoring::boost(value)?)?;
                Ok(self)
            }

            pub fn constant(mut self, value: f64) -> Result<Self> {
                Scoring::assign(&mut self.scoring, Scoring::constant(value)?)?;
                Ok(self)
            }

            pub fn scoring(&self) -> Option<Scoring> {
                self.scoring
            }
        }
    };
}

/// Match operator for plain strings and fuzzy terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchOperator {
    And,
    Or,
    Term,
}

impl std::str::FromStr for MatchOperator {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AND" => Ok(MatchOperator::And),
            "OR" => Ok(MatchOperator::Or),
            "TERM" => Ok(MatchOperator::Term),
            _ => Err(SearchError::value("ParadeDB operator must be 'AND', 'OR', or 'TERM'.")),
        }
    }
}

impl fmt::Display for MatchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchOperator::And => write!(f, "AND"),
            MatchOperator::Or => write!(f, "OR"),
            MatchOperator::Term => write!(f, "TERM"),
        }
    }
}

/// Phrase search (`###`)
#[derive(Debug, Clone, PartialEq)]
pub struct Phrase {
    text: String,
    slop: Option<u32>,
    tokenizer: Option<String>,
    scoring: Option<Scoring>,
}

impl Phrase {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            slop: None,
            tokenizer: None,
            scoring: None,
        }
    }

    /// Maximum number of intervening tokens between phrase words.
    pub fn slop(mut self, slop: i64) -> Result<Self> {
        let slop = u32::try_from(slop)
            .map_err(|_| SearchError::value("Phrase slop must be zero or positive."))?;
        self.slop = Some(slop);
        Ok(self)
    }

    pub fn tokenizer(mut self, tokenizer: impl Into<String>) -> Result<Self> {
        let tokenizer = tokenizer.into();
        require_identifier(&tokenizer, "Phrase tokenizer")?;
        self.tokenizer = Some(tokenizer);
        Ok(self)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn to_sql(&self) -> String {
        let mut sql = quote_literal(&self.text);
        if let Some(slop) = self.slop {
            sql.push_str(&format!("::pdb.slop({slop})"));
        }
        if let Some(tokenizer) = &self.tokenizer {
            sql.push_str(&format!("::pdb.{tokenizer}"));
        }
        sql.push_str(&scoring_suffix(&self.scoring));
        sql
    }
}

scoring_builders!(Phrase);

/// Fuzzy match with an edit-distance budget.
///
/// Carries a boost only; a constant score on a fuzzy term has no SQL form.
#[derive(Debug, Clone, PartialEq)]
pub struct Fuzzy {
    text: String,
    distance: u8,
    prefix: bool,
    transposition_cost_one: bool,
    operator: Option<MatchOperator>,
    boost: Option<f64>,
}

impl Fuzzy {
    /// Fuzzy term with the default distance of 1.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            distance: 1,
            prefix: false,
            transposition_cost_one: false,
            operator: None,
            boost: None,
        }
    }

    pub fn distance(mut self, distance: i64) -> Result<Self> {
        if distance < 0 {
            return Err(SearchError::value("Fuzzy distance must be zero or positive."));
        }
        if distance > i64::from(MAX_FUZZY_DISTANCE) {
            return Err(SearchError::value("Fuzzy distance must be <= 2."));
        }
        self.distance = distance as u8;
        Ok(self)
    }

    pub fn prefix(mut self, prefix: bool) -> Self {
        self.prefix = prefix;
        self
    }

    pub fn transposition_cost_one(mut self, enabled: bool) -> Self {
        self.transposition_cost_one = enabled;
        self
    }

    pub fn operator(mut self, operator: MatchOperator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn boost(mut self, value: f64) -> Result<Self> {
        Scoring::boost(value)?;
        self.boost = Some(value);
        Ok(self)
    }

    /// Operator this term resolves to; unset means OR.
    pub fn effective_operator(&self) -> MatchOperator {
        self.operator.unwrap_or(MatchOperator::Or)
    }

    pub fn to_sql(&self) -> String {
        let flags = match (self.prefix, self.transposition_cost_one) {
            (false, false) => String::new(),
            (true, false) => ", t".to_string(),
            (false, true) => ", f, t".to_string(),
            (true, true) => ", t, t".to_string(),
        };
        let mut sql = format!(
            "{}::pdb.fuzzy({}{})",
            quote_literal(&self.text),
            self.distance,
            flags
        );
        if let Some(boost) = self.boost {
            sql.push_str(&Scoring::Boost(boost).suffix());
        }
        sql
    }
}

/// Proximity search between the whitespace-separated words of one text.
#[derive(Debug, Clone, PartialEq)]
pub struct Proximity {
    words: Vec<String>,
    distance: u32,
    ordered: bool,
    scoring: Option<Scoring>,
}

impl Proximity {
    pub fn new(text: &str, distance: i64) -> Result<Self> {
        let distance = u32::try_from(distance)
            .map_err(|_| SearchError::value("Proximity distance must be zero or positive."))?;
        let words: Vec<String> = text.split_whitespace().map(str::to_string).collect();
        if words.len() < 2 {
            return Err(SearchError::value(
                "Proximity text must include at least two whitespace-separated terms.",
            ));
        }
        Ok(Self {
            words,
            distance,
            ordered: false,
            scoring: None,
        })
    }

    /// Require the words to appear in order (`##>`).
    pub fn ordered(mut self, ordered: bool) -> Self {
        self.ordered = ordered;
        self
    }

    pub fn is_ordered(&self) -> bool {
        self.ordered
    }

    pub fn to_sql(&self) -> String {
        let op = if self.ordered { "##>" } else { "##" };
        let separator = format!(" {op} {} {op} ", self.distance);
        let chain = self
            .words
            .iter()
            .map(|w| quote_literal(w))
            .collect::<Vec<_>>()
            .join(&separator);
        format!("pdb.proximity({chain}){}", scoring_suffix(&self.scoring))
    }
}

scoring_builders!(Proximity);

/// Query-string parse (`pdb.parse`)
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
    query: String,
    lenient: Option<bool>,
    conjunction_mode: Option<bool>,
    scoring: Option<Scoring>,
}

impl Parse {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            lenient: None,
            conjunction_mode: None,
            scoring: None,
        }
    }

    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = Some(lenient);
        self
    }

    pub fn conjunction_mode(mut self, conjunction_mode: bool) -> Self {
        self.conjunction_mode = Some(conjunction_mode);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut args = vec![quote_literal(&self.query)];
        if let Some(lenient) = self.lenient {
            args.push(format!("lenient => {lenient}"));
        }
        if let Some(conjunction_mode) = self.conjunction_mode {
            args.push(format!("conjunction_mode => {conjunction_mode}"));
        }
        format!("pdb.parse({}){}", args.join(", "), scoring_suffix(&self.scoring))
    }
}

scoring_builders!(Parse);

/// Exact token match (`pdb.term`)
#[derive(Debug, Clone, PartialEq)]
pub struct Term {
    text: String,
    scoring: Option<Scoring>,
}

impl Term {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            scoring: None,
        }
    }

    pub fn to_sql(&self) -> String {
        format!("pdb.term({}){}", quote_literal(&self.text), scoring_suffix(&self.scoring))
    }
}

scoring_builders!(Term);

#[derive(Debug, Clone, PartialEq)]
pub struct Regex {
    pattern: String,
    scoring: Option<Scoring>,
}

impl Regex {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            scoring: None,
        }
    }

    pub fn to_sql(&self) -> String {
        format!("pdb.regex({}){}", quote_literal(&self.pattern), scoring_suffix(&self.scoring))
    }
}

scoring_builders!(Regex);

/// Match every document (`pdb.all()`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct All;

impl All {
    pub fn to_sql(&self) -> String {
        "pdb.all()".to_string()
    }
}

/// Phrase whose last word is a prefix (`pdb.phrase_prefix`)
#[derive(Debug, Clone, PartialEq)]
pub struct PhrasePrefix {
    terms: Vec<String>,
    max_expansion: Option<u32>,
    scoring: Option<Scoring>,
}

impl PhrasePrefix {
    pub fn new<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let terms: Vec<String> = terms.into_iter().map(Into::into).collect();
        if terms.is_empty() {
            return Err(SearchError::value("PhrasePrefix requires at least one phrase term."));
        }
        Ok(Self {
            terms,
            max_expansion: None,
            scoring: None,
        })
    }

    pub fn max_expansion(mut self, max_expansion: u32) -> Self {
        self.max_expansion = Some(max_expansion);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut args = vec![text_array(&self.terms)];
        if let Some(max) = self.max_expansion {
            args.push(format!("max_expansion => {max}"));
        }
        format!("pdb.phrase_prefix({}){}", args.join(", "), scoring_suffix(&self.scoring))
    }
}

scoring_builders!(PhrasePrefix);

/// Sequence of regex patterns matched as a phrase (`pdb.regex_phrase`)
#[derive(Debug, Clone, PartialEq)]
pub struct RegexPhrase {
    patterns: Vec<String>,
    slop: Option<u32>,
    max_expansions: Option<u32>,
    scoring: Option<Scoring>,
}

impl RegexPhrase {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        if patterns.is_empty() {
            return Err(SearchError::value("RegexPhrase requires at least one regex term."));
        }
        Ok(Self {
            patterns,
            slop: None,
            max_expansions: None,
            scoring: None,
        })
    }

    pub fn slop(mut self, slop: u32) -> Self {
        self.slop = Some(slop);
        self
    }

    pub fn max_expansions(mut self, max_expansions: u32) -> Self {
        self.max_expansions = Some(max_expansions);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut args = vec![text_array(&self.patterns)];
        if let Some(slop) = self.slop {
            args.push(format!("slop => {slop}"));
        }
        if let Some(max) = self.max_expansions {
            args.push(format!("max_expansions => {max}"));
        }
        format!("pdb.regex_phrase({}){}", args.join(", "), scoring_suffix(&self.scoring))
    }
}

scoring_builders!(RegexPhrase);

/// How a range term relates to an indexed range column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeRelation {
    Intersects,
    Contains,
    Within,
}

impl fmt::Display for RangeRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeRelation::Intersects => write!(f, "Intersects"),
            RangeRelation::Contains => write!(f, "Contains"),
            RangeRelation::Within => write!(f, "Within"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RangeValue {
    Scalar(Literal),
    Range {
        literal: String,
        range_type: String,
        relation: RangeRelation,
    },
}

/// Match against range-typed columns (`pdb.range_term`)
#[derive(Debug, Clone, PartialEq)]
pub struct RangeTerm {
    value: RangeValue,
    scoring: Option<Scoring>,
}

impl RangeTerm {
    /// Documents whose range contains `value`.
    pub fn value(value: impl Into<Literal>) -> Self {
        Self {
            value: RangeValue::Scalar(value.into()),
            scoring: None,
        }
    }

    /// Documents whose range relates to `literal` (e.g. `(10, 12]`) as `relation`.
    pub fn range(
        literal: impl Into<String>,
        range_type: impl Into<String>,
        relation: RangeRelation,
    ) -> Result<Self> {
        let range_type = range_type.into();
        require_identifier(&range_type, "RangeTerm range_type")?;
        Ok(Self {
            value: RangeValue::Range {
                literal: literal.into(),
                range_type,
                relation,
            },
            scoring: None,
        })
    }

    pub fn to_sql(&self) -> String {
        let args = match &self.value {
            RangeValue::Scalar(value) => value.to_sql(),
            RangeValue::Range {
                literal,
                range_type,
                relation,
            } => format!(
                "{}::{range_type}, {}",
                quote_literal(literal),
                quote_literal(&relation.to_string())
            ),
        };
        format!("pdb.range_term({args}){}", scoring_suffix(&self.scoring))
    }
}

scoring_builders!(RangeTerm);

/// Boolean operator joining the strings of a [`Pq`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PqOperator {
    And,
    Or,
}

/// Boolean combination of plain terms: `Pq::new("a") | Pq::new("b")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Pq {
    terms: Vec<String>,
    operator: Option<PqOperator>,
}

impl Pq {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            terms: vec![term.into()],
            operator: None,
        }
    }

    pub fn or(self, other: Pq) -> Result<Pq> {
        self.combine(PqOperator::Or, other)
    }

    pub fn and(self, other: Pq) -> Result<Pq> {
        self.combine(PqOperator::And, other)
    }

    fn combine(self, operator: PqOperator, other: Pq) -> Result<Pq> {
        for side in [self.operator, other.operator].into_iter().flatten() {
            if side != operator {
                return Err(SearchError::value("Mixed PQ operators are not supported yet."));
            }
        }
        let mut terms = self.terms;
        terms.extend(other.terms);
        Ok(Pq {
            terms,
            operator: Some(operator),
        })
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn operator(&self) -> Option<PqOperator> {
        self.operator
    }
}

impl BitOr for Pq {
    type Output = Result<Pq>;

    fn bitor(self, rhs: Pq) -> Result<Pq> {
        self.or(rhs)
    }
}

impl BitAnd for Pq {
    type Output = Result<Pq>;

    fn bitand(self, rhs: Pq) -> Result<Pq> {
        self.and(rhs)
    }
}

/// Any term accepted by [`super::ParadeDb`]
#[derive(Debug, Clone, PartialEq)]
pub enum SearchTerm {
    Text(String),
    Phrase(Phrase),
    Fuzzy(Fuzzy),
    Proximity(Proximity),
    Parse(Parse),
    Term(Term),
    Regex(Regex),
    All(All),
    PhrasePrefix(PhrasePrefix),
    RegexPhrase(RegexPhrase),
    RangeTerm(RangeTerm),
    Pq(Pq),
}

/// Mutually exclusive groups of term kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TermFamily {
    Pq,
    Query,
    Phrase,
    Proximity,
    Fuzzy,
    Text,
}

impl SearchTerm {
    pub(crate) fn family(&self) -> TermFamily {
        match self {
            SearchTerm::Pq(_) => TermFamily::Pq,
            SearchTerm::Parse(_)
            | SearchTerm::Term(_)
            | SearchTerm::Regex(_)
            | SearchTerm::All(_)
            | SearchTerm::PhrasePrefix(_)
            | SearchTerm::RegexPhrase(_)
            | SearchTerm::RangeTerm(_) => TermFamily::Query,
            SearchTerm::Phrase(_) => TermFamily::Phrase,
            SearchTerm::Proximity(_) => TermFamily::Proximity,
            SearchTerm::Fuzzy(_) => TermFamily::Fuzzy,
            SearchTerm::Text(_) => TermFamily::Text,
        }
    }

    /// Operand for the query-function family, `None` for other kinds.
    pub(crate) fn query_sql(&self) -> Option<String> {
        match self {
            SearchTerm::Parse(t) => Some(t.to_sql()),
            SearchTerm::Term(t) => Some(t.to_sql()),
            SearchTerm::Regex(t) => Some(t.to_sql()),
            SearchTerm::All(t) => Some(t.to_sql()),
            SearchTerm::PhrasePrefix(t) => Some(t.to_sql()),
            SearchTerm::RegexPhrase(t) => Some(t.to_sql()),
            SearchTerm::RangeTerm(t) => Some(t.to_sql()),
            _ => None,
        }
    }
}

macro_rules! impl_from_term {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for SearchTerm {
                fn from(term: $variant) -> Self {
                    SearchTerm::$variant(term)
                }
            }
        )*
    };
}

impl_from_term!(
    Phrase,
    Fuzzy,
    Proximity,
    Parse,
    Term,
    Regex,
    All,
    PhrasePrefix,
    RegexPhrase,
    RangeTerm,
    Pq
);

impl From<&str> for SearchTerm {
    fn from(text: &str) -> Self {
        SearchTerm::Text(text.to_string())
    }
}

impl From<String> for SearchTerm {
    fn from(text: String) -> Self {
        SearchTerm::Text(text)
    }
}

fn text_array(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| quote_literal(s)).collect();
    format!("ARRAY[{}]", quoted.join(", "))
}
