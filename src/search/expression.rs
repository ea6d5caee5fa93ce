//! ParadeDB expression and operator resolver
//!
//! A [`ParadeDb`] holds one or more [`SearchTerm`]s plus optional
//! expression-level modifiers. Resolution picks the single infix operator for
//! the whole expression and renders each operand:
//!
//! ```text
//! description &&& 'shoes'
//! description ||| ARRAY['wireless', 'bluetooth']
//! description ### 'running shoes'::pdb.slop(1)
//! description @@@ pdb.parse('running AND shoes')
//! ```
//!
//! Only one family of term kinds may appear per expression. Families are
//! checked in a fixed order (PQ, query functions, phrases, proximity, fuzzy,
//! plain strings) and the first family present decides what the rest must be.

use std::fmt;

use super::terms::{MatchOperator, Pq, PqOperator, Scoring, SearchTerm, TermFamily};
use crate::error::{Result, SearchError};
use crate::sql::{quote_literal, require_identifier};

/// Infix operators understood by `pg_search`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOperator {
    /// `&&&` every token must match
    MatchAll,
    /// `|||` any token may match
    MatchAny,
    /// `###`
    Phrase,
    /// `===` exact token
    Term,
    /// `@@@` query-function predicate
    Query,
}

impl SearchOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchOperator::MatchAll => "&&&",
            SearchOperator::MatchAny => "|||",
            SearchOperator::Phrase => "###",
            SearchOperator::Term => "===",
            SearchOperator::Query => "@@@",
        }
    }
}

impl From<MatchOperator> for SearchOperator {
    fn from(op: MatchOperator) -> Self {
        match op {
            MatchOperator::And => SearchOperator::MatchAll,
            MatchOperator::Or => SearchOperator::MatchAny,
            MatchOperator::Term => SearchOperator::Term,
        }
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator plus rendered operands, ready to follow a column reference.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub operator: SearchOperator,
    pub operands: Vec<String>,
    /// Applied to the whole `ARRAY[...]` when there is more than one operand.
    pub array_suffix: String,
}

impl Resolved {
    /// `<lhs> <op> <operand>` or `<lhs> <op> ARRAY[...]`.
    pub fn to_sql(&self, lhs: &str) -> String {
        match self.operands.as_slice() {
            [single] => format!("{lhs} {} {single}", self.operator),
            many => format!(
                "{lhs} {} ARRAY[{}]{}",
                self.operator,
                many.join(", "),
                self.array_suffix
            ),
        }
    }
}

/// Compiled right-hand side of a ParadeDB search lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ParadeDb {
    terms: Vec<SearchTerm>,
    operator: Option<MatchOperator>,
    tokenizer: Option<String>,
    scoring: Option<Scoring>,
}

impl ParadeDb {
    pub fn new<I, T>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<SearchTerm>,
    {
        let terms: Vec<SearchTerm> = terms.into_iter().map(Into::into).collect();
        if terms.is_empty() {
            return Err(SearchError::value("ParadeDB requires at least one search term."));
        }
        Ok(Self {
            terms,
            operator: None,
            tokenizer: None,
            scoring: None,
        })
    }

    /// Single-term expression.
    pub fn term(term: impl Into<SearchTerm>) -> Self {
        Self {
            terms: vec![term.into()],
            operator: None,
            tokenizer: None,
            scoring: None,
        }
    }

    pub fn with_operator(mut self, operator: MatchOperator) -> Result<Self> {
        self.require_plain("operator")?;
        self.operator = Some(operator);
        Ok(self)
    }

    pub fn with_tokenizer(mut self, tokenizer: impl Into<String>) -> Result<Self> {
        let tokenizer = tokenizer.into();
        self.require_plain("tokenizer")?;
        require_identifier(&tokenizer, "tokenizer")?;
        self.tokenizer = Some(tokenizer);
        Ok(self)
    }

    pub fn with_boost(mut self, value: f64) -> Result<Self> {
        self.require_plain("boost")?;
        Scoring::assign(&mut self.scoring, Scoring::boost(value)?)?;
        Ok(self)
    }

    pub fn with_const(mut self, value: f64) -> Result<Self> {
        self.require_plain("const")?;
        Scoring::assign(&mut self.scoring, Scoring::constant(value)?)?;
        Ok(self)
    }

    pub fn terms(&self) -> &[SearchTerm] {
        &self.terms
    }

    fn require_plain(&self, what: &str) -> Result<()> {
        if self.terms.iter().all(|t| t.family() == TermFamily::Text) {
            Ok(())
        } else {
            Err(SearchError::value(format!(
                "ParadeDB {what} is only supported with plain string terms."
            )))
        }
    }

    /// Pick the operator and render operands.
    pub fn resolve(&self) -> Result<Resolved> {
        let has = |family: TermFamily| self.terms.iter().any(|t| t.family() == family);

        if has(TermFamily::Pq) {
            return self.resolve_pq();
        }
        if has(TermFamily::Query) {
            return self.resolve_query();
        }
        if has(TermFamily::Phrase) {
            return self.resolve_phrases();
        }
        if has(TermFamily::Proximity) {
            return self.resolve_proximity();
        }
        if has(TermFamily::Fuzzy) {
            return self.resolve_fuzzy();
        }
        self.resolve_text()
    }

    /// Full predicate with `lhs` as the searched column.
    pub fn to_sql(&self, lhs: &str) -> Result<String> {
        let resolved = self.resolve()?;
        let sql = resolved.to_sql(lhs);
        tracing::debug!(sql = %sql, "Compiled ParadeDB expression");
        Ok(sql)
    }

    fn resolve_pq(&self) -> Result<Resolved> {
        let pq: &Pq = match self.terms.as_slice() {
            [SearchTerm::Pq(pq)] => pq,
            _ => {
                return Err(SearchError::value(
                    "PQ objects must be provided as the sole ParadeDB input.",
                ))
            }
        };
        let operator = match pq.operator() {
            Some(PqOperator::Or) => SearchOperator::MatchAny,
            Some(PqOperator::And) | None => SearchOperator::MatchAll,
        };
        Ok(Resolved {
            operator,
            operands: pq.terms().iter().map(|t| quote_literal(t)).collect(),
            array_suffix: String::new(),
        })
    }

    fn resolve_query(&self) -> Result<Resolved> {
        let operand = match self.terms.as_slice() {
            [only] => only.query_sql(),
            _ => None,
        }
        .ok_or_else(|| SearchError::value("Parse/Term/Regex/All queries must be a single term."))?;
        Ok(Resolved {
            operator: SearchOperator::Query,
            operands: vec![operand],
            array_suffix: String::new(),
        })
    }

    fn resolve_phrases(&self) -> Result<Resolved> {
        let operands = self
            .terms
            .iter()
            .map(|term| match term {
                SearchTerm::Phrase(phrase) => Ok(phrase.to_sql()),
                _ => Err(SearchError::term("Phrase searches only accept Phrase terms.")),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Resolved {
            operator: SearchOperator::Phrase,
            operands,
            array_suffix: String::new(),
        })
    }

    fn resolve_proximity(&self) -> Result<Resolved> {
        let mut proximities = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            match term {
                SearchTerm::Proximity(p) => proximities.push(p),
                _ => {
                    return Err(SearchError::term(
                        "Proximity searches only accept Proximity terms.",
                    ))
                }
            }
        }
        if proximities.windows(2).any(|w| w[0].is_ordered() != w[1].is_ordered()) {
            return Err(SearchError::value(
                "All Proximity terms must use the same ordered setting.",
            ));
        }
        Ok(Resolved {
            operator: SearchOperator::Query,
            operands: proximities.iter().map(|p| p.to_sql()).collect(),
            array_suffix: String::new(),
        })
    }

    fn resolve_fuzzy(&self) -> Result<Resolved> {
        let mut operator: Option<MatchOperator> = None;
        let mut operands = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let fuzzy = match term {
                SearchTerm::Fuzzy(f) => f,
                _ => return Err(SearchError::term("Fuzzy searches only accept Fuzzy terms.")),
            };
            let effective = fuzzy.effective_operator();
            match operator {
                Some(existing) if existing != effective => {
                    return Err(SearchError::value("All Fuzzy terms must use the same operator."))
                }
                _ => operator = Some(effective),
            }
            operands.push(fuzzy.to_sql());
        }
        Ok(Resolved {
            operator: operator.unwrap_or(MatchOperator::Or).into(),
            operands,
            array_suffix: String::new(),
        })
    }

    fn resolve_text(&self) -> Result<Resolved> {
        let tokenizer = self
            .tokenizer
            .as_ref()
            .map(|t| format!("::pdb.{t}"))
            .unwrap_or_default();
        let scoring = self.scoring.as_ref().map(Scoring::suffix).unwrap_or_default();

        let mut operands = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            match term {
                SearchTerm::Text(text) => {
                    operands.push(format!("{}{tokenizer}", quote_literal(text)));
                }
                _ => return Err(SearchError::term("ParadeDB terms must be strings.")),
            }
        }

        // Score casts have no per-element form inside an array.
        let array_suffix = if operands.len() == 1 {
            operands[0].push_str(&scoring);
            String::new()
        } else {
            scoring
        };

        Ok(Resolved {
            operator: self.operator.unwrap_or(MatchOperator::And).into(),
            operands,
            array_suffix,
        })
    }
}
