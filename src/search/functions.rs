//! Annotation functions
//!
//! Select-list expressions that only make sense alongside a ParadeDB
//! predicate in the same query: BM25 scores, highlighted snippets and
//! `pdb.agg()` aggregates.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Result, SearchError};
use crate::sql::{quote_ident, quote_literal};

/// BM25 score of the matched row (`pdb.score(<key>)`)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Score {
    key_field: Option<String>,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_field(key_field: impl Into<String>) -> Self {
        Self {
            key_field: Some(key_field.into()),
        }
    }

    pub fn to_sql(&self, default_key: &str) -> String {
        format!(
            "pdb.score({})",
            quote_ident(self.key_field.as_deref().unwrap_or(default_key))
        )
    }
}

/// Single highlighted fragment (`pdb.snippet`)
#[derive(Debug, Clone, PartialEq)]
pub struct Snippet {
    field: String,
    start_sel: Option<String>,
    stop_sel: Option<String>,
    max_num_chars: Option<u32>,
}

const DEFAULT_START_SEL: &str = "<b>";
const DEFAULT_STOP_SEL: &str = "</b>";

impl Snippet {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            start_sel: None,
            stop_sel: None,
            max_num_chars: None,
        }
    }

    pub fn start_sel(mut self, sel: impl Into<String>) -> Self {
        self.start_sel = Some(sel.into());
        self
    }

    pub fn stop_sel(mut self, sel: impl Into<String>) -> Self {
        self.stop_sel = Some(sel.into());
        self
    }

    pub fn max_num_chars(mut self, n: u32) -> Self {
        self.max_num_chars = Some(n);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut args = vec![quote_ident(&self.field)];
        // Positional: a later argument needs every earlier one filled in.
        let need_stop = self.stop_sel.is_some() || self.max_num_chars.is_some();
        let need_start = self.start_sel.is_some() || need_stop;
        if need_start {
            args.push(quote_literal(self.start_sel.as_deref().unwrap_or(DEFAULT_START_SEL)));
        }
        if need_stop {
            args.push(quote_literal(self.stop_sel.as_deref().unwrap_or(DEFAULT_STOP_SEL)));
        }
        if let Some(n) = self.max_num_chars {
            args.push(n.to_string());
        }
        format!("pdb.snippet({})", args.join(", "))
    }
}

/// Ordering of fragments returned by [`Snippets`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetSort {
    Score,
    Position,
}

impl FromStr for SnippetSort {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "score" => Ok(SnippetSort::Score),
            "position" => Ok(SnippetSort::Position),
            other => Err(SearchError::value(format!(
                "sort_by must be one of ('score', 'position'), got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SnippetSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnippetSort::Score => write!(f, "score"),
            SnippetSort::Position => write!(f, "position"),
        }
    }
}

/// Every highlighted fragment (`pdb.snippets`)
#[derive(Debug, Clone, PartialEq)]
pub struct Snippets {
    field: String,
    start_tag: Option<String>,
    end_tag: Option<String>,
    max_num_chars: Option<u32>,
    limit: Option<u32>,
    offset: Option<u32>,
    sort_by: Option<SnippetSort>,
}

impl Snippets {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            start_tag: None,
            end_tag: None,
            max_num_chars: None,
            limit: None,
            offset: None,
            sort_by: None,
        }
    }

    pub fn start_tag(mut self, tag: impl Into<String>) -> Self {
        self.start_tag = Some(tag.into());
        self
    }

    pub fn end_tag(mut self, tag: impl Into<String>) -> Self {
        self.end_tag = Some(tag.into());
        self
    }

    pub fn max_num_chars(mut self, n: u32) -> Self {
        self.max_num_chars = Some(n);
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u32) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn sort_by(mut self, sort: SnippetSort) -> Self {
        self.sort_by = Some(sort);
        self
    }

    pub fn to_sql(&self) -> String {
        let mut parts = vec![quote_ident(&self.field)];
        if let Some(tag) = &self.start_tag {
            parts.push(format!("start_tag => {}", quote_literal(tag)));
        }
        if let Some(tag) = &self.end_tag {
            parts.push(format!("end_tag => {}", quote_literal(tag)));
        }
        if let Some(n) = self.max_num_chars {
            parts.push(format!("max_num_chars => {n}"));
        }
        // limit and offset are reserved words
        if let Some(n) = self.limit {
            parts.push(format!("\"limit\" => {n}"));
        }
        if let Some(n) = self.offset {
            parts.push(format!("\"offset\" => {n}"));
        }
        if let Some(sort) = self.sort_by {
            parts.push(format!("sort_by => {}", quote_literal(&sort.to_string())));
        }
        format!("pdb.snippets({})", parts.join(", "))
    }
}

/// Byte offsets of matches (`pdb.snippet_positions`)
#[derive(Debug, Clone, PartialEq)]
pub struct SnippetPositions {
    field: String,
}

impl SnippetPositions {
    pub fn new(field: impl Into<String>) -> Self {
        Self { field: field.into() }
    }

    pub fn to_sql(&self) -> String {
        format!("pdb.snippet_positions({})", quote_ident(&self.field))
    }
}

/// Aggregate over the matched rows (`pdb.agg`)
#[derive(Debug, Clone, PartialEq)]
pub struct Agg {
    spec: String,
    exact: Option<bool>,
    window: bool,
}

impl Agg {
    /// Aggregate from a JSON spec string, passed through as-is.
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            exact: None,
            window: false,
        }
    }

    /// Aggregate from a JSON value, serialized compactly with sorted keys.
    pub fn from_value(spec: &Value) -> Self {
        Self::new(canonical_json(spec))
    }

    /// `false` allows approximate bucket counts.
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = Some(exact);
        self
    }

    /// Render as a window over the whole result (`OVER ()`).
    pub fn over_all(mut self) -> Self {
        self.window = true;
        self
    }

    pub fn spec(&self) -> &str {
        &self.spec
    }

    pub fn to_sql(&self) -> String {
        let literal = quote_literal(&self.spec);
        let call = match self.exact {
            Some(false) => format!("pdb.agg({literal}, false)"),
            _ => format!("pdb.agg({literal})"),
        };
        if self.window {
            format!("{call} OVER ()")
        } else {
            call
        }
    }
}

/// Compact JSON with object keys sorted at every level.
pub(crate) fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Select-list expression attached to a [`super::SearchQuery`]
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Score(Score),
    Snippet(Snippet),
    Snippets(Snippets),
    SnippetPositions(SnippetPositions),
    Agg(Agg),
}

impl Annotation {
    pub fn to_sql(&self, key_field: &str) -> String {
        match self {
            Annotation::Score(s) => s.to_sql(key_field),
            Annotation::Snippet(s) => s.to_sql(),
            Annotation::Snippets(s) => s.to_sql(),
            Annotation::SnippetPositions(s) => s.to_sql(),
            Annotation::Agg(a) => a.to_sql(),
        }
    }
}

impl From<Score> for Annotation {
    fn from(v: Score) -> Self {
        Annotation::Score(v)
    }
}

impl From<Snippet> for Annotation {
    fn from(v: Snippet) -> Self {
        Annotation::Snippet(v)
    }
}

impl From<Snippets> for Annotation {
    fn from(v: Snippets) -> Self {
        Annotation::Snippets(v)
    }
}

impl From<SnippetPositions> for Annotation {
    fn from(v: SnippetPositions) -> Self {
        Annotation::SnippetPositions(v)
    }
}

impl From<Agg> for Annotation {
    fn from(v: Agg) -> Self {
        Annotation::Agg(v)
    }
}
