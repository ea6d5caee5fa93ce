//! SQL fragments
//!
//! Every literal the query compiler inlines goes through [`quote_literal`];
//! every identifier goes through [`quote_ident`]. Values that travel as bound
//! parameters (MoreLikeThis payloads, diagnostics arguments, ordinary
//! comparisons) are collected as [`SqlParam`]s and referenced with PostgreSQL
//! `$n` placeholders.
//!
//! ```text
//! 'it''s'                -- quote_literal("it's")
//! description            -- quote_ident("description")
//! "Order"                -- quote_ident("Order")
//! ```

use serde_json::Value;

use crate::error::{Result, SearchError};

/// Rendered statement with positional placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// Statement text using `$1`, `$2`, ... placeholders
    pub sql: String,
    /// Parameter values in placeholder order
    pub params: Vec<SqlParam>,
}

/// Bound parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Json(Value),
    TextArray(Vec<String>),
    IntArray(Vec<i32>),
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Render the statement with parameters substituted as literals.
    ///
    /// Warning: only for logging and debugging, never for execution.
    pub fn inline(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut rest = self.sql.as_str();
        // One left-to-right pass: substituted values are never rescanned.
        while let Some(pos) = rest.find('$') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            let param = after[..digits]
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| self.params.get(idx));
            match param {
                Some(param) => out.push_str(&param.to_literal()),
                None => {
                    out.push('$');
                    out.push_str(&after[..digits]);
                }
            }
            rest = &after[digits..];
        }
        out.push_str(rest);
        out
    }
}

impl SqlParam {
    /// Literal form of the parameter, used by [`SqlQuery::inline`].
    pub fn to_literal(&self) -> String {
        match self {
            SqlParam::Text(s) => quote_literal(s),
            SqlParam::Int(n) => n.to_string(),
            SqlParam::Float(f) => format_float(*f),
            SqlParam::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            SqlParam::Json(v) => quote_literal(&v.to_string()),
            SqlParam::TextArray(items) => {
                let parts: Vec<String> = items.iter().map(|s| quote_literal(s)).collect();
                format!("ARRAY[{}]", parts.join(", "))
            }
            SqlParam::IntArray(items) => {
                let parts: Vec<String> = items.iter().map(|n| n.to_string()).collect();
                format!("ARRAY[{}]", parts.join(", "))
            }
        }
    }
}

impl From<&str> for SqlParam {
    fn from(value: &str) -> Self {
        SqlParam::Text(value.to_string())
    }
}

impl From<String> for SqlParam {
    fn from(value: String) -> Self {
        SqlParam::Text(value)
    }
}

impl From<i64> for SqlParam {
    fn from(value: i64) -> Self {
        SqlParam::Int(value)
    }
}

impl From<i32> for SqlParam {
    fn from(value: i32) -> Self {
        SqlParam::Int(value.into())
    }
}

impl From<f64> for SqlParam {
    fn from(value: f64) -> Self {
        SqlParam::Float(value)
    }
}

impl From<bool> for SqlParam {
    fn from(value: bool) -> Self {
        SqlParam::Bool(value)
    }
}

/// Inline scalar literal (tokenizer arguments, range terms)
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Literal {
    pub fn to_sql(&self) -> String {
        match self {
            Literal::Null => "NULL".to_string(),
            Literal::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Literal::Int(n) => n.to_string(),
            Literal::Float(f) => format_float(*f),
            Literal::Text(s) => quote_literal(s),
        }
    }

    /// Convert a JSON scalar; arrays and objects have no literal form.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Literal::Null),
            Value::Bool(b) => Ok(Literal::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Literal::Int(i)),
                None => n
                    .as_f64()
                    .map(Literal::Float)
                    .ok_or_else(|| SearchError::value(format!("Unsupported number {n}"))),
            },
            Value::String(s) => Ok(Literal::Text(s.clone())),
            other => Err(SearchError::value(format!(
                "Unsupported literal value {other}; expected a string, number, boolean or null."
            ))),
        }
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Int(value.into())
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

/// Quote text as a SQL string literal by doubling single quotes.
///
/// Escaping is not idempotent: `don''t` becomes `'don''''t'`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// True for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reserved and type/function-name keywords, sorted for `binary_search`.
const RESERVED: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric", "authorization",
    "binary", "both", "case", "cast", "check", "collate", "collation", "column", "concurrently",
    "constraint", "create", "cross", "current_catalog", "current_date", "current_role",
    "current_schema", "current_time", "current_timestamp", "current_user", "default", "deferrable",
    "desc", "distinct", "do", "else", "end", "except", "false", "fetch", "for", "foreign", "freeze",
    "from", "full", "grant", "group", "having", "ilike", "in", "initially", "inner", "intersect",
    "into", "is", "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or", "order",
    "outer", "overlaps", "placing", "primary", "references", "returning", "right", "select",
    "session_user", "similar", "some", "symmetric", "system_user", "table", "tablesample", "then",
    "to", "trailing", "true", "union", "unique", "user", "using", "variadic", "verbose", "when",
    "where", "window", "with",
];

/// Quote an identifier only when PostgreSQL would otherwise fold or reject it.
pub fn quote_ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .map(|c| c.is_ascii_lowercase() || c == '_')
        .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && RESERVED.binary_search(&name).is_err();

    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Quote a possibly schema-qualified name (`public.products`).
pub fn quote_qualified(name: &str) -> String {
    name.split('.').map(quote_ident).collect::<Vec<_>>().join(".")
}

/// Format a float the way score modifiers are written: `2.0`, `1.5`, `-0.25`.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

/// Validate a tokenizer (or cast target) name before it is spliced into SQL.
pub(crate) fn require_identifier(value: &str, what: &str) -> Result<()> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(SearchError::value(format!(
            "{what} must be a valid identifier, got {value:?}."
        )))
    }
}
