// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter tree
//!
//! WHERE-clause AST. An exact lookup whose right-hand side is a compiled
//! [`ParadeDb`] expression emits the resolved ParadeDB operator instead of
//! `=`; every other lookup binds its value as a `$n` parameter.
//!
//! ```text
//! description &&& 'shoes'                    -- Filter::search
//! category = $1                              -- Filter::eq
//! rating >= $2                               -- Filter::compare
//! (description ||| 'shoes' AND NOT (in_stock = $3))
//! ```

use std::fmt;

use super::expression::ParadeDb;
use super::more_like_this::MoreLikeThis;
use crate::error::Result;
use crate::sql::{quote_ident, SqlParam};

/// Right-hand side of an exact lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Search(ParadeDb),
    Value(SqlParam),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
        };
        f.write_str(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Exact { field: String, rhs: Lookup },
    Compare { field: String, op: Comparison, value: SqlParam },
    MoreLikeThis(MoreLikeThis),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    /// `field <paradedb operator> ...`
    pub fn search(field: impl Into<String>, query: ParadeDb) -> Self {
        Filter::Exact {
            field: field.into(),
            rhs: Lookup::Search(query),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<SqlParam>) -> Self {
        Filter::Exact {
            field: field.into(),
            rhs: Lookup::Value(value.into()),
        }
    }

    pub fn compare(field: impl Into<String>, op: Comparison, value: impl Into<SqlParam>) -> Self {
        Filter::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn more_like_this(mlt: MoreLikeThis) -> Self {
        Filter::MoreLikeThis(mlt)
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(vec![self, other])
    }

    pub fn or(self, other: Filter) -> Self {
        Filter::Or(vec![self, other])
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// True when any node is a ParadeDB search or MoreLikeThis predicate.
    pub fn contains_search(&self) -> bool {
        match self {
            Filter::Exact { rhs, .. } => matches!(rhs, Lookup::Search(_)),
            Filter::MoreLikeThis(_) => true,
            Filter::Compare { .. } => false,
            Filter::And(nodes) | Filter::Or(nodes) => nodes.iter().any(Filter::contains_search),
            Filter::Not(inner) => inner.contains_search(),
        }
    }

    /// Render this filter; `key_field` is the left side of MoreLikeThis.
    pub fn to_sql(&self, key_field: &str, params: &mut Vec<SqlParam>) -> Result<String> {
        match self {
            Filter::Exact { field, rhs } => {
                let lhs = quote_ident(field);
                match rhs {
                    Lookup::Search(query) => query.to_sql(&lhs),
                    Lookup::Value(value) => {
                        params.push(value.clone());
                        Ok(format!("{lhs} = ${}", params.len()))
                    }
                }
            }
            Filter::Compare { field, op, value } => {
                params.push(value.clone());
                Ok(format!("{} {op} ${}", quote_ident(field), params.len()))
            }
            Filter::MoreLikeThis(mlt) => Ok(mlt.to_sql(key_field, params)),
            Filter::And(nodes) => Self::join(nodes, " AND ", key_field, params),
            Filter::Or(nodes) => Self::join(nodes, " OR ", key_field, params),
            Filter::Not(inner) => Ok(format!("NOT ({})", inner.to_sql(key_field, params)?)),
        }
    }

    fn join(
        nodes: &[Filter],
        separator: &str,
        key_field: &str,
        params: &mut Vec<SqlParam>,
    ) -> Result<String> {
        let parts = nodes
            .iter()
            .map(|n| n.to_sql(key_field, params))
            .collect::<Result<Vec<_>>>()?;
        Ok(match parts.len() {
            0 => "TRUE".to_string(),
            1 => parts.into_iter().collect(),
            _ => format!("({})", parts.join(separator)),
        })
    }
}
