// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use thiserror::Error;

/// Errors raised while building or executing ParadeDB queries.
///
/// Construction and resolution problems are split the same way callers reason
/// about them: [`SearchError::InvalidValue`] for bad values, cardinality or
/// operator compatibility, [`SearchError::InvalidTerm`] for term kinds that
/// cannot be combined in one expression.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("{0}")]
    InvalidValue(String),
    #[error("{0}")]
    InvalidTerm(String),
    #[error("{0}")]
    Precondition(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SearchError {
    pub(crate) fn value(msg: impl Into<String>) -> Self {
        SearchError::InvalidValue(msg.into())
    }

    pub(crate) fn term(msg: impl Into<String>) -> Self {
        SearchError::InvalidTerm(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        SearchError::Precondition(msg.into())
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;
