// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Statement execution
//!
//! [`SearchBackend`] is the seam between compiled statements and a live
//! database. [`PgBackend`] runs them on a sqlx `PgPool`, wrapping each one in
//! `row_to_json` so callers always get plain JSON objects regardless of the
//! column types a ParadeDB function returns.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tracing::{debug, info};

use crate::config::ParadeDbConfig;
use crate::error::{Result, SearchError};
use crate::metrics::{self, LatencyTimer};
use crate::sql::{SqlParam, SqlQuery};

/// One result row keyed by column name
pub type JsonRow = Map<String, Value>;

#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn fetch_rows(&self, query: &SqlQuery) -> Result<Vec<JsonRow>>;
}

/// Run `query` on `backend`, recording metrics under `kind`.
pub async fn execute<B: SearchBackend + ?Sized>(
    backend: &B,
    kind: &'static str,
    query: &SqlQuery,
) -> Result<Vec<JsonRow>> {
    let _timer = LatencyTimer::new(kind);
    match backend.fetch_rows(query).await {
        Ok(rows) => {
            metrics::record_statement(kind, "success");
            debug!(kind, rows = rows.len(), "Statement completed");
            Ok(rows)
        }
        Err(e) => {
            metrics::record_statement(kind, "error");
            Err(e)
        }
    }
}

/// PostgreSQL backend on a sqlx pool
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
    statement_log: bool,
}

impl PgBackend {
    pub async fn connect(config: &ParadeDbConfig) -> Result<Self> {
        let url = config.database_url.as_deref().ok_or_else(|| {
            SearchError::precondition("database_url must be set to connect to ParadeDB.")
        })?;
        info!(max_connections = config.max_connections, "Connecting to ParadeDB");

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(url)
            .await?;

        Ok(Self {
            pool,
            statement_log: config.statement_log,
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            statement_log: false,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run a statement that returns no rows (DDL).
    pub async fn execute_statement(&self, sql: &str) -> Result<u64> {
        self.log_statement(sql);
        let done = sqlx::query(sql).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    fn log_statement(&self, sql: &str) {
        if self.statement_log {
            info!(sql = %sql, "Executing statement");
        } else {
            debug!(sql = %sql, "Executing statement");
        }
    }
}

fn bind_param<'q>(
    query: Query<'q, Postgres, PgArguments>,
    param: &SqlParam,
) -> Query<'q, Postgres, PgArguments> {
    match param {
        SqlParam::Text(v) => query.bind(v.clone()),
        SqlParam::Int(v) => query.bind(*v),
        SqlParam::Float(v) => query.bind(*v),
        SqlParam::Bool(v) => query.bind(*v),
        SqlParam::Json(v) => query.bind(v.clone()),
        SqlParam::TextArray(v) => query.bind(v.clone()),
        SqlParam::IntArray(v) => query.bind(v.clone()),
    }
}

#[async_trait]
impl SearchBackend for PgBackend {
    #[tracing::instrument(skip(self, query), fields(params = query.params.len()))]
    async fn fetch_rows(&self, query: &SqlQuery) -> Result<Vec<JsonRow>> {
        if self.statement_log {
            info!(sql = %query.inline(), "Executing statement");
        } else {
            debug!(sql = %query.sql, "Executing statement");
        }

        let wrapped = format!("SELECT row_to_json(q) AS row FROM ({}) AS q", query.sql);
        let mut statement = sqlx::query(&wrapped);
        for param in &query.params {
            statement = bind_param(statement, param);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let value: Value = row.try_get("row")?;
                match value {
                    Value::Object(map) => Ok(map),
                    other => Err(SearchError::value(format!(
                        "Expected a JSON object per row, got {other}"
                    ))),
                }
            })
            .collect()
    }
}
