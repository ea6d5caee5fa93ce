//! Index diagnostics
//!
//! Thin passthroughs over ParadeDB's table functions. Every optional argument
//! is appended as a named argument only when set, bound with an explicit cast:
//!
//! ```text
//! SELECT * FROM pdb.indexes()
//! SELECT * FROM pdb.index_segments($1::regclass)
//! SELECT * FROM pdb.verify_index($1::regclass, sample_rate => $2::double precision)
//! SELECT * FROM pdb.verify_all_indexes(index_pattern => $1::text)
//! ```

use tracing::info;

use crate::db::{self, JsonRow, SearchBackend};
use crate::error::{Result, SearchError};
use crate::sql::{SqlParam, SqlQuery};

/// Options for `pdb.verify_index`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyIndexOptions {
    pub heapallindexed: bool,
    pub sample_rate: Option<f64>,
    pub report_progress: bool,
    pub verbose: bool,
    pub on_error_stop: bool,
    pub segment_ids: Option<Vec<i32>>,
}

/// Options for `pdb.verify_all_indexes`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyAllOptions {
    /// SQL LIKE pattern over schema names
    pub schema_pattern: Option<String>,
    /// SQL LIKE pattern over index names
    pub index_pattern: Option<String>,
    pub heapallindexed: bool,
    pub sample_rate: Option<f64>,
    pub report_progress: bool,
    pub on_error_stop: bool,
}

pub fn validate_sample_rate(sample_rate: Option<f64>) -> Result<()> {
    match sample_rate {
        Some(rate) if !(0.0..=1.0).contains(&rate) => Err(SearchError::value(
            "--sample-rate must be between 0.0 and 1.0",
        )),
        _ => Ok(()),
    }
}

/// Collects `name => $n::type` arguments.
#[derive(Default)]
struct NamedArgs {
    parts: Vec<String>,
    params: Vec<SqlParam>,
}

impl NamedArgs {
    fn push(&mut self, name: &str, cast: &str, value: SqlParam) {
        self.params.push(value);
        self.parts.push(format!("{name} => ${}::{cast}", self.params.len()));
    }

    fn flag(&mut self, name: &str, enabled: bool) {
        if enabled {
            self.push(name, "boolean", SqlParam::Bool(true));
        }
    }
}

pub fn indexes_sql() -> SqlQuery {
    SqlQuery::new("SELECT * FROM pdb.indexes()", Vec::new())
}

pub fn index_segments_sql(index: &str) -> SqlQuery {
    SqlQuery::new(
        "SELECT * FROM pdb.index_segments($1::regclass)",
        vec![SqlParam::Text(index.to_string())],
    )
}

pub fn verify_index_sql(index: &str, options: &VerifyIndexOptions) -> Result<SqlQuery> {
    validate_sample_rate(options.sample_rate)?;

    let mut args = NamedArgs::default();
    args.params.push(SqlParam::Text(index.to_string()));
    args.parts.push("$1::regclass".to_string());

    args.flag("heapallindexed", options.heapallindexed);
    if let Some(rate) = options.sample_rate {
        args.push("sample_rate", "double precision", SqlParam::Float(rate));
    }
    args.flag("report_progress", options.report_progress);
    args.flag("verbose", options.verbose);
    args.flag("on_error_stop", options.on_error_stop);
    if let Some(ids) = &options.segment_ids {
        args.push("segment_ids", "int[]", SqlParam::IntArray(ids.clone()));
    }

    Ok(SqlQuery::new(
        format!("SELECT * FROM pdb.verify_index({})", args.parts.join(", ")),
        args.params,
    ))
}

pub fn verify_all_indexes_sql(options: &VerifyAllOptions) -> Result<SqlQuery> {
    validate_sample_rate(options.sample_rate)?;

    let mut args = NamedArgs::default();
    if let Some(pattern) = &options.schema_pattern {
        args.push("schema_pattern", "text", SqlParam::Text(pattern.clone()));
    }
    if let Some(pattern) = &options.index_pattern {
        args.push("index_pattern", "text", SqlParam::Text(pattern.clone()));
    }
    args.flag("heapallindexed", options.heapallindexed);
    if let Some(rate) = options.sample_rate {
        args.push("sample_rate", "double precision", SqlParam::Float(rate));
    }
    args.flag("report_progress", options.report_progress);
    args.flag("on_error_stop", options.on_error_stop);

    Ok(SqlQuery::new(
        format!("SELECT * FROM pdb.verify_all_indexes({})", args.parts.join(", ")),
        args.params,
    ))
}

/// Metadata for every BM25 index.
pub async fn indexes<B: SearchBackend + ?Sized>(backend: &B) -> Result<Vec<JsonRow>> {
    info!("Listing BM25 indexes");
    db::execute(backend, "indexes", &indexes_sql()).await
}

pub async fn index_segments<B: SearchBackend + ?Sized>(
    backend: &B,
    index: &str,
) -> Result<Vec<JsonRow>> {
    info!(index, "Listing index segments");
    db::execute(backend, "index_segments", &index_segments_sql(index)).await
}

pub async fn verify_index<B: SearchBackend + ?Sized>(
    backend: &B,
    index: &str,
    options: &VerifyIndexOptions,
) -> Result<Vec<JsonRow>> {
    let query = verify_index_sql(index, options)?;
    info!(index, "Verifying index");
    db::execute(backend, "verify_index", &query).await
}

pub async fn verify_all_indexes<B: SearchBackend + ?Sized>(
    backend: &B,
    options: &VerifyAllOptions,
) -> Result<Vec<JsonRow>> {
    let query = verify_all_indexes_sql(options)?;
    info!(
        schema_pattern = ?options.schema_pattern,
        index_pattern = ?options.index_pattern,
        "Verifying all indexes"
    );
    db::execute(backend, "verify_all_indexes", &query).await
}
