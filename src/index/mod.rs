//! Index DDL
//!
//! - [`bm25`]: `CREATE INDEX ... USING bm25` from a field mapping

pub mod bm25;

pub use bm25::{Bm25Index, CreateIndex, FieldConfig, FieldKind, TokenizerConfig};
