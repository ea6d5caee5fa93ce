//! ParadeDB command-line tool
//!
//! Index diagnostics print pretty JSON on stdout; logs go to stderr.
//!
//! # Example
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/app paradedb verify-index products_idx \
//!   --heapallindexed --sample-rate 0.1
//! paradedb ddl products_idx.json --table products
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use paradedb_query::diagnostics::{self, VerifyAllOptions, VerifyIndexOptions};
use paradedb_query::{Bm25Index, JsonRow, ParadeDbConfig, PgBackend};
use tracing::info;

/// ParadeDB diagnostics and BM25 index DDL
#[derive(Parser, Debug)]
#[command(name = "paradedb")]
#[command(about = "Inspect ParadeDB BM25 indexes and render their DDL")]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, global = true, env = "DATABASE_URL")]
    database: Option<String>,

    /// Log every executed statement at info level
    #[arg(long, global = true)]
    statement_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List BM25 indexes (pdb.indexes)
    Indexes,

    /// List segments for one BM25 index (pdb.index_segments)
    IndexSegments {
        /// Index name, optionally schema-qualified
        index: String,
    },

    /// Verify one BM25 index (pdb.verify_index)
    VerifyIndex {
        index: String,

        #[command(flatten)]
        checks: CheckArgs,

        /// Emit per-segment detail
        #[arg(long)]
        verbose: bool,

        /// Segment index to verify; repeat to target more than one
        #[arg(long = "segment-id")]
        segment_ids: Vec<i32>,
    },

    /// Verify all BM25 indexes (pdb.verify_all_indexes)
    VerifyAllIndexes {
        /// SQL LIKE pattern to filter schema names
        #[arg(long)]
        schema_pattern: Option<String>,

        /// SQL LIKE pattern to filter index names
        #[arg(long)]
        index_pattern: Option<String>,

        #[command(flatten)]
        checks: CheckArgs,
    },

    /// Render CREATE INDEX for a JSON index declaration
    Ddl {
        /// JSON file with name, key_field and fields
        file: PathBuf,

        /// Table the index is created on
        #[arg(long)]
        table: String,

        /// Single-line output
        #[arg(long)]
        compact: bool,
    },
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Check that all indexed ctids exist in the heap
    #[arg(long)]
    heapallindexed: bool,

    /// Fraction of documents to check (0.0-1.0)
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Emit progress messages while verification runs
    #[arg(long)]
    report_progress: bool,

    /// Stop on the first error found
    #[arg(long)]
    on_error_stop: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::Ddl { file, table, compact } = &cli.command {
        let json = std::fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let statement = Bm25Index::from_json(&json)?.create_statement(table)?;
        if *compact {
            println!("{statement}");
        } else {
            println!("{}", statement.pretty());
        }
        return Ok(());
    }

    // Reject bad input before opening a connection.
    if let Command::VerifyIndex { checks, .. } | Command::VerifyAllIndexes { checks, .. } =
        &cli.command
    {
        diagnostics::validate_sample_rate(checks.sample_rate)?;
    }

    let config = ParadeDbConfig {
        database_url: cli.database.clone(),
        statement_log: cli.statement_log,
        ..Default::default()
    };
    let backend = PgBackend::connect(&config)
        .await
        .context("connecting to ParadeDB (set --database or DATABASE_URL)")?;

    let rows = match cli.command {
        Command::Indexes => diagnostics::indexes(&backend).await?,
        Command::IndexSegments { index } => diagnostics::index_segments(&backend, &index).await?,
        Command::VerifyIndex {
            index,
            checks,
            verbose,
            segment_ids,
        } => {
            let options = VerifyIndexOptions {
                heapallindexed: checks.heapallindexed,
                sample_rate: checks.sample_rate,
                report_progress: checks.report_progress,
                verbose,
                on_error_stop: checks.on_error_stop,
                segment_ids: (!segment_ids.is_empty()).then_some(segment_ids),
            };
            diagnostics::verify_index(&backend, &index, &options).await?
        }
        Command::VerifyAllIndexes {
            schema_pattern,
            index_pattern,
            checks,
        } => {
            let options = VerifyAllOptions {
                schema_pattern,
                index_pattern,
                heapallindexed: checks.heapallindexed,
                sample_rate: checks.sample_rate,
                report_progress: checks.report_progress,
                on_error_stop: checks.on_error_stop,
            };
            diagnostics::verify_all_indexes(&backend, &options).await?
        }
        Command::Ddl { .. } => return Ok(()),
    };

    info!(rows = rows.len(), "Diagnostics complete");
    print_rows(rows)
}

fn print_rows(rows: Vec<JsonRow>) -> anyhow::Result<()> {
    let payload: Vec<serde_json::Value> = rows.into_iter().map(serde_json::Value::Object).collect();
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
