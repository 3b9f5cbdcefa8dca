//! Row-level error types for the ingestion pipeline.
//!
//! Batch-level failures travel as `anyhow::Error`; the types here only cover
//! what a single row can do wrong, so the loader can tell a skipped row from a
//! failure that has to roll the whole batch back.

use serde::Serialize;
use thiserror::Error;

/// Recoverable reasons for dropping one row.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The position code is not in the positions table.
    #[error("unknown position code `{0}`")]
    UnknownPosition(String),

    /// A required identity column is absent or blank.
    #[error("missing required column `{0}`")]
    MissingField(&'static str),

    /// An identity column holds a value that cannot be interpreted.
    #[error("invalid value `{value}` in column `{column}`")]
    InvalidField { column: &'static str, value: String },
}

/// Outcome of processing one row that did not succeed.
#[derive(Error, Debug)]
pub enum RowError {
    #[error(transparent)]
    Skip(#[from] SkipReason),

    /// Storage failures abort the batch.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),
}

/// A row the loader dropped, with its zero-based index in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    pub row_index: usize,
    pub player_name: Option<String>,
    pub reason: SkipReason,
}
