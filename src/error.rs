// src/error.rs

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that abort the whole run.
///
/// Anything that goes wrong while analysing a single domain is recorded in
/// that domain's row instead and never shows up here.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("cannot read input file {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write output file {path}: {source}")]
    OutputUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to export results: {0}")]
    Export(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;
