//! Error taxonomy
//!
//! Setup errors abort the run. Row and job errors are logged where they
//! happen and the run continues without the affected row or job.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised before or while starting the worker pool
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("Specification file does not exist: {0}")]
    CorpusMissing(PathBuf),

    #[error("Failed to read specification file {path}: {source}")]
    CorpusUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Specification file {0} yielded no usable entries")]
    EmptyCorpus(PathBuf),

    #[error("No screenshot could be located for any entry under {0}")]
    NoBatches(PathBuf),

    #[error("Failed to spawn worker {index}: {source}")]
    PoolSpawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Confidence threshold must lie in [0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("Worker pool needs at least one worker")]
    InvalidWorkerCount,

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Malformed specification rows, skipped during extraction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("line {line}: expected at least {expected} fields, found {found}")]
    TooFewFields {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: no confirmed text between the row markers")]
    MissingTargetText { line: usize },

    #[error("line {line}: no String ID in the metadata field")]
    MissingStringId { line: usize },
}

/// Per-job failures, logged and counted but never fatal
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Screenshot not found: {0}")]
    ImageMissing(PathBuf),

    #[error("Recognition failed for {path} ({language_code}): {source}")]
    Recognition {
        path: PathBuf,
        language_code: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Annotation failed for {path}: {source}")]
    Annotation {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}
