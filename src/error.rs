use std::io;

use thiserror::Error;

/// Errors surfaced by the engine.
///
/// Per-row and per-column problems (arity mismatches, invalid regex patterns)
/// are never returned through this type; they are counted and reported as
/// warning events instead.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The input contained zero bytes.
    #[error("Input is empty (0 bytes)")]
    EmptyInput,

    /// Every decoding strategy failed.
    #[error("Failed to decode input: {0}")]
    Decode(String),

    /// The header line could not be split into any column.
    #[error("No columns found in header line: {0}")]
    StructuralParse(String),

    /// The load deadline passed. Only used to label the degraded-completion warning.
    #[error("Processing exceeded {0} second(s)")]
    ProcessingTimeout(u64),

    #[error("Column '{0}' not found")]
    UnknownColumn(String),

    #[error("No dataset loaded")]
    NotLoaded,

    #[error("No rows to export")]
    NothingToExport,

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Stable identifier used in `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::EmptyInput => "empty_input",
            EngineError::Decode(_) => "decode",
            EngineError::StructuralParse(_) => "structural_parse",
            EngineError::ProcessingTimeout(_) => "processing_timeout",
            EngineError::UnknownColumn(_) => "unknown_column",
            EngineError::NotLoaded => "not_loaded",
            EngineError::NothingToExport => "nothing_to_export",
            EngineError::InvalidFilter(_) => "invalid_filter",
            EngineError::Io(_) => "io",
            EngineError::Csv(_) => "csv",
            EngineError::Json(_) => "json",
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
