//! Error types and exit codes for capaian
//!
//! Exit codes:
//! - 0: Success
//! - 1: Generic failure
//! - 2: Usage error (bad flags/args)
//! - 3: Data/store error (invariant violation, missing store, etc.)
//! - 4: Conflict (concurrent modification, caller should retry)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the capaian CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Success (0)
    Success = 0,
    /// Generic failure (1)
    Failure = 1,
    /// Usage error - bad flags/args (2)
    Usage = 2,
    /// Data/store error - invariant violation, missing store (3)
    Data = 3,
    /// Conflict - concurrent modification, retryable (4)
    Conflict = 4,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

/// Errors that can occur during capaian operations
#[derive(Error, Debug)]
pub enum CapaianError {
    // Usage errors (exit code 2)
    #[error("unknown format: {0} (expected: human, json, or records)")]
    UnknownFormat(String),

    #[error("unknown level: {0} (expected: course-outcome, program-outcome, or graduate-profile)")]
    UnknownLevel(String),

    #[error("{0}")]
    UsageError(String),

    // Data/store errors (exit code 3)
    #[error("store not found (searched from {search_root:?})")]
    StoreNotFound { search_root: PathBuf },

    #[error("store already exists at {path:?}")]
    StoreAlreadyExists { path: PathBuf },

    #[error("invalid store: {reason}")]
    InvalidStore { reason: String },

    #[error("unknown {kind}: {id}")]
    UnknownEntity { kind: &'static str, id: String },

    #[error(
        "weight {proposed}% would push the sibling total past 100% (current total: {current_total}%)"
    )]
    WeightOverflow { current_total: f64, proposed: f64 },

    #[error("weight {0}% is outside the allowed range 0-100")]
    WeightOutOfRange(f64),

    #[error("score {0} is outside the allowed range 0-100")]
    ScoreOutOfRange(f64),

    #[error("credit hours must be a positive integer (got {0})")]
    CreditOutOfRange(i64),

    #[error("assessment technique {id} still has recorded scores")]
    TechniqueInUse { id: String },

    #[error("no child records exist for {kind} {id}; nothing to compute")]
    MissingDependency { kind: &'static str, id: String },

    // Conflict (exit code 4)
    #[error("inputs changed while recomputing {entity}; retry the request")]
    ConcurrentModification { entity: String },

    // Generic failures (exit code 1)
    #[error("recompute cancelled before persisting")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl CapaianError {
    /// Get the appropriate exit code for this error
    pub fn exit_code(&self) -> ExitCode {
        match self {
            // Usage errors
            CapaianError::UnknownFormat(_)
            | CapaianError::UnknownLevel(_)
            | CapaianError::UsageError(_) => ExitCode::Usage,

            // Data/store errors
            CapaianError::StoreNotFound { .. }
            | CapaianError::StoreAlreadyExists { .. }
            | CapaianError::InvalidStore { .. }
            | CapaianError::UnknownEntity { .. }
            | CapaianError::WeightOverflow { .. }
            | CapaianError::WeightOutOfRange(_)
            | CapaianError::ScoreOutOfRange(_)
            | CapaianError::CreditOutOfRange(_)
            | CapaianError::TechniqueInUse { .. }
            | CapaianError::MissingDependency { .. } => ExitCode::Data,

            // Retryable conflicts
            CapaianError::ConcurrentModification { .. } => ExitCode::Conflict,

            // Generic failures
            CapaianError::Cancelled
            | CapaianError::Io(_)
            | CapaianError::Store(_)
            | CapaianError::Json(_)
            | CapaianError::Toml(_)
            | CapaianError::Other(_) => ExitCode::Failure,
        }
    }

    /// Convert error to JSON representation for structured error output
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.exit_code() as i32,
                "type": self.error_type(),
                "message": self.to_string(),
            }
        })
    }

    /// Get the error type identifier
    fn error_type(&self) -> &'static str {
        match self {
            CapaianError::UnknownFormat(_) => "unknown_format",
            CapaianError::UnknownLevel(_) => "unknown_level",
            CapaianError::UsageError(_) => "usage_error",
            CapaianError::StoreNotFound { .. } => "store_not_found",
            CapaianError::StoreAlreadyExists { .. } => "store_already_exists",
            CapaianError::InvalidStore { .. } => "invalid_store",
            CapaianError::UnknownEntity { .. } => "unknown_entity",
            CapaianError::WeightOverflow { .. } => "weight_overflow",
            CapaianError::WeightOutOfRange(_) => "weight_out_of_range",
            CapaianError::ScoreOutOfRange(_) => "score_out_of_range",
            CapaianError::CreditOutOfRange(_) => "credit_out_of_range",
            CapaianError::TechniqueInUse { .. } => "technique_in_use",
            CapaianError::MissingDependency { .. } => "missing_dependency",
            CapaianError::ConcurrentModification { .. } => "concurrent_modification",
            CapaianError::Cancelled => "cancelled",
            CapaianError::Io(_) => "io_error",
            CapaianError::Store(_) => "store_failure",
            CapaianError::Json(_) => "json_error",
            CapaianError::Toml(_) => "toml_error",
            CapaianError::Other(_) => "other",
        }
    }
}

/// Result type alias for capaian operations
pub type Result<T> = std::result::Result<T, CapaianError>;
