//! Unified error types for monitor-clippy.
//!
//! Library code uses `Error` and `Result<T>`.
//! Binary code (`main.rs`) uses `anyhow` for ergonomic CLI error handling.

use std::path::PathBuf;
use thiserror::Error as ThisError;

/// Unified error type for monitor-clippy library operations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// A call classifier returned a shape the transfer function cannot use
    /// (e.g. a guard constructor whose lock argument does not parse).
    /// Recoverable: the transfer function falls back to the identity.
    #[error("modeling gap: {message}")]
    ModelingGap {
        /// Description of the unusable classification.
        message: String,
    },

    /// A structurally impossible configuration reached the report engine.
    /// Fatal for the affected procedure: indicates a defect in the analyzer.
    #[error("internal invariant broken in `{procname}`: {message}")]
    InternalInvariant {
        /// Procedure whose reporting was aborted.
        procname: String,
        /// What was violated.
        message: String,
    },

    /// A callee summary has not been written yet. The caller treats the
    /// callee as bottom; the scheduler is expected to revisit.
    #[error("missing summary for `{callee}`")]
    MissingSummary {
        /// The callee whose summary was unavailable.
        callee: String,
    },

    /// Configuration file error.
    #[error("configuration error in {}: {message}", path.display())]
    Config {
        /// Path to the problematic configuration file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// Configuration parse error.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Program input parse error.
    #[error("failed to parse program: {0}")]
    ProgramParse(#[from] serde_json::Error),

    /// Unknown check name provided.
    #[error("unknown check: {0}")]
    UnknownCheck(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a modeling-gap error.
    pub fn modeling_gap(message: impl Into<String>) -> Self {
        Self::ModelingGap {
            message: message.into(),
        }
    }

    /// Create an internal-invariant error.
    pub fn internal_invariant(procname: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InternalInvariant {
            procname: procname.into(),
            message: message.into(),
        }
    }

    /// Create a missing-summary error.
    pub fn missing_summary(callee: impl Into<String>) -> Self {
        Self::MissingSummary {
            callee: callee.into(),
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an unknown check error.
    pub fn unknown_check(name: impl Into<String>) -> Self {
        Self::UnknownCheck(name.into())
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Result type alias for monitor-clippy library operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::other(err.to_string())
    }
}

/// Convenience macro mirroring `anyhow::bail!` but returning `Error`.
#[macro_export]
macro_rules! mclippy_bail {
    ($($arg:tt)*) => {
        return Err($crate::error::Error::other(format!($($arg)*)));
    };
}

/// Convenience macro mirroring `anyhow::ensure!`.
#[macro_export]
macro_rules! mclippy_ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::mclippy_bail!($($arg)*);
        }
    };
}
