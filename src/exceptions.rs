//! Error types for metapod file operations

use std::fmt;
use std::path::PathBuf;

use crate::pod::EngineError;

/// Main error type for metapod operations
#[derive(Debug)]
pub enum MetapodError {
    /// Engine rejected the input (carries the catalog code)
    Engine(EngineError),

    /// Input file does not exist
    FileNotFound(PathBuf),

    /// Output file exists and overwriting was not requested
    OutputExists(PathBuf),

    /// Template has no certificate table but a signed template was required
    Unsigned(PathBuf),

    /// Post-write verification did not read back what was written
    VerificationFailed(String),

    /// IO error
    IoError(std::io::Error),

    /// JSON serialization error
    JsonError(serde_json::Error),

    /// Generic error with message
    Generic(String),
}

impl MetapodError {
    /// Catalog code when the failure came from the engine
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            MetapodError::Engine(err) => Some(err.code()),
            _ => None,
        }
    }
}

impl fmt::Display for MetapodError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetapodError::Engine(err) => write!(f, "MetaPod error: {err}"),
            MetapodError::FileNotFound(path) => {
                write!(f, "Unable to locate {}", path.display())
            }
            MetapodError::OutputExists(path) => {
                write!(f, "Output file already exists: {}", path.display())
            }
            MetapodError::Unsigned(path) => {
                write!(f, "Template has no certificate table: {}", path.display())
            }
            MetapodError::VerificationFailed(msg) => write!(f, "Verification failed: {msg}"),
            MetapodError::IoError(err) => write!(f, "IO error: {err}"),
            MetapodError::JsonError(err) => write!(f, "JSON error: {err}"),
            MetapodError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for MetapodError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetapodError::Engine(err) => Some(err),
            MetapodError::IoError(err) => Some(err),
            MetapodError::JsonError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EngineError> for MetapodError {
    fn from(err: EngineError) -> Self {
        MetapodError::Engine(err)
    }
}

impl From<std::io::Error> for MetapodError {
    fn from(err: std::io::Error) -> Self {
        MetapodError::IoError(err)
    }
}

impl From<serde_json::Error> for MetapodError {
    fn from(err: serde_json::Error) -> Self {
        MetapodError::JsonError(err)
    }
}

impl From<anyhow::Error> for MetapodError {
    fn from(err: anyhow::Error) -> Self {
        MetapodError::Generic(format!("{err:#}"))
    }
}

/// Result type for metapod operations
pub type Result<T> = std::result::Result<T, MetapodError>;
