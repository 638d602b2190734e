//! Error catalog for the embed/extract engine
//!
//! Every failure the engine can report has a stable numeric code and a fixed
//! message. The table is a `static` slice: built at compile time, never mutated,
//! safe to read from any thread.

use std::fmt;

/// Failure kinds produced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineError {
    /// Input is empty, not a PE image, or has header fields out of bounds
    InvalidImage,
    /// Payload is empty or whitespace-only
    EmptyPayload,
    /// Payload is larger than `MAX_PAYLOAD_SIZE`
    PayloadTooLarge,
    /// No payload block was located during extraction
    NoPayloadFound,
    /// Magic matched but framing, length or UTF-8 is invalid
    MalformedBlock,
    /// Payload bytes fail the integrity check
    ChecksumMismatch,
    /// Block version is newer than this implementation understands
    UnsupportedVersion,
}

/// One row of the catalog
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub kind: EngineError,
    pub code: i32,
    pub message: &'static str,
}

/// The catalog. Codes 1025 and 1050 keep the values used by earlier native builds.
pub static CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        kind: EngineError::InvalidImage,
        code: 1025,
        message: "input file is not a valid portable executable",
    },
    CatalogEntry {
        kind: EngineError::NoPayloadFound,
        code: 1050,
        message: "unable to locate payload within input file",
    },
    CatalogEntry {
        kind: EngineError::MalformedBlock,
        code: 1051,
        message: "payload block is malformed or truncated",
    },
    CatalogEntry {
        kind: EngineError::ChecksumMismatch,
        code: 1052,
        message: "payload checksum does not match its contents",
    },
    CatalogEntry {
        kind: EngineError::UnsupportedVersion,
        code: 1053,
        message: "payload block version is newer than this reader supports",
    },
    CatalogEntry {
        kind: EngineError::EmptyPayload,
        code: 1060,
        message: "payload cannot be empty or whitespace",
    },
    CatalogEntry {
        kind: EngineError::PayloadTooLarge,
        code: 1061,
        message: "payload exceeds the maximum supported size",
    },
];

/// Returned by [`lookup_message`] for a code the catalog does not define.
///
/// Seeing one means a caller and the engine disagree about the code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownErrorCode(pub i32);

impl fmt::Display for UnknownErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown metapod error code {}", self.0)
    }
}

impl std::error::Error for UnknownErrorCode {}

impl EngineError {
    fn entry(self) -> &'static CatalogEntry {
        // Every variant has a row; the catalog tests check this exhaustively.
        CATALOG
            .iter()
            .find(|e| e.kind == self)
            .unwrap_or(&CATALOG[0])
    }

    /// Stable numeric code
    pub fn code(self) -> i32 {
        self.entry().code
    }

    /// Human-readable message
    pub fn message(self) -> &'static str {
        self.entry().message
    }

    /// Resolve a numeric code back to its kind
    pub fn from_code(code: i32) -> Result<Self, UnknownErrorCode> {
        CATALOG
            .iter()
            .find(|e| e.code == code)
            .map(|e| e.kind)
            .ok_or(UnknownErrorCode(code))
    }

    /// Rank used when several candidate blocks fail; higher is more specific
    pub(crate) fn specificity(self) -> u8 {
        match self {
            EngineError::UnsupportedVersion => 4,
            EngineError::ChecksumMismatch => 3,
            EngineError::PayloadTooLarge => 2,
            EngineError::MalformedBlock => 1,
            _ => 0,
        }
    }
}

/// Map a code to its message, failing for codes outside the catalog
pub fn lookup_message(code: i32) -> Result<&'static str, UnknownErrorCode> {
    EngineError::from_code(code).map(EngineError::message)
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

impl std::error::Error for EngineError {}

/// Result type for engine operations
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
