//! Standard exit codes for Metapod binaries
//!
//! Both `metapod-create` and `metapod-open` use these so scripts can tell
//! "never embedded" apart from "embedded but damaged" without parsing stderr.

use crate::exceptions::MetapodError;
use crate::pod::EngineError;

/// Successful execution
pub const EXIT_SUCCESS: i32 = 0;

/// Generic error (avoid using - be more specific)
pub const EXIT_ERROR: i32 = 1;

/// Panic or unrecoverable error
pub const EXIT_PANIC: i32 = 101;

/// Input is not a usable PE image (or lacks a required signature)
pub const EXIT_IMAGE_ERROR: i32 = 102;

/// Payload rejected (empty, whitespace-only, or too large)
pub const EXIT_PAYLOAD_ERROR: i32 = 103;

/// No payload block present
pub const EXIT_NO_PAYLOAD: i32 = 104;

/// Payload block present but damaged (malformed, checksum mismatch)
pub const EXIT_CORRUPT_PAYLOAD: i32 = 105;

/// Invalid command-line arguments
pub const EXIT_INVALID_ARGS: i32 = 106;

/// I/O error (file not found, permission denied, disk error)
pub const EXIT_IO_ERROR: i32 = 107;

/// Payload block written by a newer version
pub const EXIT_UNSUPPORTED_VERSION: i32 = 108;

/// Written output did not read back correctly
pub const EXIT_VERIFICATION_ERROR: i32 = 109;

/// Exit code for an engine failure
pub fn exit_code_for_engine(err: EngineError) -> i32 {
    match err {
        EngineError::InvalidImage => EXIT_IMAGE_ERROR,
        EngineError::EmptyPayload | EngineError::PayloadTooLarge => EXIT_PAYLOAD_ERROR,
        EngineError::NoPayloadFound => EXIT_NO_PAYLOAD,
        EngineError::MalformedBlock | EngineError::ChecksumMismatch => EXIT_CORRUPT_PAYLOAD,
        EngineError::UnsupportedVersion => EXIT_UNSUPPORTED_VERSION,
    }
}

/// Exit code for any metapod failure
pub fn exit_code_for(err: &MetapodError) -> i32 {
    match err {
        MetapodError::Engine(engine) => exit_code_for_engine(*engine),
        MetapodError::FileNotFound(_) | MetapodError::OutputExists(_) => EXIT_IO_ERROR,
        MetapodError::IoError(_) => EXIT_IO_ERROR,
        MetapodError::Unsigned(_) => EXIT_IMAGE_ERROR,
        MetapodError::VerificationFailed(_) => EXIT_VERIFICATION_ERROR,
        MetapodError::JsonError(_) | MetapodError::Generic(_) => EXIT_ERROR,
    }
}
