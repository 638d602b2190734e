//! Metapod - metadata payloads for signed Portable Executable files
//!
//! A payload is appended after the certificate table of a PE image, outside the
//! region an Authenticode signature covers, and can be read back later without
//! invalidating that signature. [`pod`] holds the byte-level engine; [`api`]
//! wraps it with file handling for the `metapod-create` and `metapod-open` tools.

#![deny(
    // Safety
    unsafe_code,

    // Correctness
    missing_debug_implementations,

    // Future compatibility
    future_incompatible,

    // Rust 2018 idioms
    rust_2018_idioms,
)]
#![warn(
    // Error handling best practices
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unimplemented,
    clippy::todo,

    // Performance
    clippy::inefficient_to_string,
    clippy::large_enum_variant,

    // Best practices
    clippy::clone_on_ref_ptr,
    clippy::enum_glob_use,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
)]
#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)
)]

pub mod api;
pub mod exceptions;
pub mod exit_codes;
pub mod logger;
pub mod pod;
pub mod version;

// Re-export main API functions
pub use api::{CreateOptions, EmbedReport, InspectReport, create_file, inspect_file, open_file};
pub use exceptions::MetapodError;

// Re-export the engine entry points
pub use pod::{EngineError, create, lookup_message, open};
