//! Metapod embed/extract engine
//!
//! Pure functions over byte slices: no I/O, no logging, no shared state. File
//! handling lives in [`crate::api`].

pub mod block;
pub mod checksums;
pub mod cli;
pub mod constants;
pub mod defaults;
pub mod embedder;
pub mod errors;
pub mod extractor;
pub mod pe;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export main functions
pub use embedder::{create, embed};
pub use errors::{EngineError, Result, lookup_message};
pub use extractor::open;

// Re-export types for advanced usage
pub use block::PayloadBlock;
pub use embedder::EmbedResult;
pub use extractor::{LocatedBlock, ScanReport};
pub use pe::{PeFormat, PortableExecutableImage};
