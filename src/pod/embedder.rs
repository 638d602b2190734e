//! Embedder: append a payload block to a PE template
//!
//! The template is copied unchanged and the block goes after everything already
//! in the file, including any overlay another tool (or an earlier embed) left
//! behind. Nothing before the signed region end is touched, so a signature over
//! `[0, signed_region_end)` still verifies.

use super::block::{self, PayloadBlock};
use super::errors::{EngineError, Result};
use super::pe::PortableExecutableImage;

/// Output of an embed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedResult {
    bytes: Vec<u8>,
    block_offset: usize,
    signed_region_end: usize,
    signed: bool,
}

impl EmbedResult {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Offset of the new block's magic
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    /// Signed region end of the template
    pub fn signed_region_end(&self) -> usize {
        self.signed_region_end
    }

    /// Whether the template carried a certificate table
    pub fn is_signed(&self) -> bool {
        self.signed
    }

    pub fn block_len(&self) -> usize {
        self.bytes.len() - self.block_offset
    }
}

/// Embed `payload` into `template`.
///
/// # Errors
///
/// - [`EngineError::InvalidImage`] if `template` is empty or not a PE image
/// - [`EngineError::EmptyPayload`] if `payload` is blank
/// - [`EngineError::PayloadTooLarge`] if `payload` exceeds the size limit
pub fn embed(template: &[u8], payload: &str) -> Result<EmbedResult> {
    if template.is_empty() {
        return Err(EngineError::InvalidImage);
    }
    block::validate_payload(payload)?;

    let image = PortableExecutableImage::parse(template)?;
    let block = PayloadBlock::new(payload)?;

    // Always append; an existing overlay (or older block) is never overwritten.
    let block_offset = image.signed_region_end().max(template.len());

    let mut bytes = Vec::with_capacity(block_offset + block.encoded_len());
    bytes.extend_from_slice(template);
    bytes.extend_from_slice(&block.pack());

    Ok(EmbedResult {
        bytes,
        block_offset,
        signed_region_end: image.signed_region_end(),
        signed: image.is_signed(),
    })
}

/// Embed `payload` into `template`, returning only the new image bytes
pub fn create(template: &[u8], payload: &str) -> Result<Vec<u8>> {
    embed(template, payload).map(EmbedResult::into_bytes)
}
