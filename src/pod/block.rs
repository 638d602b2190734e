// src/pod/block.rs
// Payload block codec
//
// Layout, integers little-endian:
//   MAGIC(8) | VERSION(2) | LENGTH(4) | PAYLOAD(LENGTH) | CHECKSUM(4)
// CHECKSUM is CRC-32 over PAYLOAD only.

use super::checksums::{payload_checksum, verify_payload_checksum};
use super::constants::{BLOCK_HEADER_SIZE, BLOCK_OVERHEAD, BLOCK_VERSION, CHECKSUM_SIZE, MAGIC};
use super::defaults::MAX_PAYLOAD_SIZE;
use super::errors::{EngineError, Result};

/// A decoded payload block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadBlock {
    pub version: u16,
    pub payload: String,
    pub checksum: u32,
}

impl PayloadBlock {
    /// Build a current-version block for `payload`
    ///
    /// # Errors
    ///
    /// [`EngineError::EmptyPayload`] for blank payloads and
    /// [`EngineError::PayloadTooLarge`] above `MAX_PAYLOAD_SIZE` bytes.
    pub fn new(payload: &str) -> Result<Self> {
        validate_payload(payload)?;
        Ok(Self {
            version: BLOCK_VERSION,
            payload: payload.to_string(),
            checksum: payload_checksum(payload.as_bytes()),
        })
    }

    /// Payload length in bytes, as written in the LENGTH field
    pub fn length(&self) -> u32 {
        self.payload.len() as u32
    }

    /// Size of the serialized block
    pub fn encoded_len(&self) -> usize {
        BLOCK_OVERHEAD + self.payload.len()
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.extend_from_slice(&MAGIC);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.length().to_le_bytes());
        bytes.extend_from_slice(self.payload.as_bytes());
        bytes.extend_from_slice(&self.checksum.to_le_bytes());
        bytes
    }
}

/// Reject blank or oversized payloads
pub fn validate_payload(payload: &str) -> Result<()> {
    if payload.trim().is_empty() {
        return Err(EngineError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(EngineError::PayloadTooLarge);
    }
    Ok(())
}

/// Serialize `payload` into a block
pub fn encode(payload: &str) -> Result<Vec<u8>> {
    PayloadBlock::new(payload).map(|block| block.pack())
}

/// Size of the block framed at `offset` (header, LENGTH bytes, trailer) if the
/// header is readable and the whole frame fits in `bytes`
pub fn framed_len(bytes: &[u8], offset: usize) -> Option<usize> {
    let data = bytes.get(offset..)?;
    let header = data.get(..BLOCK_HEADER_SIZE)?;
    if header[..MAGIC.len()] != MAGIC {
        return None;
    }
    let length = u32::from_le_bytes([header[10], header[11], header[12], header[13]]) as usize;
    let framed = BLOCK_OVERHEAD.checked_add(length)?;
    (framed <= data.len()).then_some(framed)
}

/// Decode the block starting at `offset`, returning it and the bytes consumed.
///
/// # Errors
///
/// - [`EngineError::MalformedBlock`]: fewer than 18 bytes left, no magic at
///   `offset`, version 0, LENGTH running past the buffer, or invalid UTF-8
/// - [`EngineError::UnsupportedVersion`]: version above [`BLOCK_VERSION`]
/// - [`EngineError::PayloadTooLarge`]: LENGTH above `MAX_PAYLOAD_SIZE`
/// - [`EngineError::ChecksumMismatch`]: CRC-32 does not match the payload
pub fn decode(bytes: &[u8], offset: usize) -> Result<(PayloadBlock, usize)> {
    let data = bytes.get(offset..).ok_or(EngineError::MalformedBlock)?;
    if data.len() < BLOCK_OVERHEAD || data[..MAGIC.len()] != MAGIC {
        return Err(EngineError::MalformedBlock);
    }

    let version = u16::from_le_bytes([data[8], data[9]]);
    if version == 0 {
        return Err(EngineError::MalformedBlock);
    }
    if version > BLOCK_VERSION {
        return Err(EngineError::UnsupportedVersion);
    }

    let length = u32::from_le_bytes([data[10], data[11], data[12], data[13]]) as usize;
    if length > MAX_PAYLOAD_SIZE {
        return Err(EngineError::PayloadTooLarge);
    }
    let consumed = BLOCK_OVERHEAD + length;
    if consumed > data.len() {
        return Err(EngineError::MalformedBlock);
    }

    let payload = &data[BLOCK_HEADER_SIZE..BLOCK_HEADER_SIZE + length];
    let trailer = &data[BLOCK_HEADER_SIZE + length..consumed];
    debug_assert_eq!(trailer.len(), CHECKSUM_SIZE);
    let checksum = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if !verify_payload_checksum(payload, checksum) {
        return Err(EngineError::ChecksumMismatch);
    }

    let payload = std::str::from_utf8(payload).map_err(|_| EngineError::MalformedBlock)?;

    Ok((
        PayloadBlock {
            version,
            payload: payload.to_string(),
            checksum,
        },
        consumed,
    ))
}
