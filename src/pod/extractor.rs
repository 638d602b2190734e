// src/pod/extractor.rs
// Extractor: locate and decode payload blocks appended to a PE image
//
// The scan walks forward from the image's scan start over every MAGIC match.
// Valid blocks are skipped over whole so bytes inside a payload are never
// re-examined. The last valid block wins. A failed candidate after it means the
// most recent write is damaged, and that failure is reported instead of
// silently returning an older payload.

use super::block::{self, PayloadBlock};
use super::constants::MAGIC;
use super::errors::{EngineError, Result};
use super::pe::PortableExecutableImage;

/// A valid block and where it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedBlock {
    pub offset: usize,
    pub block: PayloadBlock,
}

/// A magic match that did not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFailure {
    pub offset: usize,
    pub error: EngineError,
}

/// Everything a scan found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Offset the scan started from
    pub start: usize,
    /// Valid blocks in file order
    pub blocks: Vec<LocatedBlock>,
    /// Most specific failure seen after the last valid block
    pub failure: Option<BlockFailure>,
}

impl ScanReport {
    /// The block `open` would return
    pub fn latest(&self) -> Option<&LocatedBlock> {
        self.blocks.last()
    }

    /// Resolve to the latest payload or the error `open` reports
    pub fn into_payload(mut self) -> Result<String> {
        if let Some(failure) = self.failure {
            return Err(failure.error);
        }
        self.blocks
            .pop()
            .map(|located| located.block.payload)
            .ok_or(EngineError::NoPayloadFound)
    }
}

/// Where block scanning starts for `candidate`.
///
/// Parsed images start past their signed region (or nominal end when unsigned);
/// anything that does not parse as PE is scanned from byte 0.
pub fn scan_start(candidate: &[u8]) -> usize {
    PortableExecutableImage::parse(candidate)
        .map(|image| image.scan_start())
        .unwrap_or(0)
}

/// Scan `candidate` from `start` for payload blocks
pub fn scan_from(candidate: &[u8], start: usize) -> ScanReport {
    let mut report = ScanReport {
        start,
        ..ScanReport::default()
    };

    let mut offset = start;
    while let Some(position) = find_magic(candidate, offset) {
        match block::decode(candidate, position) {
            Ok((block, consumed)) => {
                report.blocks.push(LocatedBlock {
                    offset: position,
                    block,
                });
                report.failure = None;
                offset = position + consumed;
            }
            Err(error) => {
                let more_specific = report
                    .failure
                    .is_none_or(|seen| error.specificity() > seen.error.specificity());
                if more_specific {
                    report.failure = Some(BlockFailure {
                        offset: position,
                        error,
                    });
                }
                // A checksum failure had intact framing, so anything inside it is
                // payload bytes of the damaged block
                offset = match error {
                    EngineError::ChecksumMismatch => {
                        position + block::framed_len(candidate, position).unwrap_or(1)
                    }
                    _ => position + 1,
                };
            }
        }
    }

    report
}

/// Scan `candidate` from its natural start
pub fn scan(candidate: &[u8]) -> ScanReport {
    scan_from(candidate, scan_start(candidate))
}

/// Every valid block in `candidate`, in file order
pub fn blocks(candidate: &[u8]) -> Vec<LocatedBlock> {
    scan(candidate).blocks
}

/// Recover the most recently embedded payload.
///
/// # Errors
///
/// - [`EngineError::InvalidImage`] if `candidate` is empty
/// - [`EngineError::NoPayloadFound`] if no magic match decodes and none failed
/// - the most specific decode failure (`UnsupportedVersion`, `ChecksumMismatch`,
///   `PayloadTooLarge`, `MalformedBlock`) when a candidate block is damaged
pub fn open(candidate: &[u8]) -> Result<String> {
    if candidate.is_empty() {
        return Err(EngineError::InvalidImage);
    }
    scan(candidate).into_payload()
}

fn find_magic(data: &[u8], from: usize) -> Option<usize> {
    data.get(from..)?
        .windows(MAGIC.len())
        .position(|window| window == MAGIC)
        .map(|position| from + position)
}
