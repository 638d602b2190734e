//! Checksum utilities.
//!
//! Block integrity uses CRC-32 (the zlib/gzip polynomial). Region digests used in
//! reports use the prefixed "algorithm:hexvalue" format, e.g. "sha256:cafe8008...".

use flate2::Crc;
use sha2::{Digest, Sha256};

/// CRC-32 of a payload, as stored in the block trailer
pub fn payload_checksum(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Check a payload against the stored checksum
pub fn verify_payload_checksum(data: &[u8], expected: u32) -> bool {
    payload_checksum(data) == expected
}

/// SHA-256 of a byte region with the algorithm prefix
pub fn region_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("sha256:{:x}", hasher.finalize())
}
