// src/pod/defaults.rs
// Tunable limits and environment names. Format constants live in constants.rs

// =================================
// Payload limits
// =================================
pub const MAX_PAYLOAD_SIZE: usize = 1 << 20; // 1 MiB of UTF-8

// =================================
// PE layout
// =================================
pub const CERTIFICATE_TABLE_ALIGNMENT: u64 = 8; // Attribute certificates are quadword aligned

// =================================
// Environment variables
// =================================
pub const ENV_LOG_LEVEL: &str = "METAPOD_LOG_LEVEL";
pub const ENV_LOG_PATH: &str = "METAPOD_LOG_PATH";
pub const DEFAULT_LOG_LEVEL: &str = "warn";
