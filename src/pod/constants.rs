// src/pod/constants.rs
// Binary layout constants for the payload block and the PE fields we read.
// For tunables, see defaults.rs

// Payload block framing - part of the on-disk format
pub const MAGIC: [u8; 8] = *b"\x89METAPOD"; // 0x89 keeps the marker out of plain ASCII text
pub const BLOCK_VERSION: u16 = 1; // Highest block version this crate reads or writes
pub const MAGIC_SIZE: usize = 8;
pub const VERSION_SIZE: usize = 2;
pub const LENGTH_SIZE: usize = 4;
pub const CHECKSUM_SIZE: usize = 4;
pub const BLOCK_HEADER_SIZE: usize = MAGIC_SIZE + VERSION_SIZE + LENGTH_SIZE; // 14
pub const BLOCK_OVERHEAD: usize = BLOCK_HEADER_SIZE + CHECKSUM_SIZE; // 18

// DOS header
pub const DOS_SIGNATURE: &[u8; 2] = b"MZ";
pub const DOS_HEADER_SIZE: usize = 0x40;
pub const E_LFANEW_OFFSET: usize = 0x3C;

// NT headers
pub const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
pub const COFF_HEADER_SIZE: usize = 20;
pub const SECTION_HEADER_SIZE: usize = 40;
pub const DATA_DIRECTORY_ENTRY_SIZE: usize = 8;

// Optional header
pub const PE32_MAGIC: u16 = 0x10B;
pub const PE32_PLUS_MAGIC: u16 = 0x20B;
pub const SIZE_OF_IMAGE_OFFSET: usize = 56; // Same in PE32 and PE32+
pub const SIZE_OF_HEADERS_OFFSET: usize = 60;
pub const CHECKSUM_FIELD_OFFSET: usize = 64;
pub const PE32_RVA_COUNT_OFFSET: usize = 92;
pub const PE32_PLUS_RVA_COUNT_OFFSET: usize = 108;
pub const PE32_DATA_DIRECTORY_OFFSET: usize = 96;
pub const PE32_PLUS_DATA_DIRECTORY_OFFSET: usize = 112;

// Data directory index of the attribute certificate table. Unlike every other
// directory its "address" is a file offset, not an RVA.
pub const CERTIFICATE_TABLE_INDEX: usize = 4;

// COFF characteristics
pub const IMAGE_FILE_EXECUTABLE_IMAGE: u16 = 0x0002;
pub const IMAGE_FILE_32BIT_MACHINE: u16 = 0x0100;
pub const IMAGE_FILE_DLL: u16 = 0x2000;

// WIN_CERTIFICATE header
pub const WIN_CERTIFICATE_HEADER_SIZE: usize = 8;
pub const WIN_CERT_REVISION_2_0: u16 = 0x0200;
pub const WIN_CERT_TYPE_PKCS_SIGNED_DATA: u16 = 0x0002;
