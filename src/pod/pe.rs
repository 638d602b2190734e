//! PE structure reader
//!
//! Parses just enough of a Portable Executable to know where the signed region
//! ends and whether anything already trails it. The image borrows the caller's
//! buffer; nothing here copies or mutates it.
//!
//! All offsets are checked against the buffer, so a truncated or hostile header
//! yields [`EngineError::InvalidImage`] instead of a panic.

use std::fmt;

use super::constants::{
    CERTIFICATE_TABLE_INDEX, CHECKSUM_FIELD_OFFSET, COFF_HEADER_SIZE, DATA_DIRECTORY_ENTRY_SIZE,
    DOS_HEADER_SIZE, DOS_SIGNATURE, E_LFANEW_OFFSET, IMAGE_FILE_32BIT_MACHINE, IMAGE_FILE_DLL,
    IMAGE_FILE_EXECUTABLE_IMAGE, PE_SIGNATURE, PE32_DATA_DIRECTORY_OFFSET, PE32_MAGIC,
    PE32_PLUS_DATA_DIRECTORY_OFFSET, PE32_PLUS_MAGIC, PE32_PLUS_RVA_COUNT_OFFSET,
    PE32_RVA_COUNT_OFFSET, SECTION_HEADER_SIZE, SIZE_OF_HEADERS_OFFSET, SIZE_OF_IMAGE_OFFSET,
    WIN_CERT_REVISION_2_0, WIN_CERT_TYPE_PKCS_SIGNED_DATA, WIN_CERTIFICATE_HEADER_SIZE,
};
use super::defaults::CERTIFICATE_TABLE_ALIGNMENT;
use super::errors::{EngineError, Result};

/// Optional header flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeFormat {
    Pe32,
    Pe32Plus,
}

impl fmt::Display for PeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeFormat::Pe32 => write!(f, "PE32"),
            PeFormat::Pe32Plus => write!(f, "PE32+"),
        }
    }
}

/// Entry of the section table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionHeader {
    pub name: String,
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
}

impl SectionHeader {
    /// File offset one past the section's raw data
    pub fn raw_end(&self) -> u64 {
        u64::from(self.pointer_to_raw_data) + u64::from(self.size_of_raw_data)
    }
}

/// WIN_CERTIFICATE header found at the start of the certificate table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinCertificate {
    pub length: u32,
    pub revision: u16,
    pub certificate_type: u16,
}

impl WinCertificate {
    /// Revision 2.0 carrying PKCS#7 SignedData, i.e. an Authenticode signature
    pub fn is_authenticode(&self) -> bool {
        self.revision == WIN_CERT_REVISION_2_0
            && self.certificate_type == WIN_CERT_TYPE_PKCS_SIGNED_DATA
    }
}

/// Certificate (security) directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateTable {
    /// File offset of the table (not an RVA)
    pub offset: u32,
    pub size: u32,
    pub header: Option<WinCertificate>,
}

impl CertificateTable {
    pub fn end(&self) -> u64 {
        u64::from(self.offset) + u64::from(self.size)
    }
}

/// A parsed, read-only view of a PE image
#[derive(Clone)]
pub struct PortableExecutableImage<'a> {
    bytes: &'a [u8],
    pe_offset: usize,
    format: PeFormat,
    machine: u16,
    characteristics: u16,
    size_of_image: u32,
    size_of_headers: u32,
    checksum: u32,
    sections: Vec<SectionHeader>,
    certificate: Option<CertificateTable>,
    signed_region_end: usize,
    declared_file_size: usize,
}

impl fmt::Debug for PortableExecutableImage<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortableExecutableImage")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("format", &self.format)
            .field("machine", &format_args!("{:#06x}", self.machine))
            .field("sections", &self.sections.len())
            .field("certificate", &self.certificate)
            .field("signed_region_end", &self.signed_region_end)
            .field("declared_file_size", &self.declared_file_size)
            .finish()
    }
}

impl<'a> PortableExecutableImage<'a> {
    /// Parse the headers of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidImage`] if the DOS or PE signature is missing,
    /// the optional header magic is unknown, or any header field points outside
    /// the buffer.
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < DOS_HEADER_SIZE || &bytes[..2] != DOS_SIGNATURE {
            return Err(EngineError::InvalidImage);
        }

        let pe_offset = read_u32(bytes, E_LFANEW_OFFSET)? as usize;
        if slice_at(bytes, pe_offset, PE_SIGNATURE.len())? != PE_SIGNATURE {
            return Err(EngineError::InvalidImage);
        }

        let coff_offset = checked_add(pe_offset, PE_SIGNATURE.len())?;
        let coff = slice_at(bytes, coff_offset, COFF_HEADER_SIZE)?;
        let machine = read_u16(coff, 0)?;
        let number_of_sections = read_u16(coff, 2)? as usize;
        let size_of_optional_header = read_u16(coff, 16)? as usize;
        let characteristics = read_u16(coff, 18)?;

        let optional_offset = checked_add(coff_offset, COFF_HEADER_SIZE)?;
        let optional = slice_at(bytes, optional_offset, size_of_optional_header)?;

        let format = match read_u16(optional, 0)? {
            PE32_MAGIC => PeFormat::Pe32,
            PE32_PLUS_MAGIC => PeFormat::Pe32Plus,
            _ => return Err(EngineError::InvalidImage),
        };
        let (rva_count_offset, data_directory_offset) = match format {
            PeFormat::Pe32 => (PE32_RVA_COUNT_OFFSET, PE32_DATA_DIRECTORY_OFFSET),
            PeFormat::Pe32Plus => (PE32_PLUS_RVA_COUNT_OFFSET, PE32_PLUS_DATA_DIRECTORY_OFFSET),
        };

        let size_of_image = read_u32(optional, SIZE_OF_IMAGE_OFFSET)?;
        let size_of_headers = read_u32(optional, SIZE_OF_HEADERS_OFFSET)?;
        let checksum = read_u32(optional, CHECKSUM_FIELD_OFFSET)?;
        let number_of_rva_and_sizes = read_u32(optional, rva_count_offset)? as usize;

        let certificate_entry = if number_of_rva_and_sizes > CERTIFICATE_TABLE_INDEX {
            let entry =
                data_directory_offset + CERTIFICATE_TABLE_INDEX * DATA_DIRECTORY_ENTRY_SIZE;
            Some((read_u32(optional, entry)?, read_u32(optional, entry + 4)?))
        } else {
            None
        };

        let section_table_offset = checked_add(optional_offset, size_of_optional_header)?;
        let section_table = slice_at(
            bytes,
            section_table_offset,
            number_of_sections * SECTION_HEADER_SIZE,
        )?;
        let sections = section_table
            .chunks_exact(SECTION_HEADER_SIZE)
            .map(parse_section_header)
            .collect::<Result<Vec<_>>>()?;

        let certificate = match certificate_entry {
            Some((offset, size)) if offset != 0 && size != 0 => {
                Some(parse_certificate_table(bytes, offset, size)?)
            }
            _ => None,
        };

        let len = bytes.len() as u64;
        let signed_region_end = match &certificate {
            Some(table) => align_up(table.end(), CERTIFICATE_TABLE_ALIGNMENT).min(len),
            None => len,
        } as usize;

        // Headers or section data past EOF: the image is truncated
        let declared_file_size = sections
            .iter()
            .filter(|s| s.size_of_raw_data > 0)
            .map(SectionHeader::raw_end)
            .fold(u64::from(size_of_headers), u64::max);
        if declared_file_size > len {
            return Err(EngineError::InvalidImage);
        }
        let declared_file_size = declared_file_size as usize;

        Ok(Self {
            bytes,
            pe_offset,
            format,
            machine,
            characteristics,
            size_of_image,
            size_of_headers,
            checksum,
            sections,
            certificate,
            signed_region_end,
            declared_file_size,
        })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn pe_offset(&self) -> usize {
        self.pe_offset
    }

    pub fn format(&self) -> PeFormat {
        self.format
    }

    pub fn machine(&self) -> u16 {
        self.machine
    }

    pub fn characteristics(&self) -> u16 {
        self.characteristics
    }

    pub fn is_executable(&self) -> bool {
        self.characteristics & IMAGE_FILE_EXECUTABLE_IMAGE != 0
    }

    pub fn is_dll(&self) -> bool {
        self.characteristics & IMAGE_FILE_DLL != 0
    }

    pub fn is_32bit_machine(&self) -> bool {
        self.characteristics & IMAGE_FILE_32BIT_MACHINE != 0
    }

    pub fn size_of_image(&self) -> u32 {
        self.size_of_image
    }

    pub fn size_of_headers(&self) -> u32 {
        self.size_of_headers
    }

    /// The optional header CheckSum field, as stored
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    pub fn certificate(&self) -> Option<&CertificateTable> {
        self.certificate.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.certificate.is_some()
    }

    /// End of the region covered by an embedded signature.
    ///
    /// With a certificate table this is its end rounded up to 8 bytes (never past
    /// the buffer); without one it is the buffer length.
    pub fn signed_region_end(&self) -> usize {
        self.signed_region_end
    }

    /// `bytes[..signed_region_end]`
    pub fn signed_region(&self) -> &'a [u8] {
        &self.bytes[..self.signed_region_end]
    }

    /// Nominal image size: the headers plus every section's raw data (never past EOF)
    pub fn declared_file_size(&self) -> usize {
        self.declared_file_size
    }

    pub fn has_existing_overlay(&self) -> bool {
        self.bytes.len() > self.signed_region_end
    }

    /// Bytes after the signed region
    pub fn overlay_len(&self) -> usize {
        self.bytes.len() - self.signed_region_end
    }

    /// True when the certificate table is the last thing in the file
    pub fn certificate_at_end_of_file(&self) -> bool {
        self.certificate.is_some() && self.signed_region_end == self.bytes.len()
    }

    /// First offset that may hold appended payload blocks.
    ///
    /// Signed images start at the exact end of the certificate table, before any
    /// alignment padding: a table that ends unpadded at EOF gets its block
    /// appended right there. Unsigned images have no signed region to skip, so the
    /// nominal image end is used instead.
    pub fn scan_start(&self) -> usize {
        match &self.certificate {
            Some(table) => table.end() as usize,
            None => self.declared_file_size,
        }
    }
}

fn parse_section_header(raw: &[u8]) -> Result<SectionHeader> {
    let name_bytes = &raw[..8];
    let name_len = name_bytes.iter().position(|&b| b == 0).unwrap_or(8);
    Ok(SectionHeader {
        name: String::from_utf8_lossy(&name_bytes[..name_len]).into_owned(),
        virtual_size: read_u32(raw, 8)?,
        virtual_address: read_u32(raw, 12)?,
        size_of_raw_data: read_u32(raw, 16)?,
        pointer_to_raw_data: read_u32(raw, 20)?,
    })
}

fn parse_certificate_table(bytes: &[u8], offset: u32, size: u32) -> Result<CertificateTable> {
    let mut table = CertificateTable {
        offset,
        size,
        header: None,
    };
    if table.end() > bytes.len() as u64 {
        return Err(EngineError::InvalidImage);
    }

    if size as usize >= WIN_CERTIFICATE_HEADER_SIZE {
        let header = slice_at(bytes, offset as usize, WIN_CERTIFICATE_HEADER_SIZE)?;
        table.header = Some(WinCertificate {
            length: read_u32(header, 0)?,
            revision: read_u16(header, 4)?,
            certificate_type: read_u16(header, 6)?,
        });
    }

    Ok(table)
}

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn checked_add(a: usize, b: usize) -> Result<usize> {
    a.checked_add(b).ok_or(EngineError::InvalidImage)
}

fn slice_at(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    let end = checked_add(offset, len)?;
    data.get(offset..end).ok_or(EngineError::InvalidImage)
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    let raw = slice_at(data, offset, 2)?;
    Ok(u16::from_le_bytes([raw[0], raw[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    let raw = slice_at(data, offset, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}
