//! Synthetic PE images for tests.
//!
//! Layout: DOS header with e_lfanew = 0x80, NT headers, an optional single
//! `.text` section at 0x200, then an optional certificate table, then overlay.

use super::constants::{
    CERTIFICATE_TABLE_INDEX, DATA_DIRECTORY_ENTRY_SIZE, IMAGE_FILE_32BIT_MACHINE, IMAGE_FILE_DLL,
    IMAGE_FILE_EXECUTABLE_IMAGE, PE32_DATA_DIRECTORY_OFFSET, PE32_MAGIC,
    PE32_PLUS_DATA_DIRECTORY_OFFSET, PE32_PLUS_MAGIC, PE32_PLUS_RVA_COUNT_OFFSET,
    PE32_RVA_COUNT_OFFSET, WIN_CERT_REVISION_2_0, WIN_CERT_TYPE_PKCS_SIGNED_DATA,
};

const E_LFANEW: usize = 0x80;
const OPTIONAL_HEADER_OFFSET: usize = E_LFANEW + 4 + 20;
const HEADERS_SIZE: usize = 0x200;

pub(crate) struct PeBuilder {
    pe32_plus: bool,
    dll: bool,
    section: Option<Vec<u8>>,
    certificate: Option<Vec<u8>>,
    pad_certificate: bool,
    overlay: Vec<u8>,
}

impl PeBuilder {
    pub(crate) fn new() -> Self {
        Self {
            pe32_plus: false,
            dll: false,
            section: None,
            certificate: None,
            pad_certificate: true,
            overlay: Vec::new(),
        }
    }

    pub(crate) fn pe32_plus(mut self) -> Self {
        self.pe32_plus = true;
        self
    }

    pub(crate) fn dll(mut self) -> Self {
        self.dll = true;
        self
    }

    /// Raw data for a `.text` section; length should be a multiple of 0x200
    pub(crate) fn section(mut self, data: Vec<u8>) -> Self {
        self.section = Some(data);
        self
    }

    /// Certificate content placed after an 8-byte WIN_CERTIFICATE header
    pub(crate) fn certificate(mut self, content: Vec<u8>) -> Self {
        self.certificate = Some(content);
        self
    }

    /// Leave the certificate table unpadded and record its exact length
    pub(crate) fn unpadded_certificate(mut self) -> Self {
        self.pad_certificate = false;
        self
    }

    pub(crate) fn overlay(mut self, data: Vec<u8>) -> Self {
        self.overlay = data;
        self
    }

    /// File offset of the certificate data directory entry
    pub(crate) fn certificate_entry_offset(pe32_plus: bool) -> usize {
        let directories = if pe32_plus {
            PE32_PLUS_DATA_DIRECTORY_OFFSET
        } else {
            PE32_DATA_DIRECTORY_OFFSET
        };
        OPTIONAL_HEADER_OFFSET + directories + CERTIFICATE_TABLE_INDEX * DATA_DIRECTORY_ENTRY_SIZE
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let mut data = vec![0u8; HEADERS_SIZE];
        data[0..2].copy_from_slice(b"MZ");
        put_u32(&mut data, 0x3C, E_LFANEW as u32);
        data[E_LFANEW..E_LFANEW + 4].copy_from_slice(b"PE\0\0");

        let (machine, optional_size, magic, rva_count_offset) = if self.pe32_plus {
            (0x8664u16, 240u16, PE32_PLUS_MAGIC, PE32_PLUS_RVA_COUNT_OFFSET)
        } else {
            (0x014Cu16, 224u16, PE32_MAGIC, PE32_RVA_COUNT_OFFSET)
        };
        let mut characteristics = IMAGE_FILE_EXECUTABLE_IMAGE;
        if !self.pe32_plus {
            characteristics |= IMAGE_FILE_32BIT_MACHINE;
        }
        if self.dll {
            characteristics |= IMAGE_FILE_DLL;
        }

        let coff = E_LFANEW + 4;
        put_u16(&mut data, coff, machine);
        put_u16(&mut data, coff + 2, u16::from(self.section.is_some()));
        put_u16(&mut data, coff + 16, optional_size);
        put_u16(&mut data, coff + 18, characteristics);

        let opt = OPTIONAL_HEADER_OFFSET;
        put_u16(&mut data, opt, magic);
        put_u32(&mut data, opt + 56, 0x2000); // SizeOfImage
        put_u32(&mut data, opt + 60, HEADERS_SIZE as u32); // SizeOfHeaders
        put_u32(&mut data, opt + rva_count_offset, 16);

        if let Some(section) = &self.section {
            let header = opt + optional_size as usize;
            data[header..header + 8].copy_from_slice(b".text\0\0\0");
            put_u32(&mut data, header + 8, section.len() as u32);
            put_u32(&mut data, header + 12, 0x1000);
            put_u32(&mut data, header + 16, section.len() as u32);
            put_u32(&mut data, header + 20, HEADERS_SIZE as u32);
            data.extend_from_slice(section);
        }

        if let Some(content) = &self.certificate {
            let offset = data.len();
            let length = 8 + content.len();
            data.extend_from_slice(&(length as u32).to_le_bytes());
            data.extend_from_slice(&WIN_CERT_REVISION_2_0.to_le_bytes());
            data.extend_from_slice(&WIN_CERT_TYPE_PKCS_SIGNED_DATA.to_le_bytes());
            data.extend_from_slice(content);

            let size = if self.pad_certificate {
                let padded = length.div_ceil(8) * 8;
                data.resize(offset + padded, 0);
                padded
            } else {
                length
            };

            let entry = Self::certificate_entry_offset(self.pe32_plus);
            put_u32(&mut data, entry, offset as u32);
            put_u32(&mut data, entry + 4, size as u32);
        }

        data.extend_from_slice(&self.overlay);
        data
    }
}

fn put_u16(data: &mut [u8], offset: usize, value: u16) {
    data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
