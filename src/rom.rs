//! ROM cartridge ingest
//!
//! Parses a Mega Drive ROM image: the 64 exception vectors (0x000-0x0FF,
//! big-endian longs), the cartridge header (0x100-0x1FF) and the body
//! (0x200+). Accepts raw `.bin`/`.md` files and `.zip` archives containing
//! one.
//!
//! | Offset | Size | Field              |
//! |:-------|:-----|:-------------------|
//! | 0x100  | 16   | System type        |
//! | 0x110  | 16   | Copyright          |
//! | 0x120  | 48   | Domestic title     |
//! | 0x150  | 48   | Overseas title     |
//! | 0x180  | 14   | Serial number      |
//! | 0x18E  | 2    | ROM checksum       |
//! | 0x1A0  | 8    | ROM address range  |
//! | 0x1A8  | 8    | RAM address range  |
//! | 0x1F0  | 3    | Region support     |

use log::info;
use serde::Serialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Largest cartridge the address map can serve (4 MiB).
pub const MAX_ROM_SIZE: usize = 0x40_0000;

/// Vectors + header + at least one body byte.
pub const MIN_ROM_SIZE: usize = 0x201;

#[derive(Debug, Error)]
pub enum RomError {
    #[error("failed to read ROM file: {0}")]
    Io(#[from] std::io::Error),

    #[error("extension '{0}' is not supported (expected .bin, .md or .zip)")]
    UnsupportedExtension(String),

    #[error("ROM is too big ({0} bytes, limit {MAX_ROM_SIZE})")]
    TooBig(usize),

    #[error("ROM is too small ({0} bytes, minimum {MIN_ROM_SIZE})")]
    TooSmall(usize),

    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("zip archive contains no ROM image")]
    EmptyArchive,
}

/// Cartridge header fields, strings trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RomHeader {
    pub system_type: String,
    pub copyright: String,
    pub title_domestic: String,
    pub title_overseas: String,
    pub serial: String,
    pub region_support: String,

    pub rom_checksum: u16,
    pub rom_start_addr: u32,
    pub rom_end_addr: u32,
    pub ram_start_addr: u32,
    pub ram_end_addr: u32,
}

/// A parsed ROM image.
#[derive(Debug)]
pub struct Rom {
    data: Vec<u8>,
    header: RomHeader,
    vectors: [u32; 64],
}

impl Rom {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, RomError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let raw = match ext.as_str() {
            "bin" | "md" => std::fs::read(path)?,
            "zip" => {
                let file = std::fs::File::open(path)?;
                read_zipped_rom(file)?
            }
            _ => return Err(RomError::UnsupportedExtension(ext)),
        };

        let rom = Self::from_bytes(raw)?;
        info!(
            "loaded ROM '{}' ({} bytes, serial '{}')",
            rom.header.title_overseas,
            rom.data.len(),
            rom.header.serial
        );
        Ok(rom)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RomError> {
        if data.len() > MAX_ROM_SIZE {
            return Err(RomError::TooBig(data.len()));
        }
        if data.len() < MIN_ROM_SIZE {
            return Err(RomError::TooSmall(data.len()));
        }

        let header = parse_header(&data);
        let mut vectors = [0u32; 64];
        for (i, vector) in vectors.iter_mut().enumerate() {
            *vector = read_be_long(&data, i * 4);
        }

        Ok(Self {
            data,
            header,
            vectors,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn header(&self) -> &RomHeader {
        &self.header
    }

    /// The 64 exception vectors. Index 0 is the initial SSP, 1 the reset PC.
    pub fn vectors(&self) -> &[u32; 64] {
        &self.vectors
    }

    /// Body bytes after vectors and header.
    pub fn body(&self) -> &[u8] {
        &self.data[0x200..]
    }

    /// Big-endian 16-bit sum of the body taken two bytes at a time
    /// (`MSB * 256 + LSB`), ignoring a trailing odd byte.
    pub fn checksum(&self) -> u16 {
        let body = self.body();
        let even_len = body.len() & !1;

        let mut sum: u16 = 0;
        for pair in body[..even_len].chunks_exact(2) {
            sum = sum
                .wrapping_add((pair[0] as u16).wrapping_mul(256))
                .wrapping_add(pair[1] as u16);
        }
        sum
    }

    /// ROM bytes padded to the full 4 MiB cartridge window.
    pub fn padded_data(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        data.resize(MAX_ROM_SIZE, 0);
        data
    }
}

fn read_zipped_rom<R: Read + std::io::Seek>(reader: R) -> Result<Vec<u8>, RomError> {
    let mut archive = zip::ZipArchive::new(reader)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_ascii_lowercase();
        if name.ends_with(".bin") || name.ends_with(".md") {
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            return Ok(data);
        }
    }
    Err(RomError::EmptyArchive)
}

fn parse_header(data: &[u8]) -> RomHeader {
    RomHeader {
        system_type: read_string(data, 0x100, 16),
        copyright: read_string(data, 0x110, 16),
        title_domestic: read_string(data, 0x120, 48),
        title_overseas: read_string(data, 0x150, 48),
        serial: read_string(data, 0x180, 14),
        region_support: read_string(data, 0x1F0, 3),
        rom_checksum: read_be_word(data, 0x18E),
        rom_start_addr: read_be_long(data, 0x1A0),
        rom_end_addr: read_be_long(data, 0x1A4),
        ram_start_addr: read_be_long(data, 0x1A8),
        ram_end_addr: read_be_long(data, 0x1AC),
    }
}

fn read_string(data: &[u8], offset: usize, len: usize) -> String {
    let raw = &data[offset..offset + len];
    String::from_utf8_lossy(raw).trim().to_string()
}

fn read_be_word(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn read_be_long(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom_image(body: &[u8]) -> Vec<u8> {
        let mut data = vec![0u8; 0x200];
        data[0x100..0x110].copy_from_slice(b"SEGA MEGA DRIVE ");
        data[0x110..0x120].copy_from_slice(b"(C)TEST 2024.JAN");
        data[0x120..0x12B].copy_from_slice(b"DOMESTIC   ");
        data[0x150..0x15B].copy_from_slice(b"OVERSEAS   ");
        data[0x180..0x18E].copy_from_slice(b"GM 00000000-00");
        data[0x1F0..0x1F3].copy_from_slice(b"JUE");
        data.extend_from_slice(body);
        data
    }

    #[test]
    fn test_header_fields() {
        let rom = Rom::from_bytes(rom_image(&[0x00])).unwrap();
        let header = rom.header();
        assert_eq!(header.system_type, "SEGA MEGA DRIVE");
        assert_eq!(header.copyright, "(C)TEST 2024.JAN");
        assert_eq!(header.title_domestic, "DOMESTIC");
        assert_eq!(header.title_overseas, "OVERSEAS");
        assert_eq!(header.serial, "GM 00000000-00");
        assert_eq!(header.region_support, "JUE");
    }

    #[test]
    fn test_vectors_are_big_endian_longs() {
        let mut image = rom_image(&[0x00]);
        image[0..4].copy_from_slice(&[0x00, 0xFF, 0xFF, 0xF6]); // SSP
        image[4..8].copy_from_slice(&[0x00, 0x00, 0x02, 0x00]); // reset PC
        image[12..16].copy_from_slice(&[0x00, 0x00, 0x10, 0x00]); // address error

        let rom = Rom::from_bytes(image).unwrap();
        assert_eq!(rom.vectors()[0], 0x00FFFFF6);
        assert_eq!(rom.vectors()[1], 0x00000200);
        assert_eq!(rom.vectors()[3], 0x00001000);
    }

    #[test]
    fn test_checksum_pairs_bytes() {
        // body: 0x12 0x34 0x56 0x78 -> 0x1234 + 0x5678
        let rom = Rom::from_bytes(rom_image(&[0x12, 0x34, 0x56, 0x78])).unwrap();
        assert_eq!(rom.checksum(), 0x1234u16.wrapping_add(0x5678));
    }

    #[test]
    fn test_checksum_ignores_trailing_odd_byte() {
        let even = Rom::from_bytes(rom_image(&[0x10, 0x20])).unwrap();
        let odd = Rom::from_bytes(rom_image(&[0x10, 0x20, 0xFF])).unwrap();
        assert_eq!(even.checksum(), odd.checksum());
    }

    #[test]
    fn test_undersized_rom_rejected() {
        let result = Rom::from_bytes(vec![0u8; 0x200]);
        assert!(matches!(result, Err(RomError::TooSmall(0x200))));
    }

    #[test]
    fn test_oversized_rom_rejected() {
        let result = Rom::from_bytes(vec![0u8; MAX_ROM_SIZE + 1]);
        assert!(matches!(result, Err(RomError::TooBig(_))));
    }

    #[test]
    fn test_padded_data_fills_cartridge_window() {
        let rom = Rom::from_bytes(rom_image(&[0xAB])).unwrap();
        let padded = rom.padded_data();
        assert_eq!(padded.len(), MAX_ROM_SIZE);
        assert_eq!(padded[0x200], 0xAB);
        assert_eq!(padded[MAX_ROM_SIZE - 1], 0x00);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = Rom::from_file("game.smc");
        assert!(matches!(result, Err(RomError::UnsupportedExtension(_))));
    }
}
