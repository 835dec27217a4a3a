//! ZIP container parsing: end-of-central-directory and central directory.
//!
//! Only what a read-only member tree needs — stored and deflated entries,
//! no zip64, no encryption, no spanned archives. Member data offsets are
//! resolved against the local header at open time, since central and local
//! headers may disagree about extra-field lengths.

use thiserror::Error;

pub(crate) const LOCAL_SIG: u32 = 0x0403_4b50;
const CENTRAL_SIG: u32 = 0x0201_4b50;
const EOCD_SIG: u32 = 0x0605_4b50;
const EOCD_LEN: usize = 22;
const CENTRAL_LEN: usize = 46;

/// Compression methods the member backend can serve.
pub const METHOD_STORED: u16 = 0;
pub const METHOD_DEFLATED: u16 = 8;

#[derive(Debug, Error)]
pub enum ZipError {
    /// Missing or malformed end-of-central-directory record.
    #[error("not a zip archive")]
    NotAnArchive,

    /// Structurally damaged archive.
    #[error("corrupt zip archive: {0}")]
    Corrupt(&'static str),

    /// Valid zip, but using a feature this reader does not support.
    #[error("unsupported zip feature: {0}")]
    Unsupported(&'static str),
}

/// One central-directory entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Member path inside the archive, forward slashes.
    pub name: String,
    pub method: u16,
    pub flags: u16,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Offset of the member's local header from the start of the archive.
    pub header_offset: u64,
}

impl ZipEntry {
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & 0x1 != 0
    }
}

/// Parsed archive index.
#[derive(Debug, Clone)]
pub struct ZipIndex {
    pub entries: Vec<ZipEntry>,
}

/// Cheap signature probe, used to decline non-zip files before parsing.
pub fn looks_like_zip(data: &[u8]) -> bool {
    data.len() >= 4 && (read_u32(data, 0) == Some(LOCAL_SIG) || read_u32(data, 0) == Some(EOCD_SIG))
}

/// Parses the central directory of a whole archive.
pub fn parse(data: &[u8]) -> Result<ZipIndex, ZipError> {
    let eocd = find_eocd(data).ok_or(ZipError::NotAnArchive)?;
    let total_entries = read_u16(data, eocd + 10).ok_or(ZipError::Corrupt("eocd"))? as usize;
    let cd_offset = read_u32(data, eocd + 16).ok_or(ZipError::Corrupt("eocd"))?;
    if total_entries == 0xFFFF || cd_offset == 0xFFFF_FFFF {
        return Err(ZipError::Unsupported("zip64"));
    }

    let mut entries = Vec::with_capacity(total_entries);
    let mut at = cd_offset as usize;
    for _ in 0..total_entries {
        if read_u32(data, at) != Some(CENTRAL_SIG) {
            return Err(ZipError::Corrupt("central directory signature"));
        }
        let flags = read_u16(data, at + 8).ok_or(ZipError::Corrupt("central entry"))?;
        let method = read_u16(data, at + 10).ok_or(ZipError::Corrupt("central entry"))?;
        let crc32 = read_u32(data, at + 16).ok_or(ZipError::Corrupt("central entry"))?;
        let compressed = read_u32(data, at + 20).ok_or(ZipError::Corrupt("central entry"))?;
        let uncompressed = read_u32(data, at + 24).ok_or(ZipError::Corrupt("central entry"))?;
        let name_len = read_u16(data, at + 28).ok_or(ZipError::Corrupt("central entry"))? as usize;
        let extra_len = read_u16(data, at + 30).ok_or(ZipError::Corrupt("central entry"))? as usize;
        let comment_len = read_u16(data, at + 32).ok_or(ZipError::Corrupt("central entry"))? as usize;
        let header_offset = read_u32(data, at + 42).ok_or(ZipError::Corrupt("central entry"))?;

        let name_bytes = data
            .get(at + CENTRAL_LEN..at + CENTRAL_LEN + name_len)
            .ok_or(ZipError::Corrupt("member name"))?;
        let name = String::from_utf8_lossy(name_bytes).replace('\\', "/");

        entries.push(ZipEntry {
            name,
            method,
            flags,
            crc32,
            compressed_size: compressed as u64,
            uncompressed_size: uncompressed as u64,
            header_offset: header_offset as u64,
        });
        at += CENTRAL_LEN + name_len + extra_len + comment_len;
    }
    Ok(ZipIndex { entries })
}

/// Resolves the byte range of a member's compressed data by reading its
/// local header.
pub fn data_range(data: &[u8], entry: &ZipEntry) -> Result<std::ops::Range<usize>, ZipError> {
    let at = entry.header_offset as usize;
    if read_u32(data, at) != Some(LOCAL_SIG) {
        return Err(ZipError::Corrupt("local header signature"));
    }
    let name_len = read_u16(data, at + 26).ok_or(ZipError::Corrupt("local header"))? as usize;
    let extra_len = read_u16(data, at + 28).ok_or(ZipError::Corrupt("local header"))? as usize;
    let start = at + 30 + name_len + extra_len;
    let end = start + entry.compressed_size as usize;
    if end > data.len() {
        return Err(ZipError::Corrupt("member data out of bounds"));
    }
    Ok(start..end)
}

fn find_eocd(data: &[u8]) -> Option<usize> {
    if data.len() < EOCD_LEN {
        return None;
    }
    // the record sits at the very end, pushed forward by at most one
    // 65535-byte comment
    let floor = data.len().saturating_sub(EOCD_LEN + 0xFFFF);
    let mut at = data.len() - EOCD_LEN;
    loop {
        if read_u32(data, at) == Some(EOCD_SIG) {
            return Some(at);
        }
        if at == floor {
            return None;
        }
        at -= 1;
    }
}

fn read_u16(data: &[u8], at: usize) -> Option<u16> {
    data.get(at..at + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
