//! Archive-member file backend: decompress on first open, cache, serve.

use std::io::Read as _;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use flate2::read::DeflateDecoder;
use tracing::warn;

use canopyfs_core::{NodeMeta, OpenMode, VfsFile};

use crate::index::{data_range, ZipEntry, METHOD_DEFLATED, METHOD_STORED};

/// The archive bytes shared by every member of one opened container.
pub(crate) struct ZipArchive {
    pub data: Bytes,
}

struct MemberState {
    content: Option<Bytes>,
    pos: u64,
    open: bool,
}

/// A read-only file inside a ZIP archive.
///
/// The member's size is known from the index without touching the data.
/// `open` extracts (and CRC-checks) the content once; the extracted bytes
/// are kept for the lifetime of the node, so reopening and reading through
/// other mount aliases is free. Writes are refused.
pub struct ZipMemberFile {
    meta: NodeMeta,
    entry: ZipEntry,
    archive: Arc<ZipArchive>,
    state: Mutex<MemberState>,
}

impl ZipMemberFile {
    pub(crate) fn new(full_path: String, entry: ZipEntry, archive: Arc<ZipArchive>) -> Self {
        Self {
            meta: NodeMeta::new(full_path),
            entry,
            archive,
            state: Mutex::new(MemberState { content: None, pos: 0, open: false }),
        }
    }

    fn extract(&self) -> Option<Bytes> {
        if self.entry.is_encrypted() {
            warn!(member = %self.entry.name, "encrypted member");
            return None;
        }
        let range = match data_range(&self.archive.data, &self.entry) {
            Ok(r) => r,
            Err(err) => {
                warn!(member = %self.entry.name, %err, "bad member header");
                return None;
            }
        };
        let raw = match self.entry.method {
            METHOD_STORED => self.archive.data.slice(range),
            METHOD_DEFLATED => {
                let mut out = Vec::with_capacity(self.entry.uncompressed_size as usize);
                let mut dec = DeflateDecoder::new(&self.archive.data[range]);
                if dec.read_to_end(&mut out).is_err() {
                    warn!(member = %self.entry.name, "deflate failed");
                    return None;
                }
                Bytes::from(out)
            }
            other => {
                warn!(member = %self.entry.name, method = other, "unsupported method");
                return None;
            }
        };
        if crc32fast::hash(&raw) != self.entry.crc32 {
            warn!(member = %self.entry.name, "crc mismatch");
            return None;
        }
        Some(raw)
    }
}

impl VfsFile for ZipMemberFile {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn backend(&self) -> &'static str {
        "zip"
    }

    fn open(&self, mode: OpenMode) -> bool {
        if mode != OpenMode::Read {
            return false;
        }
        let mut st = self.state.lock().unwrap();
        if st.content.is_none() {
            match self.extract() {
                Some(bytes) => st.content = Some(bytes),
                None => return false,
            }
        }
        st.pos = 0;
        st.open = true;
        true
    }

    fn close(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        st.open = false;
        st.pos = 0;
        true
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn is_eof(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.pos >= self.entry.uncompressed_size
    }

    fn seek(&self, pos: u64) -> bool {
        let mut st = self.state.lock().unwrap();
        if !st.open {
            return false;
        }
        st.pos = pos;
        true
    }

    fn pos(&self) -> Option<u64> {
        let st = self.state.lock().unwrap();
        st.open.then_some(st.pos)
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        let mut st = self.state.lock().unwrap();
        let content = match &st.content {
            Some(c) if st.open => c,
            _ => return 0,
        };
        let len = content.len() as u64;
        if st.pos >= len {
            return 0;
        }
        let start = st.pos as usize;
        let n = buf.len().min(len as usize - start);
        buf[..n].copy_from_slice(&content[start..start + n]);
        st.pos += n as u64;
        n
    }

    fn size(&self) -> Option<u64> {
        Some(self.entry.uncompressed_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::parse;
    use crate::test_util::build_zip;

    fn member(data: Vec<u8>, idx: usize) -> ZipMemberFile {
        let index = parse(&data).unwrap();
        let entry = index.entries[idx].clone();
        ZipMemberFile::new(
            format!("pack.zip/{}", entry.name),
            entry,
            Arc::new(ZipArchive { data: Bytes::from(data) }),
        )
    }

    #[test]
    fn test_stored_member_reads() {
        let f = member(build_zip(&[("a.txt", b"alpha", false)]), 0);
        assert_eq!(f.size(), Some(5));
        assert!(!f.is_open());
        assert!(f.open(OpenMode::Read));
        let mut buf = [0u8; 5];
        assert_eq!(f.read(&mut buf), 5);
        assert_eq!(&buf, b"alpha");
        assert!(f.is_eof());
    }

    #[test]
    fn test_deflated_member_reads() {
        let content = b"squeeze me squeeze me squeeze me".repeat(8);
        let f = member(build_zip(&[("big.txt", &content, true)]), 0);
        assert!(f.open(OpenMode::Read));
        let all = canopyfs_core::read_all(&f).unwrap();
        assert_eq!(&all[..], &content[..]);
    }

    #[test]
    fn test_member_refuses_writes() {
        let f = member(build_zip(&[("a.txt", b"alpha", false)]), 0);
        assert!(!f.open(OpenMode::Write));
        assert!(f.open(OpenMode::Read));
        assert_eq!(f.write(b"x"), 0);
    }

    #[test]
    fn test_crc_mismatch_fails_open() {
        let mut data = build_zip(&[("a.txt", b"alpha", false)]);
        // flip a content byte; headers stay intact
        let idx = data.windows(5).position(|w| w == b"alpha").unwrap();
        data[idx] ^= 0xFF;
        let f = member(data, 0);
        assert!(!f.open(OpenMode::Read));
    }
}
