//! The leaf byte-stream contract and its conveniences.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};

use crate::node::NodeMeta;

/// Shared handle to a file node. The handle keeps the node alive; a file
/// remains readable for as long as any handle exists, even after every tree
/// that referenced it has been torn down.
pub type FileHandle = Arc<dyn VfsFile>;

/// How a file is opened. Parsed from stdio-style mode strings for
/// compatibility with existing call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Read-only from the start of the file.
    #[default]
    Read,
    /// Write-only; existing content is truncated.
    Write,
    /// Read and write without truncation.
    ReadWrite,
    /// Writes go to the end of the file.
    Append,
}

impl OpenMode {
    /// Parses `"r"`, `"rb"`, `"r+"`, `"w"`, `"wb"`, `"w+"`, `"a"`, `"ab"`.
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "r" | "rb" => Some(OpenMode::Read),
            "r+" | "rb+" | "r+b" => Some(OpenMode::ReadWrite),
            "w" | "wb" => Some(OpenMode::Write),
            "w+" | "wb+" | "w+b" => Some(OpenMode::ReadWrite),
            "a" | "ab" => Some(OpenMode::Append),
            _ => None,
        }
    }
}

/// The byte-stream contract every file backend implements.
///
/// Failure is communicated through return values, never panics: `open` and
/// the positioning calls report success as `bool`, `read`/`write` return the
/// number of bytes moved (0 on failure), and `size` returns `None` when the
/// backend cannot tell. Operations that are irrelevant for a backend (a
/// memory file cannot meaningfully close) should report success.
pub trait VfsFile: Send + Sync {
    /// Node identity (name and recorded full path).
    fn meta(&self) -> &NodeMeta;

    /// Backend label, for diagnostics only.
    fn backend(&self) -> &'static str;

    /// Opens the file. An already-open file is closed and reopened, even in
    /// the same mode.
    fn open(&self, mode: OpenMode) -> bool;

    fn close(&self) -> bool {
        true
    }

    fn is_open(&self) -> bool;

    fn is_eof(&self) -> bool;

    /// Seeks to an absolute byte offset.
    fn seek(&self, pos: u64) -> bool;

    /// Seeks relative to the current position; negative offsets go back.
    fn seek_rel(&self, offset: i64) -> bool {
        match self.pos() {
            Some(p) => {
                let target = p as i64 + offset;
                target >= 0 && self.seek(target as u64)
            }
            None => false,
        }
    }

    /// Current byte offset, `None` if the backend does not track one.
    fn pos(&self) -> Option<u64>;

    /// Reads into `buf`, returning the number of bytes read.
    fn read(&self, buf: &mut [u8]) -> usize;

    /// Writes from `data`, returning the number of bytes written. Read-only
    /// backends return 0.
    fn write(&self, data: &[u8]) -> usize {
        let _ = data;
        0
    }

    fn flush(&self) -> bool {
        true
    }

    /// Total size in bytes, `None` if unknown.
    fn size(&self) -> Option<u64>;

    fn name(&self) -> &str {
        self.meta().name()
    }

    fn full_path(&self) -> &str {
        self.meta().full_path()
    }
}

/// Reads a file's entire content into an owned buffer.
///
/// Layered on top of the [`VfsFile`] contract rather than part of it: the
/// file is opened if necessary, read from the start, and left in the open
/// state and position it had before the call.
pub fn read_all(file: &dyn VfsFile) -> Option<Bytes> {
    let was_open = file.is_open();
    let prev_pos = if was_open { file.pos() } else { None };

    if !was_open && !file.open(OpenMode::Read) {
        return None;
    }
    if !file.seek(0) {
        if !was_open {
            file.close();
        }
        return None;
    }

    let mut out = match file.size() {
        Some(n) => BytesMut::with_capacity(n as usize),
        None => BytesMut::new(),
    };
    let mut chunk = [0u8; 16 * 1024];
    loop {
        let n = file.read(&mut chunk);
        if n == 0 {
            break;
        }
        out.extend_from_slice(&chunk[..n]);
    }

    if !was_open {
        file.close();
    } else if let Some(p) = prev_pos {
        file.seek(p);
    }
    Some(out.freeze())
}

/// Identity comparison for file handles (same node, not equal content).
pub fn same_file(a: &FileHandle, b: &FileHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const u8,
        Arc::as_ptr(b) as *const u8,
    )
}
