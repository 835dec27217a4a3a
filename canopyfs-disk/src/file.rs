//! Real-file backend over `std::fs`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use canopyfs_core::{NodeMeta, OpenMode, VfsFile};

struct DiskState {
    handle: Option<File>,
    eof: bool,
}

/// A file on the real filesystem.
///
/// The OS handle is opened lazily by `open` and dropped by `close`; `size`
/// consults metadata and works either way. Failure surfaces through the
/// file contract's return values — a vanished or unreadable path makes
/// `open` return false and reads return 0.
pub struct DiskFile {
    meta: NodeMeta,
    os_path: PathBuf,
    state: Mutex<DiskState>,
}

impl DiskFile {
    /// Creates a disk file whose tree path and OS path are the same string.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let os_path = PathBuf::from(&path);
        Self::with_os_path(path, os_path)
    }

    /// Creates a disk file addressed in the tree as `full_path` but read
    /// from `os_path` — the shape produced by scanning an external OS path
    /// into an aliased subtree.
    pub fn with_os_path(full_path: impl Into<String>, os_path: PathBuf) -> Self {
        Self {
            meta: NodeMeta::new(full_path),
            os_path,
            state: Mutex::new(DiskState { handle: None, eof: false }),
        }
    }

    pub fn os_path(&self) -> &PathBuf {
        &self.os_path
    }
}

impl VfsFile for DiskFile {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn backend(&self) -> &'static str {
        "disk"
    }

    fn open(&self, mode: OpenMode) -> bool {
        let mut st = self.state.lock().unwrap();
        st.handle = None;
        st.eof = false;
        let mut opts = OpenOptions::new();
        match mode {
            OpenMode::Read => opts.read(true),
            OpenMode::Write => opts.write(true).create(true).truncate(true),
            OpenMode::ReadWrite => opts.read(true).write(true).create(true),
            OpenMode::Append => opts.read(true).append(true).create(true),
        };
        match opts.open(&self.os_path) {
            Ok(f) => {
                st.handle = Some(f);
                true
            }
            Err(_) => false,
        }
    }

    fn close(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        st.handle = None;
        st.eof = false;
        true
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().handle.is_some()
    }

    fn is_eof(&self) -> bool {
        self.state.lock().unwrap().eof
    }

    fn seek(&self, pos: u64) -> bool {
        let mut st = self.state.lock().unwrap();
        st.eof = false;
        match &mut st.handle {
            Some(f) => f.seek(SeekFrom::Start(pos)).is_ok(),
            None => false,
        }
    }

    fn pos(&self) -> Option<u64> {
        let mut st = self.state.lock().unwrap();
        match &mut st.handle {
            Some(f) => f.stream_position().ok(),
            None => None,
        }
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        let mut st = self.state.lock().unwrap();
        match &mut st.handle {
            Some(f) => match f.read(buf) {
                Ok(0) if !buf.is_empty() => {
                    st.eof = true;
                    0
                }
                Ok(n) => n,
                Err(_) => 0,
            },
            None => 0,
        }
    }

    fn write(&self, data: &[u8]) -> usize {
        let mut st = self.state.lock().unwrap();
        match &mut st.handle {
            Some(f) => f.write(data).unwrap_or(0),
            None => 0,
        }
    }

    fn flush(&self) -> bool {
        let mut st = self.state.lock().unwrap();
        match &mut st.handle {
            Some(f) => f.flush().is_ok(),
            None => true,
        }
    }

    fn size(&self) -> Option<u64> {
        std::fs::metadata(&self.os_path).ok().map(|m| m.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_disk_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"hello disk")
            .unwrap();

        let f = DiskFile::new(path.to_string_lossy().to_string());
        assert_eq!(f.size(), Some(10));
        assert!(!f.is_open());

        assert!(f.open(OpenMode::Read));
        let mut buf = [0u8; 5];
        assert_eq!(f.read(&mut buf), 5);
        assert_eq!(&buf, b"hello");
        assert!(f.seek(6));
        assert_eq!(f.read(&mut buf), 4);
        assert_eq!(&buf[..4], b"disk");
        assert_eq!(f.read(&mut buf), 0);
        assert!(f.is_eof());
        assert!(f.close());
    }

    #[test]
    fn test_disk_file_open_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.txt");
        let f = DiskFile::new(path.to_string_lossy().to_string());
        assert!(!f.open(OpenMode::Read));
        assert_eq!(f.size(), None);
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf), 0);
    }

    #[test]
    fn test_disk_file_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let f = DiskFile::new(path.to_string_lossy().to_string());
        assert!(f.open(OpenMode::Write));
        assert_eq!(f.write(b"written"), 7);
        assert!(f.flush());
        assert!(f.close());
        assert_eq!(std::fs::read(&path).unwrap(), b"written");
    }
}
