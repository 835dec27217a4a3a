//! In-memory file and directory backends.

use std::sync::{Arc, Mutex, RwLock};

use bytes::{Bytes, BytesMut};

use crate::dir::{DirChildren, DirHandle, DirNode};
use crate::file::{FileHandle, OpenMode, VfsFile};
use crate::node::{CaseMode, NodeMeta};
use crate::paths;

struct MemState {
    data: BytesMut,
    pos: u64,
    mode: OpenMode,
}

/// A file backed by an in-memory buffer.
///
/// Memory files are always open in the sense of the file contract — `close`
/// succeeds without doing anything and reads work at any time. The buffer
/// and cursor are shared by every handle to the node, so content written
/// through one mount alias is visible through all of them.
pub struct MemFile {
    meta: NodeMeta,
    state: Mutex<MemState>,
}

impl MemFile {
    /// Creates an empty memory file.
    pub fn new(full_path: impl Into<String>) -> Self {
        Self::with_content(full_path, Bytes::new())
    }

    /// Creates a memory file over the given content.
    pub fn with_content(full_path: impl Into<String>, content: impl Into<Bytes>) -> Self {
        let content = content.into();
        let mut data = BytesMut::with_capacity(content.len());
        data.extend_from_slice(&content);
        Self {
            meta: NodeMeta::new(full_path),
            state: Mutex::new(MemState { data, pos: 0, mode: OpenMode::Read }),
        }
    }
}

impl VfsFile for MemFile {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn backend(&self) -> &'static str {
        "mem"
    }

    fn open(&self, mode: OpenMode) -> bool {
        let mut st = self.state.lock().unwrap();
        st.mode = mode;
        match mode {
            OpenMode::Write => {
                st.data.clear();
                st.pos = 0;
            }
            OpenMode::Append => st.pos = st.data.len() as u64,
            OpenMode::Read | OpenMode::ReadWrite => st.pos = 0,
        }
        true
    }

    fn is_open(&self) -> bool {
        true
    }

    fn is_eof(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.pos >= st.data.len() as u64
    }

    fn seek(&self, pos: u64) -> bool {
        self.state.lock().unwrap().pos = pos;
        true
    }

    fn pos(&self) -> Option<u64> {
        Some(self.state.lock().unwrap().pos)
    }

    fn read(&self, buf: &mut [u8]) -> usize {
        let mut st = self.state.lock().unwrap();
        let len = st.data.len() as u64;
        if st.pos >= len {
            return 0;
        }
        let start = st.pos as usize;
        let n = buf.len().min(len as usize - start);
        buf[..n].copy_from_slice(&st.data[start..start + n]);
        st.pos += n as u64;
        n
    }

    fn write(&self, data: &[u8]) -> usize {
        let mut st = self.state.lock().unwrap();
        if st.mode == OpenMode::Read {
            return 0;
        }
        if st.mode == OpenMode::Append {
            st.pos = st.data.len() as u64;
        }
        let end = st.pos as usize + data.len();
        if st.data.len() < end {
            st.data.resize(end, 0);
        }
        let start = st.pos as usize;
        st.data[start..end].copy_from_slice(data);
        st.pos = end as u64;
        data.len()
    }

    fn size(&self) -> Option<u64> {
        Some(self.state.lock().unwrap().data.len() as u64)
    }
}

/// A purely virtual directory: name-keyed child maps, nothing else.
///
/// This is the concrete type the resolvers synthesize for force-created
/// intermediates outside overlay regions, and the container the archive
/// collaborators build their member trees from.
pub struct MemDir {
    meta: NodeMeta,
    case: CaseMode,
    children: RwLock<DirChildren>,
}

impl MemDir {
    pub fn new(full_path: impl Into<String>, case: CaseMode) -> Self {
        Self {
            meta: NodeMeta::new(full_path),
            case,
            children: RwLock::new(DirChildren::new(case)),
        }
    }
}

impl DirNode for MemDir {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn backend(&self) -> &'static str {
        "mem"
    }

    fn case_mode(&self) -> CaseMode {
        self.case
    }

    fn file_by_name(&self, name: &str) -> Option<FileHandle> {
        self.children.read().unwrap().file(name)
    }

    fn dir_by_name(&self, name: &str) -> Option<DirHandle> {
        self.children.read().unwrap().dir(name)
    }

    fn ensure_dir(&self, name: &str) -> DirHandle {
        if let Some(existing) = self.dir_by_name(name) {
            return existing;
        }
        let mut ch = self.children.write().unwrap();
        if let Some(existing) = ch.dir(name) {
            return existing;
        }
        let child: DirHandle = Arc::new(MemDir::new(
            paths::join(self.meta.full_path(), name),
            self.case,
        ));
        ch.put_dir(child.clone());
        child
    }

    fn create_new(&self, full_path: &str) -> DirHandle {
        Arc::new(MemDir::new(full_path, self.case))
    }

    fn add(&self, file: FileHandle, overwrite: bool) -> bool {
        self.children.write().unwrap().put_file(file, overwrite)
    }

    fn next_file_after(&self, prev: Option<&str>) -> Option<(String, FileHandle)> {
        self.children.read().unwrap().next_file_after(prev)
    }

    fn next_dir_after(&self, prev: Option<&str>) -> Option<(String, DirHandle)> {
        self.children.read().unwrap().next_dir_after(prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_file_read_seek() {
        let f = MemFile::with_content("f.txt", &b"hello world"[..]);
        assert!(f.open(OpenMode::Read));
        let mut buf = [0u8; 5];
        assert_eq!(f.read(&mut buf), 5);
        assert_eq!(&buf, b"hello");
        assert!(!f.is_eof());

        assert!(f.seek(6));
        assert_eq!(f.read(&mut buf), 5);
        assert_eq!(&buf, b"world");
        assert!(f.is_eof());
        assert_eq!(f.read(&mut buf), 0);

        assert!(f.seek_rel(-5));
        assert_eq!(f.read(&mut buf), 5);
        assert_eq!(&buf, b"world");
    }

    #[test]
    fn test_mem_file_write_modes() {
        let f = MemFile::with_content("f.txt", &b"old content"[..]);

        // read mode refuses writes
        assert!(f.open(OpenMode::Read));
        assert_eq!(f.write(b"x"), 0);

        // write mode truncates
        assert!(f.open(OpenMode::Write));
        assert_eq!(f.write(b"new"), 3);
        assert_eq!(f.size(), Some(3));

        // append goes to the end regardless of the cursor
        assert!(f.open(OpenMode::Append));
        assert!(f.seek(0));
        assert_eq!(f.write(b"!"), 1);
        assert_eq!(f.size(), Some(4));

        assert!(f.open(OpenMode::Read));
        let mut buf = [0u8; 4];
        assert_eq!(f.read(&mut buf), 4);
        assert_eq!(&buf, b"new!");
    }

    #[test]
    fn test_mem_file_overwrite_in_place() {
        let f = MemFile::with_content("f.txt", &b"ABCDEF"[..]);
        assert!(f.open(OpenMode::ReadWrite));
        assert!(f.seek(2));
        assert_eq!(f.write(b"xy"), 2);
        assert!(f.seek(0));
        let mut buf = [0u8; 6];
        assert_eq!(f.read(&mut buf), 6);
        assert_eq!(&buf, b"ABxyEF");
    }

    #[test]
    fn test_mem_dir_children() {
        let d = MemDir::new("top", CaseMode::Sensitive);
        assert!(d.add(Arc::new(MemFile::new("top/a.txt")), true));
        assert!(d.file_by_name("a.txt").is_some());
        assert!(d.file_by_name("b.txt").is_none());

        let sub = d.ensure_dir("sub");
        assert_eq!(sub.full_path(), "top/sub");
        // second call returns the same node
        let again = d.ensure_dir("sub");
        assert!(crate::dir::same_dir(&sub, &again));
    }

    #[test]
    fn test_mem_dir_case_insensitive() {
        let d = MemDir::new("", CaseMode::Insensitive);
        d.add(Arc::new(MemFile::new("Readme.MD")), true);
        assert!(d.file_by_name("readme.md").is_some());
        let sub = d.ensure_dir("Docs");
        let same = d.ensure_dir("docs");
        assert!(crate::dir::same_dir(&sub, &same));
    }
}
