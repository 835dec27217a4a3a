//! Real-directory backend: scans an OS path into tree nodes.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tracing::warn;

use canopyfs_core::{
    paths, CaseMode, DirChildren, DirHandle, DirNode, FileHandle, NodeMeta, VfsError, VfsResult,
};

use crate::file::DiskFile;

/// A directory mirrored from the real filesystem.
///
/// `scan` enumerates the OS path into [`DiskFile`] and [`DiskDir`] children.
/// Re-scanning keeps the node identity of entries that still exist — handles
/// held by mount records or callers keep resolving — and drops entries that
/// vanished from disk. Children created virtually through `ensure_dir` are
/// not materialized on disk.
pub struct DiskDir {
    meta: NodeMeta,
    os_path: PathBuf,
    case: CaseMode,
    children: RwLock<DirChildren>,
}

impl DiskDir {
    fn new(full_path: impl Into<String>, os_path: PathBuf, case: CaseMode) -> Self {
        Self {
            meta: NodeMeta::new(full_path),
            os_path,
            case,
            children: RwLock::new(DirChildren::new(case)),
        }
    }

    /// Scans an OS path into a tree whose full paths equal the OS path.
    pub fn open(os_path: &str, case: CaseMode) -> VfsResult<Arc<Self>> {
        Self::open_at(&paths::fix_path(os_path), os_path, case)
    }

    /// Scans an OS path into a tree addressed as `full_path` — the empty
    /// string for a tree meant to sit at the namespace root.
    pub fn open_at(full_path: &str, os_path: &str, case: CaseMode) -> VfsResult<Arc<Self>> {
        let os = PathBuf::from(os_path);
        if os.exists() && !os.is_dir() {
            return Err(VfsError::NotADirectory { path: os_path.to_string() });
        }
        let dir = Arc::new(Self::new(full_path, os, case));
        dir.scan(true)?;
        Ok(dir)
    }

    pub fn os_path(&self) -> &PathBuf {
        &self.os_path
    }

    /// Re-enumerates the OS directory, reusing still-existing child nodes.
    /// Returns the number of entries seen (recursively when asked).
    pub fn scan(&self, recursive: bool) -> VfsResult<usize> {
        let listing = std::fs::read_dir(&self.os_path)?;
        let old = {
            let mut ch = self.children.write().unwrap();
            std::mem::replace(&mut *ch, DirChildren::new(self.case))
        };

        let mut fresh = DirChildren::new(self.case);
        let mut seen = 0;
        for entry in listing {
            let entry = entry?;
            let name = match entry.file_name().into_string() {
                Ok(n) => n,
                Err(raw) => {
                    warn!(name = ?raw, dir = %self.os_path.display(), "skipping non-UTF-8 entry");
                    continue;
                }
            };
            let kind = entry.file_type()?;
            if kind.is_file() {
                let file: FileHandle = match old.file(&name) {
                    Some(existing) => existing,
                    None => Arc::new(DiskFile::with_os_path(
                        paths::join(self.meta.full_path(), &name),
                        self.os_path.join(&name),
                    )),
                };
                fresh.put_file(file, true);
                seen += 1;
            } else if kind.is_dir() {
                let sub: DirHandle = match old.dir(&name) {
                    Some(existing) => existing,
                    None => Arc::new(DiskDir::new(
                        paths::join(self.meta.full_path(), &name),
                        self.os_path.join(&name),
                        self.case,
                    )),
                };
                if recursive {
                    seen += sub.load(true);
                }
                fresh.put_dir(sub);
                seen += 1;
            }
            // other kinds (symlinks, sockets) are out of scope
        }

        *self.children.write().unwrap() = fresh;
        Ok(seen)
    }
}

impl DirNode for DiskDir {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn backend(&self) -> &'static str {
        "disk"
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
        let child: DirHandle = Arc::new(DiskDir::new(
            paths::join(self.meta.full_path(), name),
            self.os_path.join(name),
            self.case,
        ));
        ch.put_dir(child.clone());
        child
    }

    fn create_new(&self, full_path: &str) -> DirHandle {
        // map the tree path back onto this node's OS prefix where possible
        let os_path = match full_path.strip_prefix(self.meta.full_path()) {
            Some(suffix) => self.os_path.join(suffix.trim_start_matches('/')),
            None => PathBuf::from(full_path),
        };
        Arc::new(DiskDir::new(full_path, os_path, self.case))
    }

    fn add(&self, file: FileHandle, overwrite: bool) -> bool {
        self.children.write().unwrap().put_file(file, overwrite)
    }

    fn load(&self, recursive: bool) -> usize {
        match self.scan(recursive) {
            Ok(n) => n,
            Err(err) => {
                warn!(dir = %self.os_path.display(), %err, "scan failed");
                0
            }
        }
    }

    fn next_file_after(&self, prev: Option<&str>) -> Option<(String, FileHandle)> {
        self.children.read().unwrap().next_file_after(prev)
    }

    fn next_dir_after(&self, prev: Option<&str>) -> Option<(String, DirHandle)> {
        self.children.read().unwrap().next_dir_after(prev)
    }
}
