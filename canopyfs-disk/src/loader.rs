//! On-demand materialization of real files and directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use canopyfs_core::{CaseMode, DirHandle, FileHandle, Loader};

use crate::dir::DiskDir;
use crate::file::DiskFile;

/// Answers tree misses from the real filesystem.
///
/// The normalized path is tried first; the caller's original spelling is the
/// fallback for inputs the normalization changed (backslashes, stray dots).
/// Either way the produced node is addressed in the tree under the
/// normalized path.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskLoader {
    case: CaseMode,
}

impl DiskLoader {
    pub fn new(case: CaseMode) -> Self {
        Self { case }
    }
}

impl Loader for DiskLoader {
    fn load(&self, path: &str, original: &str) -> Option<FileHandle> {
        if Path::new(path).is_file() {
            debug!(path, "disk file");
            return Some(Arc::new(DiskFile::new(path)));
        }
        if original != path && Path::new(original).is_file() {
            debug!(path, original, "disk file via original spelling");
            return Some(Arc::new(DiskFile::with_os_path(path, PathBuf::from(original))));
        }
        None
    }

    fn load_dir(&self, path: &str, original: &str) -> Option<DirHandle> {
        if Path::new(path).is_dir() {
            debug!(path, "disk dir");
            return DiskDir::open_at(path, path, self.case).ok().map(|d| d as DirHandle);
        }
        if original != path && Path::new(original).is_dir() {
            debug!(path, original, "disk dir via original spelling");
            return DiskDir::open_at(path, original, self.case)
                .ok()
                .map(|d| d as DirHandle);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopyfs_core::VfsFile;
    use std::io::Write as _;

    #[test]
    fn test_loader_finds_files_and_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("d")).unwrap();
        std::fs::File::create(tmp.path().join("d/f.txt"))
            .unwrap()
            .write_all(b"x")
            .unwrap();

        let loader = DiskLoader::default();
        let file_path = tmp.path().join("d/f.txt").to_string_lossy().to_string();
        let dir_path = tmp.path().join("d").to_string_lossy().to_string();

        let f = loader.load(&file_path, &file_path).unwrap();
        assert_eq!(f.backend(), "disk");
        assert!(loader.load(&dir_path, &dir_path).is_none());
        assert!(loader.load_dir(&dir_path, &dir_path).is_some());
        assert!(loader.load_dir(&file_path, &file_path).is_none());
    }
}
