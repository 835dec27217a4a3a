//! The ZIP archive loader: container file in, mountable tree out.

use std::any::Any;
use std::sync::Arc;

use tracing::{debug, warn};

use canopyfs_core::{
    paths, read_all, ArchiveLoader, ArchiveTree, CaseMode, DirExt, DirHandle, DirNode, FileHandle,
    MemDir, VfsFile,
};

use crate::file::{ZipArchive, ZipMemberFile};
use crate::index::{looks_like_zip, parse};

/// Recognizes ZIP containers and exposes them as directory trees.
///
/// The whole archive is read through the generic file contract — the
/// container may itself live on disk, in memory, or inside another archive,
/// which is what makes nested archives work without special cases. Members
/// carry the archive's bytes and decompress individually on first open.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipLoader {
    case: CaseMode,
}

impl ZipLoader {
    pub fn new(case: CaseMode) -> Self {
        Self { case }
    }
}

impl ArchiveLoader for ZipLoader {
    fn load(&self, archive: &FileHandle, _opaque: Option<&dyn Any>) -> Option<ArchiveTree> {
        let data = read_all(archive.as_ref())?;
        if !looks_like_zip(&data) {
            return None;
        }
        let index = match parse(&data) {
            Ok(index) => index,
            Err(err) => {
                warn!(archive = archive.full_path(), %err, "zip signature but no index");
                return None;
            }
        };

        let archive_path = archive.full_path().to_string();
        let shared = Arc::new(ZipArchive { data: data.clone() });
        let root: DirHandle = Arc::new(MemDir::new(archive_path.clone(), self.case));

        for entry in index.entries {
            let member = entry.name.trim_end_matches('/');
            if member.is_empty()
                || member.starts_with('/')
                || member.split('/').any(|seg| seg == "..")
            {
                warn!(archive = %archive_path, member = %entry.name, "skipping unsafe member path");
                continue;
            }
            if entry.is_dir() {
                let _ = root.get_dir(member, true);
                continue;
            }
            let parent = paths::parent_path(member).to_string();
            let file: FileHandle = Arc::new(ZipMemberFile::new(
                paths::join(&archive_path, member),
                entry,
                shared.clone(),
            ));
            match root.get_dir(&parent, true) {
                Some(dir) => {
                    dir.add(file, true);
                }
                None => {
                    root.add(file, true);
                }
            }
        }

        debug!(archive = %archive_path, "zip tree built");
        Some(ArchiveTree { root, loader: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canopyfs_core::{MemFile, OpenMode, VfsFile};
    use crate::test_util::build_zip;

    fn tree_for(entries: &[(&str, &[u8], bool)]) -> ArchiveTree {
        let data = build_zip(entries);
        let file: FileHandle = Arc::new(MemFile::with_content("pack.zip", data));
        ZipLoader::default().load(&file, None).unwrap()
    }

    #[test]
    fn test_tree_shape_and_paths() {
        let tree = tree_for(&[
            ("top.txt", b"t", false),
            ("sub/inner/deep.txt", b"d", true),
        ]);
        assert_eq!(tree.root.full_path(), "pack.zip");

        let f = tree.root.get_file("sub/inner/deep.txt").unwrap();
        assert_eq!(f.full_path(), "pack.zip/sub/inner/deep.txt");
        assert_eq!(f.backend(), "zip");
        assert!(f.open(OpenMode::Read));
        let mut buf = [0u8; 1];
        assert_eq!(f.read(&mut buf), 1);
        assert_eq!(&buf, b"d");
    }

    #[test]
    fn test_non_zip_is_declined() {
        let file: FileHandle = Arc::new(MemFile::with_content("notes.txt", &b"not an archive"[..]));
        assert!(ZipLoader::default().load(&file, None).is_none());
    }

    #[test]
    fn test_unsafe_members_skipped() {
        let tree = tree_for(&[("../escape.txt", b"x", false), ("ok.txt", b"y", false)]);
        assert!(tree.root.get_file("ok.txt").is_some());
        assert!(tree.root.get_file("../escape.txt").is_none());
        let names: Vec<String> =
            tree.root.files(canopyfs_core::IterMode::Snapshot).map(|(n, _)| n).collect();
        assert_eq!(names, vec!["ok.txt".to_string()]);
    }
}
