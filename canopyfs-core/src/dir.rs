//! The directory capability interface, path resolution and merging.
//!
//! Every directory variant — in-memory, disk-backed, archive-backed, overlay
//! — implements the small [`DirNode`] interface. Path walking, recursive
//! insertion and merging are built on top of it once, in [`DirExt`], and
//! work identically across variants and compositions of variants.

use std::sync::Arc;

use crate::file::{same_file, FileHandle};
use crate::node::{CaseMode, NameMap, NodeMeta};
use crate::paths;

/// Shared handle to a directory node.
pub type DirHandle = Arc<dyn DirNode>;

/// Identity comparison for directory handles.
pub fn same_dir(a: &DirHandle, b: &DirHandle) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const u8,
        Arc::as_ptr(b) as *const u8,
    )
}

/// The capability interface implemented by every directory variant.
///
/// Lookups return `None` on a miss — there is no partial-success state and
/// no panic across the resolution boundary. Mutation of a node's maps is
/// serialized per node by the implementations; callers iterating while
/// mutating from other threads should use [`IterMode::Snapshot`].
pub trait DirNode: Send + Sync {
    /// Node identity (name and recorded full path).
    fn meta(&self) -> &NodeMeta;

    /// Backend label, for diagnostics only.
    fn backend(&self) -> &'static str;

    /// Case handling inherited by children created through this node.
    fn case_mode(&self) -> CaseMode;

    /// Looks up an immediate child file by bare name.
    fn file_by_name(&self, name: &str) -> Option<FileHandle>;

    /// Looks up an immediate child directory by bare name.
    fn dir_by_name(&self, name: &str) -> Option<DirHandle>;

    /// Finds or creates the immediate child directory of the given name.
    /// Created children are of the same concrete type as `self`.
    fn ensure_dir(&self, name: &str) -> DirHandle;

    /// Creates a detached sibling-type directory with the given full path.
    fn create_new(&self, full_path: &str) -> DirHandle;

    /// Inserts a file directly into this directory. An occupant of the same
    /// name is replaced only when `overwrite` is set; re-adding the same
    /// node is a no-op. Returns whether anything changed.
    fn add(&self, file: FileHandle, overwrite: bool) -> bool;

    /// Re-scans the backing source, returning the number of entries seen.
    /// Purely virtual directories have nothing to re-scan.
    fn load(&self, recursive: bool) -> usize {
        let _ = recursive;
        0
    }

    /// Ordered cursor over child files: the first entry strictly after
    /// `prev`, or the first entry overall. Powers the enumeration types.
    fn next_file_after(&self, prev: Option<&str>) -> Option<(String, FileHandle)>;

    /// Ordered cursor over child directories, same contract.
    fn next_dir_after(&self, prev: Option<&str>) -> Option<(String, DirHandle)>;

    fn name(&self) -> &str {
        self.meta().name()
    }

    fn full_path(&self) -> &str {
        self.meta().full_path()
    }
}

/// The name-keyed child maps shared by the concrete (non-overlay) directory
/// variants. Holds files and subdirectories; the owning type wraps this in
/// its per-node lock.
pub struct DirChildren {
    files: NameMap<FileHandle>,
    subdirs: NameMap<DirHandle>,
}

impl DirChildren {
    pub fn new(case: CaseMode) -> Self {
        Self {
            files: NameMap::new(case),
            subdirs: NameMap::new(case),
        }
    }

    pub fn file(&self, name: &str) -> Option<FileHandle> {
        self.files.get(name)
    }

    pub fn dir(&self, name: &str) -> Option<DirHandle> {
        self.subdirs.get(name)
    }

    /// Applies the `add` overwrite policy. Returns whether a change occurred.
    pub fn put_file(&mut self, file: FileHandle, overwrite: bool) -> bool {
        if let Some(existing) = self.files.get(file.name()) {
            if same_file(&existing, &file) {
                return false;
            }
            if !overwrite {
                return false;
            }
        }
        let name = file.name().to_string();
        self.files.insert(&name, file);
        true
    }

    /// Attaches a subdirectory unconditionally under its own name.
    pub fn put_dir(&mut self, dir: DirHandle) {
        let name = dir.name().to_string();
        self.subdirs.insert(&name, dir);
    }

    pub fn next_file_after(&self, prev: Option<&str>) -> Option<(String, FileHandle)> {
        self.files.next_after(prev)
    }

    pub fn next_dir_after(&self, prev: Option<&str>) -> Option<(String, DirHandle)> {
        self.subdirs.next_after(prev)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn dir_count(&self) -> usize {
        self.subdirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.subdirs.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.subdirs.clear();
    }
}

/// Enumeration mode for the child iterators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IterMode {
    /// Clone the entries up front. Every yielded handle is held for the
    /// duration, so concurrent removal cannot invalidate the iteration.
    #[default]
    Snapshot,
    /// Keyed cursor against the live maps. Tolerates mutation between steps
    /// and holds no handles beyond the one last yielded.
    Live,
}

/// Lazy, restartable iterator over `(name, file)` pairs.
pub struct FileEntries<'a> {
    dir: &'a dyn DirNode,
    cursor: Option<String>,
    snapshot: Option<std::vec::IntoIter<(String, FileHandle)>>,
}

impl<'a> FileEntries<'a> {
    pub fn new(dir: &'a dyn DirNode, mode: IterMode) -> Self {
        let snapshot = match mode {
            IterMode::Snapshot => {
                let mut items = Vec::new();
                let mut cur: Option<String> = None;
                while let Some((name, file)) = dir.next_file_after(cur.as_deref()) {
                    cur = Some(name.clone());
                    items.push((name, file));
                }
                Some(items.into_iter())
            }
            IterMode::Live => None,
        };
        Self { dir, cursor: None, snapshot }
    }
}

impl Iterator for FileEntries<'_> {
    type Item = (String, FileHandle);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.snapshot {
            Some(items) => items.next(),
            None => {
                let next = self.dir.next_file_after(self.cursor.as_deref());
                if let Some((name, _)) = &next {
                    self.cursor = Some(name.clone());
                }
                next
            }
        }
    }
}

/// Lazy, restartable iterator over `(name, directory)` pairs.
pub struct DirEntries<'a> {
    dir: &'a dyn DirNode,
    cursor: Option<String>,
    snapshot: Option<std::vec::IntoIter<(String, DirHandle)>>,
}

impl<'a> DirEntries<'a> {
    pub fn new(dir: &'a dyn DirNode, mode: IterMode) -> Self {
        let snapshot = match mode {
            IterMode::Snapshot => {
                let mut items = Vec::new();
                let mut cur: Option<String> = None;
                while let Some((name, sub)) = dir.next_dir_after(cur.as_deref()) {
                    cur = Some(name.clone());
                    items.push((name, sub));
                }
                Some(items.into_iter())
            }
            IterMode::Live => None,
        };
        Self { dir, cursor: None, snapshot }
    }
}

impl Iterator for DirEntries<'_> {
    type Item = (String, DirHandle);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.snapshot {
            Some(items) => items.next(),
            None => {
                let next = self.dir.next_dir_after(self.cursor.as_deref());
                if let Some((name, _)) = &next {
                    self.cursor = Some(name.clone());
                }
                next
            }
        }
    }
}

/// Path resolution, recursive insertion and merging over any [`DirNode`].
///
/// Resolution tokenizes on `/` and strips leading `"./"` segments at every
/// level. A leading empty token — the absolute-style `/home/...` shape — is
/// an ordinary child name (the root's empty-named child), not an error.
/// Duplicate and trailing slashes are *not* handled here; input is expected
/// to have passed through [`paths::fix_path`] first.
pub trait DirExt {
    /// Resolves a file by relative path. A bare name with no `/` resolves
    /// directly in this directory.
    fn get_file(&self, path: &str) -> Option<FileHandle>;

    /// Resolves a subdirectory by relative path. `""`, `"."` and `"./"`
    /// resolve to this directory. With `create`, missing intermediates are
    /// synthesized with the concrete type of their parent.
    fn get_dir(&self, path: &str, create: bool) -> Option<DirHandle>;

    /// Inserts a file at the subdirectory chain encoded in its full path,
    /// force-creating intermediates.
    fn add_recursive(&self, file: FileHandle, overwrite: bool) -> bool;

    /// Merges `subdir`'s contents under its name here. A fresh sibling-type
    /// directory is created when the name is vacant — the caller's object is
    /// never aliased into this tree, so later mutation of either namespace
    /// cannot leak into the other. Leaf files are shared, not cloned.
    fn insert_dir(&self, subdir: &DirHandle, overwrite: bool) -> bool;

    /// Applies `add` for every file and `insert_dir` for every subdirectory
    /// of `other`. Returns whether anything changed.
    fn merge_from(&self, other: &DirHandle, overwrite: bool) -> bool;

    fn files(&self, mode: IterMode) -> FileEntries<'_>;

    fn dirs(&self, mode: IterMode) -> DirEntries<'_>;
}

impl DirExt for DirHandle {
    fn get_file(&self, path: &str) -> Option<FileHandle> {
        let mut cur: DirHandle = self.clone();
        let mut p = path;
        loop {
            while let Some(rest) = p.strip_prefix("./") {
                p = rest;
            }
            match p.find('/') {
                Some(i) => {
                    cur = cur.dir_by_name(&p[..i])?;
                    p = &p[i + 1..];
                }
                None => {
                    return if p.is_empty() { None } else { cur.file_by_name(p) };
                }
            }
        }
    }

    fn get_dir(&self, path: &str, create: bool) -> Option<DirHandle> {
        let mut cur: DirHandle = self.clone();
        let mut p = path;
        loop {
            while let Some(rest) = p.strip_prefix("./") {
                p = rest;
            }
            if p.is_empty() || p == "." {
                return Some(cur);
            }
            let (head, rest) = match p.find('/') {
                Some(i) => (&p[..i], Some(&p[i + 1..])),
                None => (p, None),
            };
            let next = match cur.dir_by_name(head) {
                Some(d) => d,
                None if create => cur.ensure_dir(head),
                None => return None,
            };
            cur = next;
            match rest {
                Some(r) => p = r,
                None => return Some(cur),
            }
        }
    }

    fn add_recursive(&self, file: FileHandle, overwrite: bool) -> bool {
        let parent = paths::parent_path(file.full_path()).to_string();
        if parent.is_empty() {
            self.add(file, overwrite)
        } else {
            match self.get_dir(&parent, true) {
                Some(dir) => dir.add(file, overwrite),
                None => false,
            }
        }
    }

    fn insert_dir(&self, subdir: &DirHandle, overwrite: bool) -> bool {
        let existed = self.dir_by_name(subdir.name()).is_some();
        let target = self.ensure_dir(subdir.name());
        let changed = target.merge_from(subdir, overwrite);
        !existed || changed
    }

    fn merge_from(&self, other: &DirHandle, overwrite: bool) -> bool {
        if same_dir(self, other) {
            return false;
        }
        let mut changed = false;
        for (_, file) in other.files(IterMode::Snapshot) {
            changed = self.add(file, overwrite) || changed;
        }
        for (_, sub) in other.dirs(IterMode::Snapshot) {
            changed = self.insert_dir(&sub, overwrite) || changed;
        }
        changed
    }

    fn files(&self, mode: IterMode) -> FileEntries<'_> {
        FileEntries::new(&**self, mode)
    }

    fn dirs(&self, mode: IterMode) -> DirEntries<'_> {
        DirEntries::new(&**self, mode)
    }
}
