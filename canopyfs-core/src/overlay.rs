//! The merged-tree directory: a priority-ordered stack of mounted sources.

use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::dir::{same_dir, DirHandle, DirNode};
use crate::file::FileHandle;
use crate::node::{CaseMode, NameMap, NodeMeta};
use crate::paths;

/// How strongly a source is attached to an overlay node.
///
/// Strength never affects lookup priority — that is purely most-recent-first
/// stack order. It decides what `clear_mounts` strips during a rebuild:
/// implied mounts have no existence of their own and go first, explicit
/// mounts next, fixed mounts (base trees) last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MountStrength {
    /// Auto-created by recursive propagation into a subdirectory.
    Implied,
    /// An explicit mount requested by a caller.
    Mounted,
    /// Permanent attachment, e.g. the initial disk root.
    Fixed,
}

/// One entry of an overlay node's mount stack.
#[derive(Clone)]
pub struct MountedSource {
    pub dir: DirHandle,
    pub strength: MountStrength,
}

struct OverlayState {
    mounts: Vec<MountedSource>,
    files: NameMap<FileHandle>,
    subdirs: NameMap<Arc<OverlayDir>>,
}

/// A directory whose visible content is computed from a stack of mounted
/// source directories rather than stored directly.
///
/// Name lookups scan the stack from the most recently mounted source to the
/// least and fall back to locally inserted entries (loader splices and
/// force-created virtual subdirectories). Mounting a source recursively
/// propagates [`MountStrength::Implied`] mounts into same-named overlay
/// subdirectories, so a multi-level tree mounted once is resolvable at every
/// depth.
///
/// Mount cycles are not detected; mounting a directory into its own subtree
/// confuses resolution and is the caller's responsibility to avoid.
pub struct OverlayDir {
    meta: NodeMeta,
    case: CaseMode,
    state: RwLock<OverlayState>,
}

impl OverlayDir {
    pub fn new(full_path: impl Into<String>, case: CaseMode) -> Self {
        Self {
            meta: NodeMeta::new(full_path),
            case,
            state: RwLock::new(OverlayState {
                mounts: Vec::new(),
                files: NameMap::new(case),
                subdirs: NameMap::new(case),
            }),
        }
    }

    /// Creates an empty merged-tree root.
    pub fn root(case: CaseMode) -> Arc<Self> {
        Arc::new(Self::new("", case))
    }

    /// Mounts a source on top of the stack.
    ///
    /// If the same source (by identity) is already mounted here it moves to
    /// the top and keeps the stronger of its old and new strength rather
    /// than duplicating. Subdirectories of the source are propagated as
    /// implied mounts into same-named overlay children, recursively.
    pub fn mount(&self, source: &DirHandle, strength: MountStrength) {
        self.mount_inner(source, strength, true);
    }

    /// Mounts only if the source is not already in the stack; the stack
    /// order is left untouched otherwise. Used by propagation and by the
    /// lazy backfill in `dir_by_name`.
    fn mount_absent(&self, source: &DirHandle, strength: MountStrength) {
        self.mount_inner(source, strength, false);
    }

    fn mount_inner(&self, source: &DirHandle, strength: MountStrength, reorder: bool) {
        // mounting a node onto itself would recurse forever
        if std::ptr::eq(
            Arc::as_ptr(source) as *const u8,
            self as *const Self as *const u8,
        ) {
            return;
        }

        let proceed = {
            let mut st = self.state.write().unwrap();
            match st.mounts.iter().position(|m| same_dir(&m.dir, source)) {
                Some(pos) => {
                    if reorder {
                        let mut entry = st.mounts.remove(pos);
                        entry.strength = entry.strength.max(strength);
                        st.mounts.push(entry);
                        true
                    } else {
                        false
                    }
                }
                None => {
                    st.mounts.push(MountedSource { dir: source.clone(), strength });
                    true
                }
            }
        };
        if !proceed {
            return;
        }

        trace!(
            at = self.meta.full_path(),
            source = source.full_path(),
            ?strength,
            "mounted source"
        );

        // propagate into subdirectories of the source
        let mut cursor: Option<String> = None;
        while let Some((name, sub)) = source.next_dir_after(cursor.as_deref()) {
            let child = self.overlay_child(&name);
            child.mount_inner(&sub, MountStrength::Implied, reorder);
            cursor = Some(name);
        }
    }

    /// Removes stack entries matching the source by identity. Implied
    /// mounts propagated into subdirectories are *not* repaired here; the
    /// registry restores consistency with a full reload.
    pub fn unmount(&self, source: &DirHandle) -> bool {
        let mut st = self.state.write().unwrap();
        let before = st.mounts.len();
        st.mounts.retain(|m| !same_dir(&m.dir, source));
        before != st.mounts.len()
    }

    /// Recursively strips mounts with strength at or below `threshold` from
    /// this node and all subdirectories. Implied mounts cascade away with
    /// the mount that produced them.
    ///
    /// The overlay child nodes themselves stay in place: mount records and
    /// callers hold handles to them, and the registry's rebuild re-fills the
    /// same nodes so those handles keep resolving.
    pub fn clear_mounts(&self, threshold: MountStrength) {
        let children: Vec<Arc<OverlayDir>> = {
            let mut st = self.state.write().unwrap();
            st.mounts.retain(|m| m.strength > threshold);
            st.subdirs.values().cloned().collect()
        };
        for child in &children {
            child.clear_mounts(threshold);
        }
    }

    /// Resolves a chain of overlay nodes by relative path, optionally
    /// force-creating the missing tail. Leading `"./"` segments are skipped
    /// per level, like the generic resolvers.
    pub fn descend(self: &Arc<Self>, path: &str, create: bool) -> Option<Arc<OverlayDir>> {
        let mut cur = self.clone();
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
            let next = cur.resolve_overlay(head, create)?;
            cur = next;
            match rest {
                Some(r) => p = r,
                None => return Some(cur),
            }
        }
    }

    /// Number of mounted sources (diagnostics and tests).
    pub fn mount_count(&self) -> usize {
        self.state.read().unwrap().mounts.len()
    }

    fn overlay_child_get(&self, name: &str) -> Option<Arc<OverlayDir>> {
        self.state.read().unwrap().subdirs.get(name)
    }

    fn overlay_child(&self, name: &str) -> Arc<OverlayDir> {
        if let Some(child) = self.overlay_child_get(name) {
            return child;
        }
        let mut st = self.state.write().unwrap();
        if let Some(child) = st.subdirs.get(name) {
            return child;
        }
        let child = Arc::new(OverlayDir::new(
            paths::join(self.meta.full_path(), name),
            self.case,
        ));
        st.subdirs.insert(name, child.clone());
        child
    }

    /// The typed subdirectory resolution backing `dir_by_name`/`ensure_dir`.
    ///
    /// A name backed only by a mounted source gets an overlay child created
    /// (or found) with the source subdir backfilled as an implied mount —
    /// this covers source subdirectories that appeared after the original
    /// mount propagation ran.
    fn resolve_overlay(&self, name: &str, create: bool) -> Option<Arc<OverlayDir>> {
        let backing = {
            let st = self.state.read().unwrap();
            st.mounts
                .iter()
                .rev()
                .find_map(|m| m.dir.dir_by_name(name))
        };
        match (self.overlay_child_get(name), backing) {
            (Some(child), Some(src)) => {
                child.mount_absent(&src, MountStrength::Implied);
                Some(child)
            }
            (Some(child), None) => Some(child),
            (None, Some(src)) => {
                let child = self.overlay_child(name);
                child.mount_absent(&src, MountStrength::Implied);
                Some(child)
            }
            (None, None) if create => Some(self.overlay_child(name)),
            (None, None) => None,
        }
    }
}

impl DirNode for OverlayDir {
    fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    fn backend(&self) -> &'static str {
        "overlay"
    }

    fn case_mode(&self) -> CaseMode {
        self.case
    }

    fn file_by_name(&self, name: &str) -> Option<FileHandle> {
        let st = self.state.read().unwrap();
        for m in st.mounts.iter().rev() {
            if let Some(f) = m.dir.file_by_name(name) {
                return Some(f);
            }
        }
        st.files.get(name)
    }

    fn dir_by_name(&self, name: &str) -> Option<DirHandle> {
        self.resolve_overlay(name, false).map(|d| d as DirHandle)
    }

    fn ensure_dir(&self, name: &str) -> DirHandle {
        // create=true never yields None
        match self.resolve_overlay(name, true) {
            Some(d) => d as DirHandle,
            None => self.overlay_child(name) as DirHandle,
        }
    }

    fn create_new(&self, full_path: &str) -> DirHandle {
        Arc::new(OverlayDir::new(full_path, self.case))
    }

    fn add(&self, file: FileHandle, overwrite: bool) -> bool {
        let mut st = self.state.write().unwrap();
        if let Some(existing) = st.files.get(file.name()) {
            if crate::file::same_file(&existing, &file) {
                return false;
            }
            if !overwrite {
                return false;
            }
        }
        let name = file.name().to_string();
        st.files.insert(&name, file);
        true
    }

    fn load(&self, recursive: bool) -> usize {
        let mounts: Vec<MountedSource> = self.state.read().unwrap().mounts.clone();
        let mut seen = 0;
        for m in &mounts {
            seen += m.dir.load(recursive);
        }
        // refresh implied propagation for sources that grew
        for m in &mounts {
            let mut cursor: Option<String> = None;
            while let Some((name, sub)) = m.dir.next_dir_after(cursor.as_deref()) {
                let child = self.overlay_child(&name);
                child.mount_absent(&sub, MountStrength::Implied);
                cursor = Some(name);
            }
        }
        seen
    }

    fn next_file_after(&self, prev: Option<&str>) -> Option<(String, FileHandle)> {
        let st = self.state.read().unwrap();
        let mut best: Option<(String, FileHandle)> = None;
        // top of the stack first, so on equal names the priority hit is kept
        for m in st.mounts.iter().rev() {
            if let Some((name, f)) = m.dir.next_file_after(prev) {
                let better = match &best {
                    Some((bn, _)) => self.case.fold(&name) < self.case.fold(bn),
                    None => true,
                };
                if better {
                    best = Some((name, f));
                }
            }
        }
        if let Some((name, f)) = st.files.next_after(prev) {
            let better = match &best {
                Some((bn, _)) => self.case.fold(&name) < self.case.fold(bn),
                None => true,
            };
            if better {
                best = Some((name, f));
            }
        }
        best
    }

    fn next_dir_after(&self, prev: Option<&str>) -> Option<(String, DirHandle)> {
        let best_name = {
            let st = self.state.read().unwrap();
            let mut best: Option<String> = None;
            for m in st.mounts.iter().rev() {
                if let Some((name, _)) = m.dir.next_dir_after(prev) {
                    let better = match &best {
                        Some(bn) => self.case.fold(&name) < self.case.fold(bn),
                        None => true,
                    };
                    if better {
                        best = Some(name);
                    }
                }
            }
            if let Some((name, _)) = st.subdirs.next_after(prev) {
                let better = match &best {
                    Some(bn) => self.case.fold(&name) < self.case.fold(bn),
                    None => true,
                };
                if better {
                    best = Some(name);
                }
            }
            best
        };
        let name = best_name?;
        let handle = self.dir_by_name(&name)?;
        Some((name, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dir::{DirExt, IterMode};
    use crate::file::read_all;
    use crate::memory::{MemDir, MemFile};

    /// Builds `<root>/data/file.txt` containing `content`.
    fn source(root_name: &str, content: &[u8]) -> DirHandle {
        let dir: DirHandle = Arc::new(MemDir::new(root_name, CaseMode::Sensitive));
        let data = dir.ensure_dir("data");
        data.add(
            Arc::new(MemFile::with_content(
                format!("{root_name}/data/file.txt"),
                content.to_vec(),
            )),
            true,
        );
        dir
    }

    fn first_byte(f: &FileHandle) -> u8 {
        read_all(f.as_ref()).unwrap()[0]
    }

    #[test]
    fn test_last_mounted_wins() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let a = source("a", b"A");
        let b = source("b", b"B");
        root.mount(&a, MountStrength::Mounted);
        root.mount(&b, MountStrength::Mounted);

        let handle: DirHandle = root.clone();
        let f = handle.get_file("data/file.txt").unwrap();
        assert_eq!(first_byte(&f), b'B');

        // opposite order, opposite winner
        let root2 = OverlayDir::root(CaseMode::Sensitive);
        root2.mount(&b, MountStrength::Mounted);
        root2.mount(&a, MountStrength::Mounted);
        let handle2: DirHandle = root2.clone();
        let f = handle2.get_file("data/file.txt").unwrap();
        assert_eq!(first_byte(&f), b'A');
    }

    #[test]
    fn test_remount_moves_to_top() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let a = source("a", b"A");
        let b = source("b", b"B");
        root.mount(&a, MountStrength::Mounted);
        root.mount(&b, MountStrength::Mounted);
        root.mount(&a, MountStrength::Mounted);
        assert_eq!(root.mount_count(), 2);

        let handle: DirHandle = root.clone();
        let f = handle.get_file("data/file.txt").unwrap();
        assert_eq!(first_byte(&f), b'A');
    }

    #[test]
    fn test_strength_upgrades_never_downgrade() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let a = source("a", b"A");
        root.mount(&a, MountStrength::Fixed);
        root.mount(&a, MountStrength::Mounted);
        // still fixed: clearing explicit mounts leaves it in place
        root.clear_mounts(MountStrength::Mounted);
        assert_eq!(root.mount_count(), 1);
    }

    #[test]
    fn test_implied_propagation_multi_level() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let src: DirHandle = Arc::new(MemDir::new("pack", CaseMode::Sensitive));
        let deep = src.get_dir("x/y/z", true).unwrap();
        deep.add(Arc::new(MemFile::with_content("pack/x/y/z/f.txt", &b"deep"[..])), true);

        root.mount(&src, MountStrength::Mounted);
        let handle: DirHandle = root.clone();
        // every level resolves through implied mounts, no manual re-mounts
        let f = handle.get_file("x/y/z/f.txt").unwrap();
        assert_eq!(first_byte(&f), b'd');
        let mid = handle.get_dir("x/y", false).unwrap();
        assert_eq!(mid.backend(), "overlay");
    }

    #[test]
    fn test_unmount_leaves_implied_entries() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let a = source("a", b"A");
        root.mount(&a, MountStrength::Mounted);
        assert!(root.unmount(&a));
        assert!(!root.unmount(&a));
        // no in-place repair: the implied child mount is still there until
        // the registry rebuilds
        let handle: DirHandle = root.clone();
        assert!(handle.get_file("data/file.txt").is_some());
        root.clear_mounts(MountStrength::Mounted);
        let handle: DirHandle = root.clone();
        assert!(handle.get_file("data/file.txt").is_none());
    }

    #[test]
    fn test_clear_mounts_cascades_but_keeps_nodes() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let a = source("a", b"A");
        root.mount(&a, MountStrength::Mounted);
        let data_before = root.overlay_child_get("data").unwrap();
        assert_eq!(data_before.mount_count(), 1);

        root.clear_mounts(MountStrength::Mounted);
        assert_eq!(root.mount_count(), 0);
        // the implied mount is gone, the node identity is not
        let data_after = root.overlay_child_get("data").unwrap();
        assert!(Arc::ptr_eq(&data_before, &data_after));
        assert_eq!(data_after.mount_count(), 0);
        assert!(data_after.file_by_name("file.txt").is_none());

        // re-mounting re-fills the same child node
        root.mount(&a, MountStrength::Mounted);
        assert_eq!(data_after.mount_count(), 1);
    }

    #[test]
    fn test_clear_mounts_keeps_spliced_files() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let a = source("a", b"A");
        root.mount(&a, MountStrength::Mounted);

        let handle: DirHandle = root.clone();
        handle.add_recursive(Arc::new(MemFile::with_content("virtual/v.txt", &b"v"[..])), true);

        root.clear_mounts(MountStrength::Fixed);
        let handle: DirHandle = root.clone();
        assert!(handle.get_file("data/file.txt").is_none());
        // locally inserted content has independent existence
        assert!(handle.get_file("virtual/v.txt").is_some());
    }

    #[test]
    fn test_local_files_lose_to_mounts() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let handle: DirHandle = root.clone();
        handle.add_recursive(
            Arc::new(MemFile::with_content("data/file.txt", &b"local"[..])),
            true,
        );
        let f = handle.get_file("data/file.txt").unwrap();
        assert_eq!(first_byte(&f), b'l');

        let a = source("a", b"A");
        root.mount(&a, MountStrength::Mounted);
        let f = handle.get_file("data/file.txt").unwrap();
        assert_eq!(first_byte(&f), b'A');
    }

    #[test]
    fn test_merged_iteration_dedupes_by_priority() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let a: DirHandle = Arc::new(MemDir::new("a", CaseMode::Sensitive));
        a.add(Arc::new(MemFile::with_content("a/shared.txt", &b"a"[..])), true);
        a.add(Arc::new(MemFile::with_content("a/only-a.txt", &b"a"[..])), true);
        let b: DirHandle = Arc::new(MemDir::new("b", CaseMode::Sensitive));
        b.add(Arc::new(MemFile::with_content("b/shared.txt", &b"b"[..])), true);
        b.add(Arc::new(MemFile::with_content("b/only-b.txt", &b"b"[..])), true);

        root.mount(&a, MountStrength::Mounted);
        root.mount(&b, MountStrength::Mounted);

        let handle: DirHandle = root.clone();
        let listed: Vec<(String, u8)> = handle
            .files(IterMode::Snapshot)
            .map(|(n, f)| (n, first_byte(&f)))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("only-a.txt".to_string(), b'a'),
                ("only-b.txt".to_string(), b'b'),
                // the name collision resolves to the later mount
                ("shared.txt".to_string(), b'b'),
            ]
        );
    }

    #[test]
    fn test_late_source_subdir_backfills() {
        let root = OverlayDir::root(CaseMode::Sensitive);
        let src: DirHandle = Arc::new(MemDir::new("pack", CaseMode::Sensitive));
        root.mount(&src, MountStrength::Mounted);

        // the source grows after the mount propagation ran
        let late = src.get_dir("late", true).unwrap();
        late.add(Arc::new(MemFile::with_content("pack/late/f.txt", &b"x"[..])), true);

        let handle: DirHandle = root.clone();
        let f = handle.get_file("late/f.txt").unwrap();
        assert_eq!(first_byte(&f), b'x');
    }
}
