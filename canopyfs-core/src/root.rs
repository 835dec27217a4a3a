//! The mount registry: owns the merged tree and everything attached to it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::dir::{same_dir, DirExt, DirHandle, DirNode, IterMode};
use crate::error::{VfsError, VfsResult};
use crate::file::{FileHandle, VfsFile};
use crate::loader::{ArchiveLoader, Loader};
use crate::node::CaseMode;
use crate::overlay::{MountStrength, OverlayDir};
use crate::paths;

/// A live mount: a source directory attached at a destination path.
///
/// At most one record exists per destination and source identity, where
/// identity is pointer equality or case-insensitive source-path equality.
/// Re-mounting the same pair moves the record to the end of the list (the
/// replay order is the mount order) and the most recent overwrite flag wins.
#[derive(Clone)]
pub struct MountRecord {
    pub source: DirHandle,
    pub dest: String,
    pub overwrite: bool,
}

/// A top-level loaded root — the disk root, an opened archive — tracked by
/// its original path independent of where it is currently mounted.
#[derive(Clone)]
pub struct BaseTree {
    pub label: String,
    pub root: DirHandle,
    at_root: bool,
}

/// The merged-namespace registry.
///
/// Owns the overlay root, the ordered mount records, the registered loaders
/// and archive loaders, and the base trees. All tree state is reachable only
/// through counted handles, so tearing the registry down never invalidates a
/// node some caller still holds.
///
/// The registry itself is not internally locked; multi-threaded callers wrap
/// it in their own mutual exclusion, as with any other shared structure.
pub struct VfsRoot {
    case: CaseMode,
    merged: Arc<OverlayDir>,
    records: Vec<MountRecord>,
    loaders: Vec<Arc<dyn Loader>>,
    archive_loaders: Vec<Arc<dyn ArchiveLoader>>,
    base_trees: Vec<BaseTree>,
}

impl VfsRoot {
    pub fn new(case: CaseMode) -> Self {
        Self {
            case,
            merged: OverlayDir::root(case),
            records: Vec::new(),
            loaders: Vec::new(),
            archive_loaders: Vec::new(),
            base_trees: Vec::new(),
        }
    }

    pub fn case_mode(&self) -> CaseMode {
        self.case
    }

    /// The merged tree root.
    pub fn root_dir(&self) -> DirHandle {
        self.merged.clone()
    }

    /// Registers an on-demand loader. Order of registration is the order of
    /// consultation.
    pub fn add_loader(&mut self, loader: Arc<dyn Loader>) {
        self.loaders.push(loader);
    }

    /// Registers an archive loader. Stays registered for the lifetime of the
    /// registry (or until [`VfsRoot::clear`]).
    pub fn add_archive_loader(&mut self, loader: Arc<dyn ArchiveLoader>) {
        self.archive_loaders.push(loader);
    }

    /// Registers a top-level root and attaches it permanently at the merged
    /// root. Typically the scanned working directory.
    pub fn add_base_tree(&mut self, label: &str, root: DirHandle) {
        let label = paths::fix_path(label);
        info!(label = %label, source = root.full_path(), "base tree");
        self.merged.mount(&root, MountStrength::Fixed);
        self.store_base_tree(BaseTree { label, root, at_root: true });
    }

    /// Looks up a base tree by its original path.
    pub fn base_tree(&self, label: &str) -> Option<DirHandle> {
        let key = self.case.fold(&paths::fix_path(label));
        self.base_trees
            .iter()
            .find(|bt| self.case.fold(&bt.label) == key)
            .map(|bt| bt.root.clone())
    }

    /// Mounts an existing directory of the tree at a different location.
    ///
    /// The source must already resolve (loaders may answer); nothing is
    /// force-created on the source side. Careful with cycles — mounting a
    /// directory into its own subtree confuses resolution.
    pub fn mount(&mut self, src: &str, dest: &str, overwrite: bool) -> VfsResult<()> {
        let src_fixed = paths::fix_path(src);
        let dir = self
            .get_dir(&src_fixed, false)
            .ok_or(VfsError::MountSourceMissing { path: src_fixed })?;
        self.attach(dir, &paths::fix_path(dest), overwrite);
        Ok(())
    }

    /// Removes the mount record matching the pair, then rebuilds the merged
    /// tree. Heavier than `mount` — the rebuild replays every remaining
    /// record.
    pub fn unmount(&mut self, src: &str, dest: &str) -> VfsResult<()> {
        let src_fixed = paths::fix_path(src);
        let dest_fixed = paths::fix_path(dest);
        let handle = self.get_dir(&src_fixed, false);
        let pos = self
            .records
            .iter()
            .position(|r| {
                r.dest == dest_fixed
                    && (handle.as_ref().is_some_and(|h| same_dir(&r.source, h))
                        || r.source.full_path().eq_ignore_ascii_case(&src_fixed))
            })
            .ok_or(VfsError::MountNotFound { mount_source: src_fixed, dest: dest_fixed })?;
        let removed = self.records.remove(pos);
        debug!(source = removed.source.full_path(), dest = %removed.dest, "unmounted");
        self.reload(false);
        Ok(())
    }

    /// Mounts a directory that need not be reachable from the tree yet —
    /// freshly scanned external paths, archive roots. The default
    /// destination is the directory's own recorded path.
    pub fn add_directory(&mut self, dir: DirHandle, dest: Option<&str>, overwrite: bool) {
        let dest = match dest {
            Some(d) => paths::fix_path(d),
            None => dir.full_path().to_string(),
        };
        self.attach(dir, &dest, overwrite);
    }

    /// Opens an archive file and mounts its contents at the archive's own
    /// path, so members resolve as `pack.zip/inner/file.txt`. The mounted
    /// tree is itself addressable, which is what makes nested archives work:
    /// a member that is an archive can be passed straight back in.
    ///
    /// `opaque` is handed to each archive loader untouched.
    pub fn add_archive(&mut self, path: &str, opaque: Option<&dyn Any>) -> VfsResult<DirHandle> {
        let fixed = paths::fix_path(path);
        let file = self
            .get_file(&fixed)
            .ok_or(VfsError::NotFound { path: fixed.clone() })?;
        let tree = self
            .archive_loaders
            .iter()
            .find_map(|al| al.load(&file, opaque))
            .ok_or(VfsError::ArchiveUnrecognized { path: fixed.clone() })?;

        info!(path = %fixed, "archive opened");
        if let Some(member_loader) = tree.loader {
            self.loaders.push(member_loader);
        }
        self.store_base_tree(BaseTree {
            label: fixed.clone(),
            root: tree.root.clone(),
            at_root: false,
        });
        self.attach(tree.root.clone(), &fixed, true);
        Ok(tree.root)
    }

    /// Resolves a file in the merged tree; on a miss, consults loaders in
    /// order and splices the first hit into the tree so the next lookup is
    /// answered without them.
    pub fn get_file(&self, path: &str) -> Option<FileHandle> {
        let fixed = paths::fix_path(path);
        let root = self.root_dir();
        if let Some(f) = root.get_file(&fixed) {
            return Some(f);
        }
        for loader in &self.loaders {
            if let Some(f) = loader.load(&fixed, path) {
                debug!(path = %fixed, backend = f.backend(), "loader splice");
                root.add_recursive(f.clone(), true);
                return Some(f);
            }
        }
        None
    }

    /// Resolves a directory in the merged tree; loaders are consulted on a
    /// miss, and with `create` an empty virtual directory is force-created
    /// as a last resort.
    pub fn get_dir(&self, path: &str, create: bool) -> Option<DirHandle> {
        let fixed = paths::fix_path(path);
        let root = self.root_dir();
        if fixed.is_empty() {
            return Some(root);
        }
        if let Some(d) = root.get_dir(&fixed, false) {
            return Some(d);
        }
        for loader in &self.loaders {
            if let Some(d) = loader.load_dir(&fixed, path) {
                debug!(path = %fixed, backend = d.backend(), "loader dir splice");
                let parent = paths::parent_path(&fixed).to_string();
                let parent_dir = if parent.is_empty() {
                    root.clone()
                } else {
                    root.get_dir(&parent, true)?
                };
                parent_dir.insert_dir(&d, true);
                // the splice adopts a fresh sibling, re-resolve for the tree node
                return root.get_dir(&fixed, false);
            }
        }
        if create {
            root.get_dir(&fixed, true)
        } else {
            None
        }
    }

    /// Rebuilds the merged tree: re-scans base trees when `from_disk`,
    /// strips every mount, re-attaches base trees and replays the live
    /// mount records in their original order. The one recovery mechanism
    /// for any structural inconsistency.
    pub fn reload(&mut self, from_disk: bool) {
        debug!(from_disk, records = self.records.len(), "reloading merged tree");
        if from_disk {
            for bt in &self.base_trees {
                bt.root.load(true);
            }
        }
        self.merged.clear_mounts(MountStrength::Fixed);
        for bt in &self.base_trees {
            if bt.at_root {
                self.merged.mount(&bt.root, MountStrength::Fixed);
            }
        }
        let records = self.records.clone();
        for r in &records {
            if let Some(at) = self.merged.descend(&r.dest, true) {
                at.mount(&r.source, MountStrength::Mounted);
            }
        }
    }

    /// Resets the registry to its initial state, releasing every reference
    /// it holds: records, base trees, loaders, archive loaders, then the
    /// merged tree. Nodes held by callers stay alive and usable.
    pub fn clear(&mut self) {
        self.records.clear();
        self.base_trees.clear();
        self.loaders.clear();
        self.archive_loaders.clear();
        self.merged = OverlayDir::root(self.case);
    }

    /// Writes a recursive dump of the merged tree, with backend labels and
    /// strong counts. Diagnostics only.
    pub fn dump_tree(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        dump_dir(out, &self.root_dir(), "", 0)
    }

    fn attach(&mut self, dir: DirHandle, dest: &str, overwrite: bool) {
        debug!(source = dir.full_path(), dest = %dest, overwrite, "mount");
        self.store_record(MountRecord { source: dir.clone(), dest: dest.to_string(), overwrite });
        if let Some(at) = self.merged.descend(dest, true) {
            at.mount(&dir, MountStrength::Mounted);
        }
    }

    fn store_base_tree(&mut self, tree: BaseTree) {
        let key = self.case.fold(&tree.label);
        self.base_trees.retain(|bt| self.case.fold(&bt.label) != key);
        self.base_trees.push(tree);
    }

    fn store_record(&mut self, record: MountRecord) {
        self.records.retain(|r| {
            !(r.dest == record.dest
                && (same_dir(&r.source, &record.source)
                    || r.source
                        .full_path()
                        .eq_ignore_ascii_case(record.source.full_path())))
        });
        self.records.push(record);
    }

    /// Number of live mount records (diagnostics and tests).
    pub fn mount_records(&self) -> usize {
        self.records.len()
    }
}

impl Default for VfsRoot {
    fn default() -> Self {
        Self::new(CaseMode::Sensitive)
    }
}

fn dump_dir(out: &mut dyn fmt::Write, dir: &DirHandle, shown_name: &str, depth: usize) -> fmt::Result {
    let pad = "  ".repeat(depth);
    write!(
        out,
        "{pad}d|{shown_name} [{}, {} refs]",
        dir.backend(),
        Arc::strong_count(dir)
    )?;
    if dir.name() != shown_name && !dir.full_path().is_empty() {
        write!(out, " <- {{{}}}", dir.full_path())?;
    }
    writeln!(out)?;
    for (name, sub) in dir.dirs(IterMode::Snapshot) {
        dump_dir(out, &sub, &name, depth + 1)?;
    }
    let pad = "  ".repeat(depth + 1);
    for (name, file) in dir.files(IterMode::Snapshot) {
        write!(out, "{pad}f|{name} [{}, {} refs]", file.backend(), Arc::strong_count(&file))?;
        if file.name() != name {
            write!(out, " <- {{{}}}", file.full_path())?;
        }
        writeln!(out)?;
    }
    Ok(())
}
