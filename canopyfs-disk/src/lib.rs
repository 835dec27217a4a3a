//! # CanopyFS Disk
//!
//! The real-filesystem collaborator for CanopyFS: directory scanning, the
//! disk file backend, and the on-demand disk loader. The engine in
//! `canopyfs-core` never touches the OS itself — everything it knows about
//! real paths arrives through this crate's [`DiskDir`], [`DiskFile`] and
//! [`DiskLoader`].
//!
//! ## Typical setup
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use canopyfs_core::{CaseMode, VfsRoot};
//! use canopyfs_disk::{mount_disk_root, DiskLoader};
//!
//! let mut vfs = VfsRoot::new(CaseMode::Sensitive);
//! vfs.add_loader(Arc::new(DiskLoader::new(CaseMode::Sensitive)));
//! mount_disk_root(&mut vfs, ".").unwrap();
//! ```

pub mod dir;
pub mod file;
pub mod loader;

pub use dir::DiskDir;
pub use file::DiskFile;
pub use loader::DiskLoader;

use canopyfs_core::{DirHandle, VfsResult, VfsRoot};

/// Scans an OS path and attaches it permanently at the namespace root, so
/// tree paths resolve relative to it. Registered as a base tree under the
/// OS path for later lookup and re-scanning.
pub fn mount_disk_root(vfs: &mut VfsRoot, os_path: &str) -> VfsResult<DirHandle> {
    let dir = DiskDir::open_at("", os_path, vfs.case_mode())?;
    let handle: DirHandle = dir;
    vfs.add_base_tree(os_path, handle.clone());
    Ok(handle)
}

/// Scans an external OS path and mounts it at `dest` in the namespace. The
/// scanned tree keeps the OS path as its recorded identity, so the mount is
/// an alias — expected and useful for diagnostics.
pub fn mount_external_path(
    vfs: &mut VfsRoot,
    os_path: &str,
    dest: &str,
    overwrite: bool,
) -> VfsResult<DirHandle> {
    let dir = DiskDir::open(os_path, vfs.case_mode())?;
    let handle: DirHandle = dir;
    vfs.add_directory(handle.clone(), Some(dest), overwrite);
    Ok(handle)
}
