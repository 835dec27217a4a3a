//! # CanopyFS Zip
//!
//! The archive collaborator for CanopyFS: a self-contained ZIP reader that
//! exposes a container file as a mountable directory tree. Registered with
//! the registry as an [`canopyfs_core::ArchiveLoader`], it makes archive
//! members addressable like ordinary paths:
//!
//! ```text
//! assets.zip/textures/grass.png
//! outer.zip/inner.zip/readme.txt      (nested archives compose)
//! ```
//!
//! Stored and deflated members are supported; members CRC-check on first
//! open and stay cached for the node's lifetime. Zip64, encryption and
//! other compression methods are declined per member.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use canopyfs_core::{CaseMode, VfsRoot};
//! use canopyfs_zip::ZipLoader;
//!
//! let mut vfs = VfsRoot::new(CaseMode::Sensitive);
//! vfs.add_archive_loader(Arc::new(ZipLoader::new(CaseMode::Sensitive)));
//! let pack = vfs.add_archive("assets.zip", None).unwrap();
//! # let _ = pack;
//! ```

pub mod file;
pub mod index;
pub mod loader;

#[cfg(test)]
mod test_util;

pub use file::ZipMemberFile;
pub use index::{ZipEntry, ZipError, ZipIndex};
pub use loader::ZipLoader;
