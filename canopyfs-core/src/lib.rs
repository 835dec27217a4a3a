//! # CanopyFS Core
//!
//! The core library for CanopyFS - a virtual filesystem layer that presents
//! one hierarchical namespace backed transparently by heterogeneous sources:
//! real disk directories, archive containers, in-memory buffers, and
//! on-demand loader plugins.
//!
//! ## Overview
//!
//! Callers mount, overlay and unmount subtrees at arbitrary points of the
//! namespace without knowing where the data actually lives. This is useful
//! for:
//!
//! - Game and application asset stacks (base data, expansions, user mods)
//! - Addressing archive members like directories (`pack.zip/inner/file.txt`)
//! - Redirecting fixed paths at test time without touching the disk
//! - Keeping file handles valid across wholesale reconfiguration
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use canopyfs_core::{CaseMode, DirExt, MemDir, MemFile, VfsRoot};
//!
//! let mut vfs = VfsRoot::new(CaseMode::Sensitive);
//!
//! let base: canopyfs_core::DirHandle = Arc::new(MemDir::new("", CaseMode::Sensitive));
//! base.add_recursive(Arc::new(MemFile::with_content("mods/data/hello.txt", &b"hi"[..])), true);
//! vfs.add_base_tree(".", base);
//!
//! // overlay the mod directory onto the data directory
//! vfs.mount("mods/data", "data", true).unwrap();
//! assert!(vfs.get_file("data/hello.txt").is_some());
//! ```
//!
//! ## Architecture
//!
//! - [`node`]: node identity, case folding, the ordered name map
//! - [`file`]: the byte-stream contract and the whole-content convenience
//! - [`dir`]: the directory capability interface, resolution and merging
//! - [`memory`]: in-memory file and directory backends
//! - [`overlay`]: the merged-tree directory and its mount stack
//! - [`loader`]: the on-demand loader and archive loader protocols
//! - [`root`]: the mount registry tying everything together
//! - [`error`]: error types
//! - [`paths`]: path normalization applied at the registry boundary
//!
//! Concrete byte-stream backends live in sibling crates: `canopyfs-disk`
//! scans and reads real directories, `canopyfs-zip` exposes ZIP archives as
//! mountable trees.
//!
//! ## Concurrency
//!
//! The engine is a synchronous in-memory structure. `Arc` keeps reference
//! counts atomic and each node serializes mutation of its own maps; callers
//! mutating the tree from several threads wrap the registry in their own
//! lock, and enumeration under concurrent mutation should use the snapshot
//! iteration mode.

pub mod dir;
pub mod error;
pub mod file;
pub mod loader;
pub mod memory;
pub mod node;
pub mod overlay;
pub mod paths;
pub mod root;

pub use dir::{same_dir, DirChildren, DirEntries, DirExt, DirHandle, DirNode, FileEntries, IterMode};
pub use error::{VfsError, VfsResult};
pub use file::{read_all, same_file, FileHandle, OpenMode, VfsFile};
pub use loader::{ArchiveLoader, ArchiveTree, Loader};
pub use memory::{MemDir, MemFile};
pub use node::{CaseMode, NameMap, NodeMeta};
pub use overlay::{MountStrength, MountedSource, OverlayDir};
pub use root::{BaseTree, MountRecord, VfsRoot};
