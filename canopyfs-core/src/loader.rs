//! Plugin protocols for materializing tree content on demand.

use std::any::Any;
use std::sync::Arc;

use crate::dir::DirHandle;
use crate::file::FileHandle;

/// A plugin consulted when a lookup misses the merged tree.
///
/// Loaders run in registration order and the first non-`None` result wins;
/// there is no priority negotiation. A result is adopted into the tree, so
/// a loader is asked about any given path at most once while the splice
/// survives.
///
/// Both the normalized path and the caller's original spelling are passed —
/// a backend indexing by raw paths may only recognize the latter.
pub trait Loader: Send + Sync {
    /// Materializes a file, or `None` if this loader has nothing for the
    /// path.
    fn load(&self, path: &str, original: &str) -> Option<FileHandle>;

    /// Materializes a directory. Most loaders only deal in files.
    fn load_dir(&self, path: &str, original: &str) -> Option<DirHandle> {
        let _ = (path, original);
        None
    }
}

/// A directory tree produced by an archive loader.
pub struct ArchiveTree {
    /// The archive's root; member full paths are prefixed with the archive
    /// path, enabling `pack.zip/inner/file.txt`-style addressing.
    pub root: DirHandle,
    /// Optional loader for member files, registered alongside the tree.
    pub loader: Option<Arc<dyn Loader>>,
}

/// A plugin that opens a container file and exposes its contents as a
/// mountable directory.
///
/// Registered loaders are offered the file in order; the first one to
/// recognize the format wins. `opaque` carries format-specific parameters
/// (a password, say) straight through the registry.
pub trait ArchiveLoader: Send + Sync {
    fn load(&self, archive: &FileHandle, opaque: Option<&dyn Any>) -> Option<ArchiveTree>;
}
