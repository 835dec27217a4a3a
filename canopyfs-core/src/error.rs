//! Error types for CanopyFS operations.

use thiserror::Error;

/// Error type for registry and backend operations.
///
/// Plain lookup misses are *not* errors: `get_file`/`get_dir` return `None`
/// and a miss satisfied by no loader is indistinguishable from a miss. This
/// type covers the operations that can genuinely fail — mounting a source
/// that does not resolve, opening an archive nothing recognizes, scanning a
/// real directory that the OS refuses to enumerate.
#[derive(Debug, Error)]
pub enum VfsError {
    /// Path did not resolve to a file or directory.
    #[error("Path not found: {path}")]
    NotFound {
        path: String,
    },

    /// Expected a directory but the path resolved to something else.
    #[error("Not a directory: {path}")]
    NotADirectory {
        path: String,
    },

    /// Mount source could not be resolved to an existing directory.
    #[error("Mount source not found: {path}")]
    MountSourceMissing {
        path: String,
    },

    /// No live mount record matched the given source/destination pair.
    #[error("No mount record for '{mount_source}' at '{dest}'")]
    MountNotFound {
        mount_source: String,
        dest: String,
    },

    /// No registered archive loader recognized the container format.
    #[error("No archive loader recognized: {path}")]
    ArchiveUnrecognized {
        path: String,
    },

    /// I/O error from the underlying system.
    #[error("I/O error")]
    Io {
        #[from]
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for CanopyFS operations.
pub type VfsResult<T> = std::result::Result<T, VfsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VfsError::NotFound { path: "data/file.txt".to_string() };
        assert_eq!(err.to_string(), "Path not found: data/file.txt");

        let err = VfsError::MountSourceMissing { path: "a/data".to_string() };
        assert_eq!(err.to_string(), "Mount source not found: a/data");

        let err = VfsError::MountNotFound {
            mount_source: "a/data".to_string(),
            dest: "data".to_string(),
        };
        assert_eq!(err.to_string(), "No mount record for 'a/data' at 'data'");

        let err = VfsError::ArchiveUnrecognized { path: "pack.zip".to_string() };
        assert_eq!(err.to_string(), "No archive loader recognized: pack.zip");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: VfsError = io_err.into();
        assert!(matches!(err, VfsError::Io { .. }));
    }
}
