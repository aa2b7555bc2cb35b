use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in the `gispack` crate.
///
/// Per-file problems inside a multi-file operation (a missing manifest
/// entry, a disallowed extension, an incomplete shapefile group) are
/// recovered locally and never surface here; these variants describe
/// whole-operation failures only.
#[derive(Error, Debug)]
pub enum PackError {
    /// The source directory or manifest contained nothing worth archiving.
    #[error("nothing to archive")]
    NothingToArchive,

    /// The requested source path does not exist.
    #[error("not found: {}", path.display())]
    ArchiveNotFound { path: PathBuf },

    /// The file exists but cannot be parsed as a zip container, or an
    /// entry inside it is corrupt.
    #[error("archive '{}' is unreadable: {reason}", path.display())]
    ArchiveUnreadable { path: PathBuf, reason: String },

    /// An I/O failure occurred while producing an archive. The partially
    /// written file is left on disk; the caller may inspect or delete it.
    #[error("archive write failed: {reason}")]
    ArchiveWriteFailed { reason: String },

    /// The destination directory could not be created or written.
    #[error("directory '{}' is not writable: {source}", path.display())]
    DirectoryUnwritable { path: PathBuf, source: io::Error },

    /// An I/O error occurred, typically while reading or writing a file.
    /// Includes the path where the error happened.
    #[error("I/O error on path '{}': {source}", path.display())]
    Io { source: io::Error, path: PathBuf },
}

impl PackError {
    /// Attaches the offending path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PackError::Io {
            source,
            path: path.into(),
        }
    }

    /// Wraps a zip-level failure during archive production.
    pub fn write_failed(err: impl std::fmt::Display) -> Self {
        PackError::ArchiveWriteFailed {
            reason: err.to_string(),
        }
    }
}

/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, PackError>;
