use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors produced while building a snapshot.
///
/// `Io`, `Walk` and `Zip` are all file system level failures; the rest are
/// raised before anything is written.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// File system failure.
    #[error("{operation} failed for {}", path.display())]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Directory traversal failure.
    #[error("{operation} failed while walking {}", path.display())]
    Walk {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Directory being walked.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Archive write failure.
    #[error("{operation} failed for archive {}", path.display())]
    Zip {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Archive path or the entry being written.
        path: PathBuf,
        /// Underlying zip error.
        source: zip::result::ZipError,
    },
    /// Allowlist entry that cannot be resolved under the source root.
    #[error("invalid allowlist entry {entry:?}: {reason}")]
    InvalidEntry {
        /// Entry as given by the caller.
        entry: String,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// Skip pattern that failed to compile.
    #[error("invalid skip pattern {pattern:?}")]
    Pattern {
        /// Offending pattern.
        pattern: String,
        /// Underlying glob error.
        source: glob::PatternError,
    },
    /// A directory was expected but something else was found.
    #[error("{} is not a directory", path.display())]
    NotADirectory {
        /// Offending path.
        path: PathBuf,
    },
    /// The copy destination lives inside a directory being copied.
    #[error("destination {} is inside source directory {}", destination.display(), source_dir.display())]
    Overlap {
        /// Allowlisted source directory.
        source_dir: PathBuf,
        /// Requested destination root.
        destination: PathBuf,
    },
}

impl SnapshotError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walk(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walk {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn zip(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: zip::result::ZipError,
    ) -> Self {
        Self::Zip {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_entry(entry: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidEntry {
            entry: entry.into(),
            reason,
        }
    }

    /// True for failures that come from the file system or the archive
    /// writer, as opposed to invalid input.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Walk { .. } | Self::Zip { .. })
    }
}
