use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures that abort a snapshot build. None of them are retried and no
/// partial snapshot is ever returned alongside them.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{path:?} is not a directory")]
    NotADirectory { path: PathBuf },

    #[error("failed to walk {root:?}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to stat {path:?}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read link target of {path:?}")]
    ReadLink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SnapshotError {
    /// Path of the entry that caused the failure.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            SnapshotError::NotADirectory { path }
            | SnapshotError::Metadata { path, .. }
            | SnapshotError::Read { path, .. }
            | SnapshotError::ReadLink { path, .. } => Some(path),
            SnapshotError::Walk { source, .. } => source.path(),
        }
    }
}
