use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::SnapshotError;

/// Files up to this size are hashed in full.
pub const FULL_HASH_LIMIT: u64 = 32 * 1024;
/// Length of each window read from a larger file.
pub const SAMPLE_SIZE: u64 = 4 * 1024;

/// Cheap content identity of a regular file or a symlink.
///
/// Large files are only sampled, so two equal-sized files can share a
/// fingerprint while differing outside the sampled windows. Callers must
/// compare sizes as well before treating two files as equal content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Fingerprint {
    /// Hex SHA-256 of the full content or of the sampled windows.
    Content(String),
    /// Literal target of a symlink.
    Link(PathBuf),
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Content(digest) => f.write_str(digest),
            Fingerprint::Link(target) => write!(f, "-> {}", target.display()),
        }
    }
}

// Only meaningful above FULL_HASH_LIMIT; smaller sizes clamp the last window to 0.
fn sample_offsets(size: u64) -> [u64; 3] {
    [0, size / 2, size.saturating_sub(SAMPLE_SIZE)]
}

/// Fingerprint a regular file whose size is already known from its metadata.
pub fn content_fingerprint(path: &Path, size: u64) -> Result<Fingerprint, SnapshotError> {
    let read_err = |source: io::Error| SnapshotError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let mut hasher = Sha256::new();

    if size <= FULL_HASH_LIMIT {
        io::copy(&mut file, &mut hasher).map_err(read_err)?;
    } else {
        let mut window = [0u8; SAMPLE_SIZE as usize];
        for offset in sample_offsets(size) {
            file.seek(SeekFrom::Start(offset)).map_err(read_err)?;
            // A file truncated since it was stat'ed fails here with UnexpectedEof.
            file.read_exact(&mut window).map_err(read_err)?;
            hasher.update(window);
        }
    }

    Ok(Fingerprint::Content(hex::encode(hasher.finalize())))
}

/// Fingerprint a symlink by its target, without following it.
pub fn link_fingerprint(path: &Path) -> Result<Fingerprint, SnapshotError> {
    fs::read_link(path)
        .map(Fingerprint::Link)
        .map_err(|source| SnapshotError::ReadLink {
            path: path.to_path_buf(),
            source,
        })
}
