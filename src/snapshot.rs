use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::Pattern;
use rayon::prelude::*;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::SnapshotError;
use crate::fingerprint::{content_fingerprint, link_fingerprint, Fingerprint};

/// One filesystem entry as seen during a single walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    /// Absolute while the snapshot is being built, root-relative once
    /// [`Snapshot::strip_root`] has run.
    pub path: PathBuf,
    pub is_dir: bool,
    pub size: u64,
    pub modified: SystemTime,
    /// `None` for directories and for entries that are neither regular
    /// files nor symlinks.
    pub fingerprint: Option<Fingerprint>,
    /// 1 for entries directly under the root.
    pub depth: usize,
}

/// Flat, ordered list of the descriptors found under one root.
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: PathBuf,
    entries: Vec<FileDescriptor>,
    relative: bool,
}

impl Snapshot {
    pub fn new(root: impl Into<PathBuf>, entries: Vec<FileDescriptor>) -> Self {
        Snapshot {
            root: root.into(),
            entries,
            relative: false,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[FileDescriptor] {
        &self.entries
    }

    /// Every non-directory entry, in snapshot order.
    pub fn files(&self) -> impl Iterator<Item = &FileDescriptor> {
        self.entries.iter().filter(|e| !e.is_dir)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    /// Rewrite every path relative to the snapshot root so snapshots taken
    /// under different roots line up. Paths that do not start with the root
    /// are left alone, and a second call does nothing.
    pub fn strip_root(&mut self) {
        if self.relative {
            return;
        }
        for entry in &mut self.entries {
            if let Ok(rel) = entry.path.strip_prefix(&self.root) {
                entry.path = rel.to_path_buf();
            }
        }
        self.relative = true;
    }
}

fn is_ignored(rel: &Path, patterns: &[Pattern]) -> bool {
    if patterns.is_empty() {
        return false;
    }
    let name = rel.file_name().and_then(|s| s.to_str()).unwrap_or("");
    let s_rel = rel.to_string_lossy().replace('\\', "/");
    patterns
        .iter()
        .any(|pat| pat.matches(&s_rel) || pat.matches(name))
}

struct Listed {
    path: PathBuf,
    name: String,
    depth: usize,
    metadata: Metadata,
}

fn describe(listed: Listed) -> Result<FileDescriptor, SnapshotError> {
    let Listed {
        path,
        name,
        depth,
        metadata,
    } = listed;

    let modified = metadata
        .modified()
        .map_err(|source| SnapshotError::Metadata {
            path: path.clone(),
            source,
        })?;

    let file_type = metadata.file_type();
    let fingerprint = if file_type.is_file() {
        Some(content_fingerprint(&path, metadata.len())?)
    } else if file_type.is_symlink() {
        Some(link_fingerprint(&path)?)
    } else {
        None
    };
    trace!(path = %path.display(), ?fingerprint, "described entry");

    Ok(FileDescriptor {
        name,
        path,
        is_dir: file_type.is_dir(),
        size: metadata.len(),
        modified,
        fingerprint,
        depth,
    })
}

fn list_entries(root: &Path, patterns: &[Pattern]) -> Result<Vec<Listed>, SnapshotError> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    let mut listed = Vec::new();
    for entry in walker.filter_entry(|e| match e.path().strip_prefix(root) {
        Ok(rel) if rel != Path::new("") => !is_ignored(rel, patterns),
        _ => true,
    }) {
        let entry = entry.map_err(|source| SnapshotError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.depth() == 0 {
            continue;
        }
        let metadata = entry.metadata().map_err(|source| SnapshotError::Metadata {
            path: entry.path().to_path_buf(),
            source: source.into(),
        })?;
        listed.push(Listed {
            name: entry.file_name().to_string_lossy().into_owned(),
            depth: entry.depth(),
            path: entry.into_path(),
            metadata,
        });
    }
    Ok(listed)
}

/// Fingerprint every listed entry in parallel, keeping listing order. One
/// failure discards all descriptors.
fn describe_all(listed: Vec<Listed>) -> Result<Vec<FileDescriptor>, SnapshotError> {
    listed.into_par_iter().map(describe).collect()
}

/// Walk `root` and describe every entry below it. Symlinks are recorded,
/// never followed. Entries matching one of `patterns` are skipped together
/// with everything beneath them.
///
/// The listing is sorted by file name so two runs over the same tree yield
/// the same order. Fingerprints are computed on the rayon pool and collected
/// back in listing order. The first I/O error aborts the whole build.
///
/// Paths in the returned snapshot are still absolute; call
/// [`Snapshot::strip_root`] before diffing.
pub fn build_snapshot(root: &Path, patterns: &[Pattern]) -> Result<Snapshot, SnapshotError> {
    let root_meta = fs::metadata(root).map_err(|source| SnapshotError::Metadata {
        path: root.to_path_buf(),
        source,
    })?;
    if !root_meta.is_dir() {
        return Err(SnapshotError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    debug!(root = %root.display(), "listing directory tree");
    let listed = list_entries(root, patterns)?;
    debug!(root = %root.display(), entries = listed.len(), "fingerprinting entries");

    let entries = describe_all(listed)?;
    Ok(Snapshot::new(root, entries))
}
