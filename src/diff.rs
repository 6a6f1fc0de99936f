use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use glob::Pattern;
use tracing::{debug, info, trace};

use crate::error::SnapshotError;
use crate::fingerprint::Fingerprint;
use crate::snapshot::{build_snapshot, FileDescriptor, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Status {
    Identical,
    Changed,
    Moved,
    Added,
    Deleted,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Added,
        Status::Deleted,
        Status::Moved,
        Status::Changed,
        Status::Identical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Identical => "IDENTICAL",
            Status::Changed => "CHANGED",
            Status::Moved => "MOVED",
            Status::Added => "ADDED",
            Status::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one file. Which sides are present follows from the
/// variant: matches carry both, `Added` only the right, `Deleted` only the
/// left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffRecord {
    Identical {
        left: FileDescriptor,
        right: FileDescriptor,
    },
    Changed {
        left: FileDescriptor,
        right: FileDescriptor,
    },
    Moved {
        left: FileDescriptor,
        right: FileDescriptor,
    },
    Added {
        right: FileDescriptor,
    },
    Deleted {
        left: FileDescriptor,
    },
}

impl DiffRecord {
    pub fn status(&self) -> Status {
        match self {
            DiffRecord::Identical { .. } => Status::Identical,
            DiffRecord::Changed { .. } => Status::Changed,
            DiffRecord::Moved { .. } => Status::Moved,
            DiffRecord::Added { .. } => Status::Added,
            DiffRecord::Deleted { .. } => Status::Deleted,
        }
    }

    pub fn left(&self) -> Option<&FileDescriptor> {
        match self {
            DiffRecord::Identical { left, .. }
            | DiffRecord::Changed { left, .. }
            | DiffRecord::Moved { left, .. }
            | DiffRecord::Deleted { left } => Some(left),
            DiffRecord::Added { .. } => None,
        }
    }

    pub fn right(&self) -> Option<&FileDescriptor> {
        match self {
            DiffRecord::Identical { right, .. }
            | DiffRecord::Changed { right, .. }
            | DiffRecord::Moved { right, .. }
            | DiffRecord::Added { right } => Some(right),
            DiffRecord::Deleted { .. } => None,
        }
    }

    /// The path the record sorts by: the left path when there is one.
    pub fn path(&self) -> &Path {
        match self {
            DiffRecord::Identical { left, .. }
            | DiffRecord::Changed { left, .. }
            | DiffRecord::Moved { left, .. }
            | DiffRecord::Deleted { left } => &left.path,
            DiffRecord::Added { right } => &right.path,
        }
    }

    /// `old -> new` for moves, the record path otherwise.
    pub fn display_path(&self) -> String {
        match self {
            DiffRecord::Moved { left, right } => {
                format!("{} -> {}", left.path.display(), right.path.display())
            }
            _ => self.path().display().to_string(),
        }
    }
}

impl fmt::Display for DiffRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status(), self.display_path())
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counters {
    pub identical: usize,
    pub changed: usize,
    pub moved: usize,
    pub added: usize,
    pub deleted: usize,
}

impl Counters {
    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Identical => self.identical,
            Status::Changed => self.changed,
            Status::Moved => self.moved,
            Status::Added => self.added,
            Status::Deleted => self.deleted,
        }
    }

    fn bump(&mut self, status: Status) {
        match status {
            Status::Identical => self.identical += 1,
            Status::Changed => self.changed += 1,
            Status::Moved => self.moved += 1,
            Status::Added => self.added += 1,
            Status::Deleted => self.deleted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.identical + self.changed + self.moved + self.added + self.deleted
    }
}

/// Every file of both trees, classified and sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    records: Vec<DiffRecord>,
}

impl TreeDiff {
    pub fn records(&self) -> &[DiffRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn counters(&self) -> Counters {
        let mut counters = Counters::default();
        for record in &self.records {
            counters.bump(record.status());
        }
        counters
    }

    /// True when every file is `Identical`.
    pub fn is_clean(&self) -> bool {
        self.records
            .iter()
            .all(|r| r.status() == Status::Identical)
    }
}

fn same_content(left: &FileDescriptor, right: &FileDescriptor) -> bool {
    // Fingerprints of large files are sampled; the size check catches
    // most of the collisions that sampling lets through.
    left.fingerprint == right.fingerprint && left.size == right.size
}

/// Reconcile two root-relative snapshots.
///
/// Files are matched by path first. A right file without a same-path
/// counterpart is a move when some left file with the same fingerprint and
/// size has no file at its own path on the right and has not been claimed by
/// an earlier move; the first such file in left order wins. Each left file is
/// consumed at most once, so a fingerprint shared by N left files backs at
/// most N matches and any surplus on either side is reported as added or
/// deleted. Directories are not classified.
pub fn diff_snapshots(left: &Snapshot, right: &Snapshot) -> TreeDiff {
    let left_files: Vec<&FileDescriptor> = left.files().collect();

    let mut by_path: HashMap<&Path, usize> = HashMap::with_capacity(left_files.len());
    let mut by_hash: HashMap<&Fingerprint, Vec<usize>> = HashMap::new();
    for (idx, file) in left_files.iter().enumerate() {
        by_path.insert(file.path.as_path(), idx);
        if let Some(fp) = &file.fingerprint {
            by_hash.entry(fp).or_default().push(idx);
        }
    }
    let right_paths: HashSet<&Path> = right.files().map(|f| f.path.as_path()).collect();

    let mut consumed = vec![false; left_files.len()];
    let mut records = Vec::with_capacity(left_files.len().max(right_paths.len()));

    for r in right.files() {
        if let Some(&idx) = by_path.get(r.path.as_path()) {
            consumed[idx] = true;
            let l = left_files[idx].clone();
            let record = if same_content(&l, r) {
                DiffRecord::Identical {
                    left: l,
                    right: r.clone(),
                }
            } else {
                DiffRecord::Changed {
                    left: l,
                    right: r.clone(),
                }
            };
            trace!(%record, "path match");
            records.push(record);
            continue;
        }

        let candidate = r
            .fingerprint
            .as_ref()
            .and_then(|fp| by_hash.get(fp))
            .and_then(|candidates| {
                candidates.iter().copied().find(|&idx| {
                    let l = left_files[idx];
                    !consumed[idx] && l.size == r.size && !right_paths.contains(l.path.as_path())
                })
            });

        let record = match candidate {
            Some(idx) => {
                consumed[idx] = true;
                DiffRecord::Moved {
                    left: left_files[idx].clone(),
                    right: r.clone(),
                }
            }
            None => DiffRecord::Added { right: r.clone() },
        };
        trace!(%record, "content match");
        records.push(record);
    }

    for (idx, l) in left_files.iter().enumerate() {
        if !consumed[idx] {
            records.push(DiffRecord::Deleted { left: (*l).clone() });
        }
    }

    // `sort_by` is stable: equal paths keep their emission order.
    records.sort_by(|a, b| compare_paths(a.path(), b.path()));

    let diff = TreeDiff { records };
    debug!(counters = ?diff.counters(), "classified files");
    diff
}

fn compare_paths(a: &Path, b: &Path) -> Ordering {
    a.as_os_str().cmp(b.as_os_str())
}

/// Snapshot both roots concurrently and strip their roots.
///
/// Both builds always run to completion; when both fail the left error is
/// the one returned.
pub fn build_pair(
    left_root: &Path,
    right_root: &Path,
    patterns: &[Pattern],
) -> Result<(Snapshot, Snapshot), SnapshotError> {
    let (left, right) = rayon::join(
        || build_snapshot(left_root, patterns),
        || build_snapshot(right_root, patterns),
    );
    let (mut left, mut right) = (left?, right?);
    left.strip_root();
    right.strip_root();
    info!(
        left_entries = left.len(),
        right_entries = right.len(),
        "snapshots ready"
    );
    Ok((left, right))
}

/// Compare the trees under `left_root` and `right_root`.
pub fn diff_dirs(
    left_root: &Path,
    right_root: &Path,
    patterns: &[Pattern],
) -> Result<TreeDiff, SnapshotError> {
    let (left, right) = build_pair(left_root, right_root, patterns)?;
    Ok(diff_snapshots(&left, &right))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use std::time::SystemTime;

    use rstest::rstest;
    use tempfile::TempDir;

    fn file(path: &str, size: u64, hash: &str) -> FileDescriptor {
        let path = PathBuf::from(path);
        FileDescriptor {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            depth: path.components().count(),
            path,
            is_dir: false,
            size,
            modified: SystemTime::UNIX_EPOCH,
            fingerprint: Some(Fingerprint::Content(hash.to_string())),
        }
    }

    fn dir(path: &str) -> FileDescriptor {
        FileDescriptor {
            is_dir: true,
            fingerprint: None,
            ..file(path, 4096, "")
        }
    }

    fn snapshot(entries: Vec<FileDescriptor>) -> Snapshot {
        let mut snapshot = Snapshot::new("/does/not/matter", entries);
        snapshot.strip_root();
        snapshot
    }

    fn lines(diff: &TreeDiff) -> Vec<String> {
        diff.records().iter().map(ToString::to_string).collect()
    }

    #[test]
    fn identical_file() {
        let left = snapshot(vec![file("file.txt", 32, "h1")]);
        let right = snapshot(vec![file("file.txt", 32, "h1")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["IDENTICAL: file.txt"]);
        assert!(diff.is_clean());
    }

    #[test]
    fn snapshot_against_itself_is_clean() {
        let tree = snapshot(vec![
            dir("src"),
            file("src/lib.rs", 10, "h1"),
            file("src/main.rs", 20, "h2"),
            file("copy.rs", 10, "h1"),
            file("README.md", 5, "h3"),
        ]);

        let diff = diff_snapshots(&tree, &tree);

        assert_eq!(diff.len(), 4);
        assert!(diff.is_clean());
        assert_eq!(diff.counters().identical, 4);
    }

    #[rstest]
    #[case(file("a.txt", 10, "h2"))]
    #[case(file("a.txt", 11, "h1"))]
    #[case(file("a.txt", 999_999, "h9"))]
    fn same_path_with_other_content_is_changed(#[case] edited: FileDescriptor) {
        let left = snapshot(vec![file("a.txt", 10, "h1")]);
        let right = snapshot(vec![edited]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["CHANGED: a.txt"]);
    }

    #[test]
    fn relocated_file_is_moved() {
        let left = snapshot(vec![file("a.txt", 10, "h1")]);
        let right = snapshot(vec![file("b.txt", 10, "h1")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["MOVED: a.txt -> b.txt"]);
        let record = &diff.records()[0];
        assert_eq!(record.left().unwrap().path, Path::new("a.txt"));
        assert_eq!(record.right().unwrap().path, Path::new("b.txt"));
    }

    #[test]
    fn move_into_subdirectory() {
        let left = snapshot(vec![file("notes.md", 3, "h1"), dir("archive")]);
        let right = snapshot(vec![dir("archive"), file("archive/notes.md", 3, "h1")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["MOVED: notes.md -> archive/notes.md"]);
    }

    #[test]
    fn same_fingerprint_different_size_is_not_a_move() {
        let left = snapshot(vec![file("a.bin", 100_000, "h1")]);
        let right = snapshot(vec![file("b.bin", 100_001, "h1")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["DELETED: a.bin", "ADDED: b.bin"]);
    }

    #[test]
    fn added_and_deleted() {
        let left = snapshot(vec![file("old.txt", 1, "h1")]);
        let right = snapshot(vec![file("new.txt", 2, "h2")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["ADDED: new.txt", "DELETED: old.txt"]);
        assert!(diff.records()[0].left().is_none());
        assert!(diff.records()[1].right().is_none());
    }

    #[test]
    fn empty_left_reports_additions() {
        let left = snapshot(vec![]);
        let right = snapshot(vec![file("new.txt", 3, "h1")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["ADDED: new.txt"]);
    }

    #[test]
    fn duplicate_content_pairs_the_vacated_file() {
        let left = snapshot(vec![file("a", 4, "H"), file("b", 4, "H")]);
        let right = snapshot(vec![file("a", 4, "H"), file("c", 4, "H")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["IDENTICAL: a", "MOVED: b -> c"]);
    }

    #[test]
    fn duplicate_content_independent_of_right_order() {
        let left = snapshot(vec![file("a", 4, "H"), file("b", 4, "H")]);
        let right = snapshot(vec![file("c", 4, "H"), file("a", 4, "H")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["IDENTICAL: a", "MOVED: b -> c"]);
    }

    #[test]
    fn one_left_file_backs_at_most_one_move() {
        let left = snapshot(vec![file("b", 4, "H")]);
        let right = snapshot(vec![file("c", 4, "H"), file("d", 4, "H")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["MOVED: b -> c", "ADDED: d"]);
        let counters = diff.counters();
        assert_eq!(counters.moved, 1);
        assert_eq!(counters.added, 1);
    }

    #[test]
    fn copy_next_to_original_is_added() {
        let left = snapshot(vec![file("a", 4, "H")]);
        let right = snapshot(vec![file("a", 4, "H"), file("a-copy", 4, "H")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["IDENTICAL: a", "ADDED: a-copy"]);
    }

    #[test]
    fn surplus_left_duplicates_are_deleted() {
        let left = snapshot(vec![file("x", 4, "H"), file("y", 4, "H"), file("z", 4, "H")]);
        let right = snapshot(vec![file("w", 4, "H")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["MOVED: x -> w", "DELETED: y", "DELETED: z"]);
    }

    #[test]
    fn changed_file_is_not_reported_deleted_when_duplicates_exist() {
        let left = snapshot(vec![file("b", 4, "H"), file("a", 4, "H")]);
        let right = snapshot(vec![file("a", 4, "other")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["CHANGED: a", "DELETED: b"]);
    }

    #[test]
    fn directories_are_not_classified() {
        let left = snapshot(vec![dir("gone"), dir("kept")]);
        let right = snapshot(vec![dir("kept"), dir("fresh")]);

        assert!(diff_snapshots(&left, &right).is_empty());
    }

    #[test]
    fn file_replacing_directory_is_added() {
        let left = snapshot(vec![dir("thing"), file("thing/inner", 1, "h1")]);
        let right = snapshot(vec![file("thing", 1, "h2")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(lines(&diff), vec!["ADDED: thing", "DELETED: thing/inner"]);
    }

    #[test]
    fn symlink_targets_compare_as_fingerprints() {
        let link = |path: &str, target: &str| FileDescriptor {
            fingerprint: Some(Fingerprint::Link(target.into())),
            ..file(path, target.len() as u64, "")
        };
        let left = snapshot(vec![link("current", "v1"), link("latest", "v2")]);
        let right = snapshot(vec![link("current", "v2"), link("newest", "v2")]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(
            lines(&diff),
            vec!["CHANGED: current", "MOVED: latest -> newest"]
        );
    }

    #[test]
    fn records_sorted_by_defining_path() {
        let left = snapshot(vec![
            file("m/moved.txt", 1, "h1"),
            file("z.txt", 1, "h2"),
            file("a.txt", 1, "h3"),
        ]);
        let right = snapshot(vec![
            file("z.txt", 1, "h2"),
            file("b/new.txt", 1, "h4"),
            file("0/moved.txt", 1, "h1"),
        ]);

        let diff = diff_snapshots(&left, &right);

        assert_eq!(
            lines(&diff),
            vec![
                "DELETED: a.txt",
                "ADDED: b/new.txt",
                "MOVED: m/moved.txt -> 0/moved.txt",
                "IDENTICAL: z.txt",
            ]
        );
    }

    #[test]
    fn diff_is_deterministic() {
        let left = snapshot(vec![
            file("a", 1, "H"),
            file("b", 1, "H"),
            file("c", 2, "J"),
        ]);
        let right = snapshot(vec![file("d", 1, "H"), file("e", 1, "H"), file("c", 3, "J")]);

        let first = diff_snapshots(&left, &right);
        let second = diff_snapshots(&left, &right);

        assert_eq!(first, second);
        assert_eq!(lines(&first), lines(&second));
    }

    #[test]
    fn counters_total_matches_records() {
        let left = snapshot(vec![file("a", 1, "h1"), file("b", 1, "h2")]);
        let right = snapshot(vec![file("a", 1, "h9"), file("c", 1, "h3")]);

        let diff = diff_snapshots(&left, &right);
        let counters = diff.counters();

        assert_eq!(counters.total(), diff.len());
        assert_eq!(counters.get(Status::Changed), 1);
        assert_eq!(counters.get(Status::Added), 1);
        assert_eq!(counters.get(Status::Deleted), 1);
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    #[test]
    fn diff_dirs_on_real_trees() {
        let left = TempDir::new().unwrap();
        let right = TempDir::new().unwrap();
        write(left.path(), "same.txt", "same");
        write(right.path(), "same.txt", "same");
        write(left.path(), "edit.txt", "before");
        write(right.path(), "edit.txt", "after!");
        write(left.path(), "docs/guide.md", "guide");
        write(right.path(), "manual/guide.md", "guide");
        write(left.path(), "old.txt", "old");
        write(right.path(), "new.txt", "brand new");

        let diff = diff_dirs(left.path(), right.path(), &[]).unwrap();

        assert_eq!(
            lines(&diff),
            vec![
                "MOVED: docs/guide.md -> manual/guide.md",
                "CHANGED: edit.txt",
                "ADDED: new.txt",
                "DELETED: old.txt",
                "IDENTICAL: same.txt",
            ]
        );
    }

    #[test]
    fn diff_dirs_identity_on_copy() {
        let left = TempDir::new().unwrap();
        let right = TempDir::new().unwrap();
        for root in [left.path(), right.path()] {
            write(root, "a/b/c.txt", "deep");
            write(root, "large.bin", &"x".repeat(100 * 1024));
            write(root, "top.txt", "top");
        }

        let diff = diff_dirs(left.path(), right.path(), &[]).unwrap();

        assert_eq!(diff.len(), 3);
        assert!(diff.is_clean());
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn diff_dirs_fails_when_either_root_is_missing(#[case] left_missing: bool) {
        let present = TempDir::new().unwrap();
        let missing = present.path().join("missing");
        write(present.path(), "file.txt", "x");

        let result = if left_missing {
            diff_dirs(&missing, present.path(), &[])
        } else {
            diff_dirs(present.path(), &missing, &[])
        };

        let err = result.unwrap_err();
        assert_eq!(err.path(), Some(missing.as_path()));
    }
}
