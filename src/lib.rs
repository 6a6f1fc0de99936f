//
// lib.rs
// treediff
//
// Library entry that re-exports the snapshot, fingerprint and diff modules so the binary and external users can compare directory trees.
//
// Public crate interface: re-export modules used by the binary and tests.
pub mod cli;
pub mod diff;
pub mod error;
pub mod fingerprint;
pub mod report;
pub mod snapshot;

pub use cli::{build_options, Args, Options};
pub use diff::{build_pair, diff_dirs, diff_snapshots, Counters, DiffRecord, Status, TreeDiff};
pub use error::SnapshotError;
pub use fingerprint::Fingerprint;
pub use report::{render_report, render_tree, ReportOptions};
pub use snapshot::{build_snapshot, FileDescriptor, Snapshot};
