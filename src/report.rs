use chrono::{DateTime, SecondsFormat, Utc};
use colored::Color;

use crate::diff::{DiffRecord, Status, TreeDiff};
use crate::snapshot::Snapshot;

const STATUS_WIDTH: usize = 7;
const SUMMARY_WIDTH: usize = 9;
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub color: bool,
    pub show_identical: bool,
}

impl ReportOptions {
    /// Width status labels are padded to. `IDENTICAL` only widens the
    /// column when identical files are listed.
    fn label_width(self) -> usize {
        if self.show_identical {
            Status::Identical.as_str().len()
        } else {
            STATUS_WIDTH
        }
    }
}

fn status_color(status: Status) -> Option<Color> {
    match status {
        Status::Identical => None,
        Status::Changed => Some(Color::Yellow),
        Status::Moved => Some(Color::Blue),
        Status::Added => Some(Color::Green),
        Status::Deleted => Some(Color::Red),
    }
}

// Escape codes are written directly so output never depends on colored's
// process-wide override or terminal detection.
fn paint(text: &str, color: Option<Color>, enabled: bool) -> String {
    match color {
        Some(color) if enabled => format!("\x1b[{}m{text}{RESET}", color.to_fg_str()),
        _ => text.to_string(),
    }
}

/// Status name right-aligned to `width`.
pub fn status_label(status: Status, width: usize, color: bool) -> String {
    let padded = format!("{:>width$}", status.as_str());
    paint(&padded, status_color(status), color)
}

/// One report line, without the trailing newline.
pub fn render_record(record: &DiffRecord, opts: ReportOptions) -> String {
    let label = status_label(record.status(), opts.label_width(), opts.color);
    match record {
        DiffRecord::Moved { left, right } => format!(
            "{label}: {}{}{}",
            left.path.display(),
            paint(" -> ", Some(Color::Blue), opts.color),
            right.path.display()
        ),
        _ => format!("{label}: {}", record.path().display()),
    }
}

/// Full report: one line per non-identical file (or every file when
/// `show_identical` is set), then per-status counts and the total.
pub fn render_report(diff: &TreeDiff, opts: ReportOptions) -> String {
    let mut out = String::new();
    for record in diff.records() {
        if record.status() == Status::Identical && !opts.show_identical {
            continue;
        }
        out.push_str(&render_record(record, opts));
        out.push('\n');
    }

    let total = format!("Total{} : {}", " ".repeat(SUMMARY_WIDTH - 5), diff.len());
    out.push('\n');
    if opts.color {
        out.push_str(&format!("{BOLD}{total}{RESET}\n"));
    } else {
        out.push_str(&total);
        out.push('\n');
    }

    let counters = diff.counters();
    for status in Status::ALL {
        let name = status.as_str();
        out.push_str(&format!(
            "{}{} : {}\n",
            paint(name, status_color(status), opts.color),
            " ".repeat(SUMMARY_WIDTH.saturating_sub(name.len())),
            counters.get(status)
        ));
    }
    out
}

fn timestamp(time: std::time::SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Indented listing of a snapshot: `+ name mtime` for directories and
/// `└ name size mtime fingerprint` for everything else.
pub fn render_tree(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    for entry in snapshot.entries() {
        let indent = "  ".repeat(entry.depth.saturating_sub(1));
        if entry.is_dir {
            out.push_str(&format!(
                "{indent}+ {} {}\n",
                entry.name,
                timestamp(entry.modified)
            ));
        } else {
            let fingerprint = entry
                .fingerprint
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| "-".to_string());
            out.push_str(&format!(
                "{indent}└ {} {} {} {}\n",
                entry.name,
                entry.size,
                timestamp(entry.modified),
                fingerprint
            ));
        }
    }
    out
}
