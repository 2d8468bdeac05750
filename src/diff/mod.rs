pub mod extract;
pub mod resolve;
pub mod types;

pub use types::{DiffLine, FileDiff, Hunk, HunkHeader, LineKind, Side, UnifiedDiff};

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("Malformed diff: no `diff --git` section found")]
    Malformed,

    #[error("Invalid hunk header: {0}")]
    InvalidHunkHeader(String),

    #[error("Hunk containing {file}:{line} has no body lines")]
    InternalConsistency { file: String, line: usize },
}

/// A hunk whose body is still being read.
struct OpenHunk<'a> {
    header: HunkHeader,
    body: Vec<(LineKind, &'a str)>,
    text: Vec<&'a str>,
    old_remaining: usize,
    new_remaining: usize,
}

impl<'a> OpenHunk<'a> {
    fn new(header: HunkHeader, header_line: &'a str) -> Self {
        Self {
            header,
            body: Vec::new(),
            text: vec![header_line],
            old_remaining: header.old_count,
            new_remaining: header.new_count,
        }
    }

    /// Classify a body line, or return None if it cannot belong to this hunk.
    /// A line is accepted only while the header's counts leave room for it.
    fn accepts(&self, line: &str) -> Option<LineKind> {
        let old = self.old_remaining > 0;
        let new = self.new_remaining > 0;
        match line.as_bytes().first() {
            Some(b' ') if old && new => Some(LineKind::Context),
            Some(b'-') if old => Some(LineKind::Removed),
            Some(b'+') if new => Some(LineKind::Added),
            // Some tools strip the single space of an empty context line.
            _ if line.trim_end_matches('\r').is_empty() && old && new => Some(LineKind::Context),
            _ => None,
        }
    }

    fn push(&mut self, kind: LineKind, line: &'a str) {
        match kind {
            LineKind::Context => {
                self.old_remaining -= 1;
                self.new_remaining -= 1;
            }
            LineKind::Removed => self.old_remaining -= 1,
            LineKind::Added => self.new_remaining -= 1,
        }
        self.body.push((kind, line));
        self.text.push(line);
    }

    fn finish(self) -> Hunk {
        if self.old_remaining > 0 || self.new_remaining > 0 {
            debug!(
                old_remaining = self.old_remaining,
                new_remaining = self.new_remaining,
                "hunk body shorter than its header declares"
            );
        }
        Hunk {
            header: self.header,
            lines: number_lines(self.header, &self.body),
            text: self.text.join("\n"),
        }
    }
}

/// Parse a unified diff (GitHub's `git diff` format) into a [`UnifiedDiff`].
///
/// Each file section starts with `diff --git a/{path} b/{path}`; new files have
/// `--- /dev/null` and deleted files `+++ /dev/null`. Hunks start with
/// `@@ -{old_start},{old_count} +{new_start},{new_count} @@` and their body
/// lines are prefixed with `+`, `-` or a space.
///
/// Fails only when the text has no `diff --git` section at all. Hunks with an
/// unreadable header are skipped with a warning. File sections without hunks
/// (binary files, pure renames, mode changes) are dropped.
pub fn parse(raw_diff: &str) -> Result<UnifiedDiff, DiffError> {
    let mut files = Vec::new();
    let mut current_file: Option<FileDiff> = None;
    let mut current_hunk: Option<OpenHunk<'_>> = None;
    let mut skipping_hunk = false;
    let mut saw_file_header = false;

    let finish_hunk = |file: &mut Option<FileDiff>, hunk: &mut Option<OpenHunk<'_>>| {
        if let (Some(file), Some(hunk)) = (file.as_mut(), hunk.take()) {
            file.hunks.push(hunk.finish());
        }
    };

    let finish_file = |files: &mut Vec<FileDiff>,
                       file: &mut Option<FileDiff>,
                       hunk: &mut Option<OpenHunk<'_>>| {
        finish_hunk(file, hunk);
        match file.take() {
            Some(file) if !file.hunks.is_empty() => {
                debug!(
                    path = %file.new_path,
                    old_path = %file.old_path,
                    is_new = file.is_new,
                    is_deleted = file.is_deleted,
                    hunks = file.hunks.len(),
                    "parsed file section"
                );
                files.push(file);
            }
            Some(file) => debug!(path = %file.new_path, "dropping file section without hunks"),
            None => {}
        }
    };

    // A trailing newline terminates the last line rather than starting an empty one.
    let body = raw_diff.strip_suffix('\n').unwrap_or(raw_diff);

    for line in body.split('\n') {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            finish_file(&mut files, &mut current_file, &mut current_hunk);
            saw_file_header = true;
            skipping_hunk = false;
            let (old_path, new_path) = paths_from_git_header(rest.trim_end_matches('\r'));
            current_file = Some(FileDiff {
                new_path,
                old_path,
                is_new: false,
                is_deleted: false,
                hunks: Vec::new(),
            });
            continue;
        }

        if line.starts_with("@@") {
            finish_hunk(&mut current_file, &mut current_hunk);
            if current_file.is_none() {
                debug!(line, "hunk header outside of a file section");
                continue;
            }
            match parse_hunk_header(line) {
                Ok(header) => {
                    skipping_hunk = false;
                    current_hunk = Some(OpenHunk::new(header, line));
                }
                Err(err) => {
                    warn!(error = %err, "skipping hunk with unusual header");
                    skipping_hunk = true;
                }
            }
            continue;
        }

        if let Some(hunk) = current_hunk.as_mut() {
            if let Some(kind) = hunk.accepts(line) {
                hunk.push(kind, line);
                continue;
            }
            if line.starts_with('\\') {
                // "\ No newline at end of file" belongs to the hunk text but is not a line.
                hunk.text.push(line);
                continue;
            }
            finish_hunk(&mut current_file, &mut current_hunk);
        }

        if skipping_hunk {
            continue;
        }

        if let Some(file) = current_file.as_mut() {
            if !file.hunks.is_empty() {
                continue;
            }
            if let Some(path) = line.strip_prefix("--- ") {
                match strip_side_prefix(path, "a/") {
                    None => file.is_new = true,
                    Some(path) => file.old_path = path,
                }
            } else if let Some(path) = line.strip_prefix("+++ ") {
                match strip_side_prefix(path, "b/") {
                    None => file.is_deleted = true,
                    Some(path) => file.new_path = path,
                }
            }
        }
    }

    finish_file(&mut files, &mut current_file, &mut current_hunk);

    if !saw_file_header {
        return Err(DiffError::Malformed);
    }
    debug!(files = files.len(), "parsed diff");
    Ok(UnifiedDiff { files })
}

/// Number each body line by folding the (old, new) counters over the hunk.
fn number_lines(header: HunkHeader, body: &[(LineKind, &str)]) -> Vec<DiffLine> {
    body.iter()
        .scan(
            (header.old_start, header.new_start),
            |(old, new), &(kind, raw_text)| {
                let (old_line_number, new_line_number) = match kind {
                    LineKind::Context => (Some(*old), Some(*new)),
                    LineKind::Removed => (Some(*old), None),
                    LineKind::Added => (None, Some(*new)),
                };
                *old += usize::from(old_line_number.is_some());
                *new += usize::from(new_line_number.is_some());
                Some(DiffLine {
                    kind,
                    raw_text: raw_text.to_string(),
                    old_line_number,
                    new_line_number,
                })
            },
        )
        .collect()
}

/// Split `a/{old} b/{new}` into its two paths.
fn paths_from_git_header(rest: &str) -> (String, String) {
    // Paths may contain spaces; the new path starts at the last " b/".
    if let Some((a_path, b_path)) = rest.rsplit_once(" b/") {
        let old = a_path.strip_prefix("a/").unwrap_or(a_path);
        return (old.to_string(), b_path.to_string());
    }
    let mut parts = rest.split_whitespace();
    let a_path = parts.next().unwrap_or_default();
    let b_path = parts.next().unwrap_or(a_path);
    (a_path.to_string(), b_path.to_string())
}

/// Path from a `---`/`+++` line, or None for `/dev/null`.
fn strip_side_prefix(path: &str, prefix: &str) -> Option<String> {
    // Drop an optional tab-separated timestamp.
    let path = path.split('\t').next().unwrap_or(path).trim_end_matches('\r');
    if path == "/dev/null" {
        return None;
    }
    Some(path.strip_prefix(prefix).unwrap_or(path).to_string())
}

fn parse_hunk_header(line: &str) -> Result<HunkHeader, DiffError> {
    let invalid = || DiffError::InvalidHunkHeader(line.to_string());
    let header = line.strip_prefix("@@").ok_or_else(invalid)?;
    // Anything after the closing "@@" is section context (e.g. a function name).
    let (ranges, _) = header.split_once("@@").ok_or_else(invalid)?;
    let mut parts = ranges.split_whitespace();
    let old_part = parts.next().ok_or_else(invalid)?;
    let new_part = parts.next().ok_or_else(invalid)?;
    if parts.next().is_some() {
        return Err(invalid());
    }

    let (old_start, old_count) = parse_range(old_part, '-').ok_or_else(invalid)?;
    let (new_start, new_count) = parse_range(new_part, '+').ok_or_else(invalid)?;

    Ok(HunkHeader {
        old_start,
        old_count,
        new_start,
        new_count,
    })
}

fn parse_range(part: &str, prefix: char) -> Option<(usize, usize)> {
    let range = part.strip_prefix(prefix)?;
    let (start, count) = match range.split_once(',') {
        Some((start, count)) => (start, count),
        None => (range, "1"),
    };
    Some((start.parse().ok()?, count.parse().ok()?))
}
