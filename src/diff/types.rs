use serde::{Deserialize, Serialize};

/// A parsed unified diff: one entry per file section that carried hunks.
/// Built once per review request and never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct UnifiedDiff {
    pub files: Vec<FileDiff>,
}

impl UnifiedDiff {
    /// Look up a file by its new-side path (the `+++ b/<path>` header).
    pub fn file(&self, path: &str) -> Option<&FileDiff> {
        self.files.iter().find(|f| f.new_path == path)
    }
}

/// A single file within the diff.
#[derive(Debug, Clone)]
pub struct FileDiff {
    /// Path on the new side; suggestions are matched against this
    pub new_path: String,
    /// Path on the old side
    pub old_path: String,
    /// `--- /dev/null`
    pub is_new: bool,
    /// `+++ /dev/null`
    pub is_deleted: bool,
    pub hunks: Vec<Hunk>,
}

/// Numbers from a `@@ -a,b +c,d @@` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
}

/// A contiguous region of changes within a file.
#[derive(Debug, Clone)]
pub struct Hunk {
    pub header: HunkHeader,
    /// Numbered body lines in document order
    pub lines: Vec<DiffLine>,
    /// Verbatim slice of the diff for this hunk: header line through the last
    /// body line, joined by `\n`, without a trailing newline.
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Added,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: LineKind,
    /// The line as it appeared in the diff, prefix included
    pub raw_text: String,
    pub old_line_number: Option<usize>,
    pub new_line_number: Option<usize>,
}

/// Which version of a line a review comment is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[serde(alias = "LEFT", alias = "Left")]
    Left,
    #[serde(alias = "RIGHT", alias = "Right")]
    Right,
}

impl Side {
    /// Spelling expected by the pull request review comments endpoint.
    pub fn as_github_str(self) -> &'static str {
        match self {
            Side::Left => "LEFT",
            Side::Right => "RIGHT",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => write!(f, "left"),
            Side::Right => write!(f, "right"),
        }
    }
}
