use super::resolve::ResolvedLine;
use super::types::{HunkHeader, Side};
use super::DiffError;

/// Everything GitHub needs to attach an inline review comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAnchor {
    pub file: String,
    pub hunk: HunkHeader,
    pub side: Side,
    pub line: usize,
    /// Verbatim hunk text sent as `diff_hunk`
    pub hunk_text: String,
}

/// Return the resolved line's hunk exactly as it appeared in the diff, from
/// the `@@` header through the last body line.
pub fn extract(resolved: &ResolvedLine<'_>) -> Result<String, DiffError> {
    if resolved.hunk.lines.is_empty() {
        return Err(DiffError::InternalConsistency {
            file: resolved.file.new_path.clone(),
            line: resolved.line,
        });
    }
    Ok(resolved.hunk.text.clone())
}

/// Build an owned anchor for one placement attempt.
pub fn anchor(resolved: &ResolvedLine<'_>) -> Result<ResolvedAnchor, DiffError> {
    let hunk_text = extract(resolved)?;
    Ok(ResolvedAnchor {
        file: resolved.file.new_path.clone(),
        hunk: resolved.hunk.header,
        side: resolved.side,
        line: resolved.line,
        hunk_text,
    })
}
