use super::types::{DiffLine, FileDiff, Hunk, Side, UnifiedDiff};

/// A suggestion's line located inside a specific hunk.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedLine<'a> {
    pub file: &'a FileDiff,
    pub hunk: &'a Hunk,
    pub diff_line: &'a DiffLine,
    pub side: Side,
    pub line: usize,
}

/// Locate `line` of `file` in the diff.
///
/// Hunks are scanned in document order and the first hunk with any matching
/// line wins, even if a later hunk could also match. Inside that hunk the line
/// number is tried against both the old (Left) and new (Right) numbering; when
/// both match, Right is chosen unless `side_hint` asks for Left.
pub fn resolve<'a>(
    diff: &'a UnifiedDiff,
    file: &str,
    line: usize,
    side_hint: Option<Side>,
) -> Option<ResolvedLine<'a>> {
    let file_diff = diff.file(file)?;

    file_diff.hunks.iter().find_map(|hunk| {
        let left = hunk
            .lines
            .iter()
            .find(|l| l.old_line_number == Some(line));
        let right = hunk
            .lines
            .iter()
            .find(|l| l.new_line_number == Some(line));

        let (side, diff_line) = match (left, right) {
            (Some(l), Some(_)) if side_hint == Some(Side::Left) => (Side::Left, l),
            (_, Some(r)) => (Side::Right, r),
            (Some(l), None) => (Side::Left, l),
            (None, None) => return None,
        };

        Some(ResolvedLine {
            file: file_diff,
            hunk,
            diff_line,
            side,
            line,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::tests::SAMPLE_DIFF;
    use crate::diff::{parse, LineKind};

    const SCENARIO_DIFF: &str = "diff --git a/a.ts b/a.ts\n--- a/a.ts\n+++ b/a.ts\n@@ -10,3 +10,4 @@\n context\n-old\n+new1\n+new2";

    #[test]
    fn test_resolves_second_added_line() {
        let diff = parse(SCENARIO_DIFF).unwrap();
        let resolved = resolve(&diff, "a.ts", 12, None).unwrap();
        assert_eq!(resolved.side, Side::Right);
        assert_eq!(resolved.line, 12);
        assert_eq!(resolved.diff_line.raw_text, "+new2");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let diff = parse(SCENARIO_DIFF).unwrap();
        assert!(resolve(&diff, "b.ts", 12, None).is_none());
    }

    #[test]
    fn test_line_outside_hunks_is_not_found() {
        let diff = parse(SCENARIO_DIFF).unwrap();
        assert!(resolve(&diff, "a.ts", 200, None).is_none());
        assert!(resolve(&diff, "a.ts", 0, None).is_none());
    }

    #[test]
    fn test_prefers_right_when_both_sides_match() {
        let diff = parse(SAMPLE_DIFF).unwrap();
        let resolved = resolve(&diff, "src/auth/session.ts", 3, None).unwrap();
        assert_eq!(resolved.side, Side::Right);
        assert_eq!(resolved.diff_line.kind, LineKind::Added);
    }

    #[test]
    fn test_left_hint_selects_old_side() {
        let diff = parse(SAMPLE_DIFF).unwrap();
        let resolved = resolve(&diff, "src/auth/session.ts", 24, Some(Side::Left)).unwrap();
        assert_eq!(resolved.side, Side::Left);
        assert_eq!(resolved.diff_line.kind, LineKind::Removed);
        assert!(resolved.diff_line.raw_text.contains("hardcoded_secret"));
    }

    #[test]
    fn test_left_hint_falls_back_to_right_only_match() {
        let diff = parse(SAMPLE_DIFF).unwrap();
        let resolved = resolve(&diff, "src/config.ts", 2, Some(Side::Left)).unwrap();
        assert_eq!(resolved.side, Side::Right);
    }

    #[test]
    fn test_first_hunk_in_document_order_wins() {
        let raw = "diff --git a/m.rs b/m.rs\n--- a/m.rs\n+++ b/m.rs\n@@ -8,2 +8,1 @@\n ctx\n-removed\n@@ -20,1 +9,2 @@\n ctx\n+added\n";
        let diff = parse(raw).unwrap();
        let resolved = resolve(&diff, "m.rs", 9, None).unwrap();
        assert_eq!(resolved.hunk.header.old_start, 8);
        assert_eq!(resolved.side, Side::Left);
        assert_eq!(resolved.diff_line.raw_text, "-removed");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let diff = parse(SAMPLE_DIFF).unwrap();
        let first = resolve(&diff, "src/auth/session.ts", 26, None).unwrap();
        for _ in 0..10 {
            let again = resolve(&diff, "src/auth/session.ts", 26, None).unwrap();
            assert!(std::ptr::eq(first.diff_line, again.diff_line));
            assert_eq!(first.side, again.side);
        }
    }
}
