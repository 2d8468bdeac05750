use serde::Serialize;

use crate::placement::PlacementResult;

/// Tally of placement outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Suggestions that went out as inline review comments
    pub inline: usize,
    /// Suggestions that went out inside the aggregate comment
    pub aggregate: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.inline + self.aggregate + self.skipped + self.failed
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} inline, {} aggregated, {} skipped, {} failed",
            self.inline, self.aggregate, self.skipped, self.failed
        )
    }
}

/// Ledger of one placement run, returned to the caller for logging.
#[derive(Debug, Serialize)]
pub struct Report {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub commit_sha: String,
    pub summary: Summary,
    pub results: Vec<PlacementResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_total_and_display() {
        let summary = Summary {
            inline: 3,
            aggregate: 0,
            skipped: 1,
            failed: 2,
        };
        assert_eq!(summary.total(), 6);
        assert_eq!(summary.to_string(), "3 inline, 0 aggregated, 1 skipped, 2 failed");
    }
}
