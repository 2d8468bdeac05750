pub mod types;

pub use types::{Report, Summary};

use crate::placement::{PlacementOutcome, PlacementResult, PostMode};
use crate::pr::ReviewTarget;
use colored::Colorize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to write report file: {0}")]
    FileWrite(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Build a Report from placement results and the review target.
pub fn build(results: Vec<PlacementResult>, target: &ReviewTarget) -> Report {
    let mut summary = Summary::default();
    for result in &results {
        match result.outcome {
            PlacementOutcome::Posted {
                mode: PostMode::Inline,
                ..
            } => summary.inline += 1,
            PlacementOutcome::Posted {
                mode: PostMode::Aggregate,
                ..
            } => summary.aggregate += 1,
            PlacementOutcome::Skipped { .. } => summary.skipped += 1,
            PlacementOutcome::Failed { .. } => summary.failed += 1,
        }
    }

    Report {
        owner: target.owner.clone(),
        repo: target.repo.clone(),
        pr_number: target.pr_number,
        commit_sha: target.commit_sha.clone(),
        summary,
        results,
    }
}

/// Output the report to terminal (default) or to a markdown file.
#[instrument(skip(report), fields(pr = report.pr_number, summary = %report.summary))]
pub fn output(report: &Report, output_path: Option<&Path>) -> Result<(), ReportError> {
    match output_path {
        None => {
            debug!("writing report to terminal");
            print_terminal_report(report);
            Ok(())
        }
        Some(path) => {
            debug!(path = %path.display(), "writing report to file");
            write_markdown_report(report, path)
        }
    }
}

/// Print the report as pretty JSON on stdout.
pub fn output_json(report: &Report) -> Result<(), ReportError> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

/// Format and print the report to the terminal with colors.
///
/// PR org/repo#42 @ abc1234
/// ═══ 4 suggestion(s): 3 inline, 0 aggregated, 1 skipped, 0 failed ═══
/// ✔ src/a.ts:12  https://github.com/...
/// – src/b.ts:3   skipped: line not in diff
fn print_terminal_report(report: &Report) {
    println!();
    println!(
        "PR {}/{}#{} @ {}",
        report.owner,
        report.repo,
        report.pr_number,
        short_sha(&report.commit_sha)
    );
    println!(
        "═══ {} suggestion(s): {} ═══",
        report.summary.total(),
        report.summary
    );

    if report.results.is_empty() {
        println!("  No suggestions.");
    }
    for result in &report.results {
        let location = format!("{}:{}", result.suggestion.file, result.suggestion.line);
        match &result.outcome {
            PlacementOutcome::Posted { url, mode } => {
                let mark = match mode {
                    PostMode::Inline => "✔".green().bold(),
                    PostMode::Aggregate => "✔".cyan().bold(),
                };
                println!("  {} {}  {}", mark, location, url);
            }
            PlacementOutcome::Skipped { reason } => {
                println!("  {} {}  skipped: {}", "–".yellow().bold(), location, reason);
            }
            PlacementOutcome::Failed { error } => {
                println!("  {} {}  failed: {}", "✘".red().bold(), location, error);
            }
        }
    }
    println!();
}

/// Write the report as a markdown file.
fn write_markdown_report(report: &Report, path: &Path) -> Result<(), ReportError> {
    let mut md = String::new();
    md.push_str(&format!(
        "# PR {}/{}#{}\n\n",
        report.owner, report.repo, report.pr_number
    ));
    md.push_str(&format!("**Commit:** `{}`\n\n", report.commit_sha));
    md.push_str(&format!("**Placement:** {}\n\n", report.summary));

    if report.results.is_empty() {
        md.push_str("No suggestions.\n");
    } else {
        md.push_str("| Location | Outcome |\n|---|---|\n");
        for result in &report.results {
            let outcome = match &result.outcome {
                PlacementOutcome::Posted {
                    url,
                    mode: PostMode::Inline,
                } => format!("posted inline: {}", url),
                PlacementOutcome::Posted {
                    url,
                    mode: PostMode::Aggregate,
                } => format!("posted in summary: {}", url),
                PlacementOutcome::Skipped { reason } => format!("skipped: {}", reason),
                PlacementOutcome::Failed { error } => format!("failed: {}", error),
            };
            md.push_str(&format!(
                "| `{}:{}` | {} |\n",
                result.suggestion.file, result.suggestion.line, outcome
            ));
        }
    }

    std::fs::write(path, md)?;
    Ok(())
}

fn short_sha(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::{FailureReason, LineSuggestion};

    fn sample_target() -> ReviewTarget {
        ReviewTarget {
            owner: "org".to_string(),
            repo: "repo".to_string(),
            pr_number: 42,
            commit_sha: "abc1234def".to_string(),
        }
    }

    fn result(file: &str, line: usize, outcome: PlacementOutcome) -> PlacementResult {
        PlacementResult {
            suggestion: LineSuggestion {
                file: file.to_string(),
                line,
                side: None,
                comment: "x".to_string(),
            },
            outcome,
        }
    }

    fn sample_results() -> Vec<PlacementResult> {
        vec![
            result(
                "src/a.ts",
                12,
                PlacementOutcome::Posted {
                    url: "https://github.com/org/repo/pull/42#discussion_r1".to_string(),
                    mode: PostMode::Inline,
                },
            ),
            result(
                "src/b.ts",
                3,
                PlacementOutcome::Skipped {
                    reason: "line not in diff".to_string(),
                },
            ),
            result(
                "src/c.ts",
                7,
                PlacementOutcome::Failed {
                    error: FailureReason::Api {
                        status: Some(422),
                        retryable: false,
                        message: "stale".to_string(),
                    },
                },
            ),
        ]
    }

    #[test]
    fn test_build_report_summary() {
        let report = build(sample_results(), &sample_target());
        assert_eq!(
            report.summary,
            Summary {
                inline: 1,
                aggregate: 0,
                skipped: 1,
                failed: 1,
            }
        );
        assert_eq!(report.summary.total(), report.results.len());
    }

    #[test]
    fn test_build_report_metadata() {
        let report = build(vec![], &sample_target());
        assert_eq!(report.pr_number, 42);
        assert_eq!(report.owner, "org");
        assert_eq!(report.summary.total(), 0);
    }

    #[test]
    fn test_write_markdown_report() {
        let report = build(sample_results(), &sample_target());

        let path = std::env::temp_dir().join("review_anchor_test_report.md");
        write_markdown_report(&report, &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("# PR org/repo#42"));
        assert!(content.contains("**Placement:** 1 inline, 0 aggregated, 1 skipped, 1 failed"));
        assert!(content.contains("| `src/b.ts:3` | skipped: line not in diff |"));
        assert!(content.contains("failed: GitHub API returned 422"));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = build(sample_results(), &sample_target());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["summary"]["inline"], 1);
        assert_eq!(value["results"][0]["outcome"]["status"], "posted");
        assert_eq!(value["results"][0]["outcome"]["mode"], "inline");
        assert_eq!(value["results"][2]["outcome"]["error"]["status"], 422);
    }

    #[test]
    fn test_short_sha() {
        assert_eq!(short_sha("abc1234def"), "abc1234");
        assert_eq!(short_sha("abc"), "abc");
    }

    #[test]
    fn test_terminal_report_does_not_panic() {
        let report = build(sample_results(), &sample_target());
        print_terminal_report(&report);
    }

    #[test]
    fn test_output_to_file() {
        let report = build(vec![], &sample_target());
        let path = std::env::temp_dir().join("review_anchor_test_output.md");
        output(&report, Some(&path)).unwrap();
        assert!(path.exists());
        std::fs::remove_file(&path).ok();
    }
}
