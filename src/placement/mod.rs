pub mod queue;
pub mod types;

pub use types::{FailureReason, LineSuggestion, PlacementOutcome, PlacementResult, PostMode};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::PlacementConfig;
use crate::diff::extract::{self, ResolvedAnchor};
use crate::diff::resolve::resolve;
use crate::diff::{Side, UnifiedDiff};
use crate::github::CommentPoster;
use crate::pr::ReviewTarget;

pub const NOT_IN_DIFF: &str = "line not in diff";

/// Separator placed between merged comment bodies sharing one anchor.
const MERGE_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("Failed to parse suggestions JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parse the suggestion list: `[{file, line, side?, comment}]`.
pub fn load_suggestions(json: &str) -> Result<Vec<LineSuggestion>, SuggestionError> {
    Ok(serde_json::from_str(json)?)
}

#[derive(Debug, Clone)]
pub struct PlacementOptions {
    pub workers: usize,
    pub timeout: Duration,
    pub always_aggregate: bool,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self::from(&PlacementConfig::default())
    }
}

impl From<&PlacementConfig> for PlacementOptions {
    fn from(config: &PlacementConfig) -> Self {
        Self {
            workers: config.workers,
            timeout: Duration::from_secs(config.timeout_secs),
            always_aggregate: config.always_aggregate,
        }
    }
}

/// Result of resolving one suggestion against the diff.
enum Resolution {
    Anchored(ResolvedAnchor),
    NotFound,
    Internal(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AnchorKey {
    file: String,
    side: Side,
    line: usize,
}

/// One inline post: every suggestion that resolved to the same anchor.
struct InlineJob {
    indices: Vec<usize>,
    anchor: ResolvedAnchor,
    body: String,
}

/// Place a batch of suggestions on one pull request.
///
/// Every suggestion is resolved independently. Suggestions sharing a
/// `(file, side, line)` anchor are merged into one inline comment. If more
/// than half of the batch cannot be anchored (or `always_aggregate` is set),
/// the whole batch is posted as a single summary comment instead.
///
/// Always returns one result per input suggestion, in input order. After
/// `options.timeout` no new post or retry is started and the rest are marked
/// as timed out; an attempt already in flight is allowed to finish.
#[instrument(skip_all, fields(pr = target.pr_number, suggestions = suggestions.len()))]
pub async fn place(
    diff: &UnifiedDiff,
    suggestions: &[LineSuggestion],
    target: &ReviewTarget,
    poster: Arc<dyn CommentPoster>,
    options: &PlacementOptions,
) -> Vec<PlacementResult> {
    let deadline = Instant::now() + options.timeout;
    if suggestions.is_empty() {
        debug!("empty batch, nothing to place");
        return Vec::new();
    }

    let resolutions: Vec<Resolution> = suggestions.iter().map(|s| resolve_one(diff, s)).collect();
    let not_found = resolutions
        .iter()
        .filter(|r| matches!(r, Resolution::NotFound))
        .count();

    let results = if options.always_aggregate {
        info!("posting batch as a single aggregate comment");
        place_aggregate(suggestions, target, poster.as_ref(), deadline).await
    } else if not_found * 2 > suggestions.len() {
        warn!(
            not_found,
            total = suggestions.len(),
            "most suggestions do not match the diff, falling back to an aggregate comment"
        );
        place_aggregate(suggestions, target, poster.as_ref(), deadline).await
    } else {
        place_inline(suggestions, resolutions, target, poster, options.workers, deadline).await
    };

    log_summary(&results);
    results
}

fn resolve_one(diff: &UnifiedDiff, suggestion: &LineSuggestion) -> Resolution {
    let Some(resolved) = resolve(diff, &suggestion.file, suggestion.line, suggestion.side) else {
        debug!(file = %suggestion.file, line = suggestion.line, "suggestion not in diff");
        return Resolution::NotFound;
    };
    match extract::anchor(&resolved) {
        Ok(anchor) => {
            debug!(
                file = %anchor.file,
                line = anchor.line,
                side = %anchor.side,
                kind = ?resolved.diff_line.kind,
                text = %resolved.diff_line.raw_text,
                hunk_old_start = anchor.hunk.old_start,
                hunk_new_start = anchor.hunk.new_start,
                "suggestion anchored"
            );
            Resolution::Anchored(anchor)
        }
        Err(err) => {
            error!(file = %suggestion.file, line = suggestion.line, error = %err, "diff model is inconsistent");
            Resolution::Internal(err.to_string())
        }
    }
}

async fn place_inline(
    suggestions: &[LineSuggestion],
    resolutions: Vec<Resolution>,
    target: &ReviewTarget,
    poster: Arc<dyn CommentPoster>,
    workers: usize,
    deadline: Instant,
) -> Vec<PlacementResult> {
    let mut outcomes: Vec<Option<PlacementOutcome>> = vec![None; suggestions.len()];
    let mut jobs: Vec<(AnchorKey, InlineJob)> = Vec::new();
    let mut job_for_key: HashMap<AnchorKey, usize> = HashMap::new();

    for (index, resolution) in resolutions.into_iter().enumerate() {
        let comment = &suggestions[index].comment;
        match resolution {
            Resolution::NotFound => {
                outcomes[index] = Some(PlacementOutcome::Skipped {
                    reason: NOT_IN_DIFF.to_string(),
                });
            }
            Resolution::Internal(message) => {
                outcomes[index] = Some(PlacementOutcome::Failed {
                    error: FailureReason::Internal { message },
                });
            }
            Resolution::Anchored(anchor) => {
                let key = AnchorKey {
                    file: anchor.file.clone(),
                    side: anchor.side,
                    line: anchor.line,
                };
                if let Some(&existing) = job_for_key.get(&key) {
                    debug!(file = %key.file, line = key.line, "merging suggestion into existing anchor");
                    let job = &mut jobs[existing].1;
                    job.indices.push(index);
                    job.body.push_str(MERGE_SEPARATOR);
                    job.body.push_str(comment);
                } else {
                    job_for_key.insert(key.clone(), jobs.len());
                    jobs.push((
                        key,
                        InlineJob {
                            indices: vec![index],
                            anchor,
                            body: comment.clone(),
                        },
                    ));
                }
            }
        }
    }

    let target = Arc::new(target.clone());
    let posted = queue::run_keyed(jobs, workers, move |job: InlineJob| {
        let poster = Arc::clone(&poster);
        let target = Arc::clone(&target);
        async move {
            let outcome = post_inline_job(poster.as_ref(), &target, &job, deadline).await;
            (job.indices, outcome)
        }
    })
    .await;

    for (indices, outcome) in posted {
        for index in indices {
            outcomes[index] = Some(outcome.clone());
        }
    }

    suggestions
        .iter()
        .zip(outcomes)
        .map(|(suggestion, outcome)| PlacementResult {
            suggestion: suggestion.clone(),
            outcome: outcome.unwrap_or_else(|| PlacementOutcome::Failed {
                error: FailureReason::Internal {
                    message: "worker stopped before posting".to_string(),
                },
            }),
        })
        .collect()
}

async fn post_inline_job(
    poster: &dyn CommentPoster,
    target: &ReviewTarget,
    job: &InlineJob,
    deadline: Instant,
) -> PlacementOutcome {
    if Instant::now() >= deadline {
        warn!(file = %job.anchor.file, line = job.anchor.line, "deadline passed, not posting");
        return PlacementOutcome::Failed {
            error: FailureReason::Timeout,
        };
    }
    match poster.post_inline(target, &job.anchor, &job.body, deadline).await {
        Ok(url) => PlacementOutcome::Posted {
            url,
            mode: PostMode::Inline,
        },
        Err(err) => {
            warn!(file = %job.anchor.file, line = job.anchor.line, error = %err, "inline comment failed");
            PlacementOutcome::Failed { error: err.into() }
        }
    }
}

async fn place_aggregate(
    suggestions: &[LineSuggestion],
    target: &ReviewTarget,
    poster: &dyn CommentPoster,
    deadline: Instant,
) -> Vec<PlacementResult> {
    let outcome = if Instant::now() >= deadline {
        PlacementOutcome::Failed {
            error: FailureReason::Timeout,
        }
    } else {
        match poster
            .post_aggregate(target, &aggregate_body(suggestions), deadline)
            .await
        {
            Ok(url) => PlacementOutcome::Posted {
                url,
                mode: PostMode::Aggregate,
            },
            Err(err) => {
                warn!(error = %err, "aggregate comment failed");
                PlacementOutcome::Failed { error: err.into() }
            }
        }
    };

    suggestions
        .iter()
        .map(|suggestion| PlacementResult {
            suggestion: suggestion.clone(),
            outcome: outcome.clone(),
        })
        .collect()
}

/// Markdown summary listing every suggestion by `file:line`.
pub fn aggregate_body(suggestions: &[LineSuggestion]) -> String {
    let mut body = format!("### Automated review: {} finding(s)\n", suggestions.len());
    for suggestion in suggestions {
        body.push_str(&format!(
            "\n**`{}:{}`**\n\n{}\n",
            suggestion.file,
            suggestion.line,
            suggestion.comment.trim_end()
        ));
    }
    body
}

fn log_summary(results: &[PlacementResult]) {
    let (mut posted, mut skipped, mut failed) = (0, 0, 0);
    for result in results {
        match result.outcome {
            PlacementOutcome::Posted { .. } => posted += 1,
            PlacementOutcome::Skipped { .. } => skipped += 1,
            PlacementOutcome::Failed { .. } => failed += 1,
        }
    }
    info!(posted, skipped, failed, "placement finished");
}
