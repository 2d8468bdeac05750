use serde::{Deserialize, Serialize};

use crate::diff::Side;
use crate::github::GitHubApiError;

/// A line-anchored finding produced by an automated analysis pass.
/// `line` may refer to either side of the diff; resolution decides which.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSuggestion {
    pub file: String,
    pub line: usize,
    #[serde(default, alias = "sideHint", skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    pub comment: String,
}

/// How a posted suggestion reached the pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostMode {
    Inline,
    Aggregate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    Api {
        status: Option<u16>,
        retryable: bool,
        message: String,
    },
    Internal {
        message: String,
    },
    Timeout,
}

impl From<GitHubApiError> for FailureReason {
    fn from(err: GitHubApiError) -> Self {
        FailureReason::Api {
            status: err.status,
            retryable: err.retryable,
            message: err.message,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::Api {
                status: Some(status),
                retryable,
                ..
            } => write!(f, "GitHub API returned {status} (retryable: {retryable})"),
            FailureReason::Api { message, .. } => write!(f, "GitHub API unreachable: {message}"),
            FailureReason::Internal { message } => write!(f, "internal error: {message}"),
            FailureReason::Timeout => write!(f, "timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlacementOutcome {
    Posted { url: String, mode: PostMode },
    Skipped { reason: String },
    Failed { error: FailureReason },
}

/// What happened to one input suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementResult {
    pub suggestion: LineSuggestion,
    pub outcome: PlacementOutcome,
}
