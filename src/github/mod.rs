pub mod types;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::diff::extract::ResolvedAnchor;
use crate::pr::ReviewTarget;
use types::{CommentResponse, InlineCommentRequest, IssueCommentRequest};

/// A failed comment post. `status` is None when no HTTP response arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("GitHub API error (status: {status:?}, retryable: {retryable}): {message}")]
pub struct GitHubApiError {
    pub status: Option<u16>,
    pub retryable: bool,
    pub message: String,
}

impl GitHubApiError {
    fn from_status(status: StatusCode, message: String) -> Self {
        Self {
            status: Some(status.as_u16()),
            // 429 (rate limited) is retried; every other 4xx is terminal.
            retryable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
            message,
        }
    }

    fn from_transport(err: reqwest::Error) -> Self {
        Self {
            status: err.status().map(|s| s.as_u16()),
            retryable: true,
            message: err.to_string(),
        }
    }
}

/// Fixed-backoff retry settings.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Posts review comments on a pull request.
/// Implementations must be Send + Sync so placement workers can share them.
///
/// `deadline` is the batch deadline. No retry attempt may start once it has passed.
#[async_trait]
pub trait CommentPoster: Send + Sync {
    /// Post a comment anchored to a diff line and return its URL.
    async fn post_inline(
        &self,
        target: &ReviewTarget,
        anchor: &ResolvedAnchor,
        body: &str,
        deadline: Instant,
    ) -> Result<String, GitHubApiError>;

    /// Post a plain conversation comment on the pull request and return its URL.
    async fn post_aggregate(
        &self,
        target: &ReviewTarget,
        body: &str,
        deadline: Instant,
    ) -> Result<String, GitHubApiError>;
}

/// reqwest-backed client for the GitHub REST API.
/// The inner `reqwest::Client` holds the connection pool and is shared by all posts.
pub struct GitHubClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    /// `request_timeout` bounds each HTTP attempt.
    pub fn new(
        api_url: &str,
        token: String,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
            retry,
        })
    }

    pub fn from_config(config: &Config, token: String) -> Result<Self, reqwest::Error> {
        Self::new(
            &config.github.api_url,
            token,
            config.retry_policy(),
            config.request_timeout(),
        )
    }

    /// POST `body` as JSON, retrying 5xx/429/transport failures with a fixed pause.
    /// Once `deadline` has passed the last error is returned instead of retrying.
    async fn post_with_retry<T: Serialize + Sync>(
        &self,
        url: &str,
        body: &T,
        deadline: Instant,
    ) -> Result<String, GitHubApiError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.post_once(url, body).await {
                Ok(html_url) => return Ok(html_url),
                Err(err) => err,
            };
            if !err.retryable || attempt >= max_attempts {
                return Err(err);
            }
            if Instant::now() + self.retry.backoff >= deadline {
                warn!(attempt, status = ?err.status, "deadline reached, not retrying");
                return Err(err);
            }
            warn!(
                attempt,
                max_attempts,
                status = ?err.status,
                error = %err.message,
                "comment post failed, retrying"
            );
            tokio::time::sleep(self.retry.backoff).await;
        }
    }

    async fn post_once<T: Serialize + Sync>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<String, GitHubApiError> {
        let response = self
            .client
            .post(url)
            .header("User-Agent", "review-anchor")
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(GitHubApiError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GitHubApiError::from_status(status, message));
        }

        let created = response
            .json::<CommentResponse>()
            .await
            .map_err(|err| GitHubApiError {
                status: Some(status.as_u16()),
                retryable: false,
                message: format!("unexpected response body: {err}"),
            })?;
        debug!(url = %created.html_url, "comment created");
        Ok(created.html_url)
    }
}

#[async_trait]
impl CommentPoster for GitHubClient {
    #[instrument(skip(self, anchor, body, deadline), fields(pr = target.pr_number, path = %anchor.file, line = anchor.line, side = %anchor.side))]
    async fn post_inline(
        &self,
        target: &ReviewTarget,
        anchor: &ResolvedAnchor,
        body: &str,
        deadline: Instant,
    ) -> Result<String, GitHubApiError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/comments",
            self.api_url, target.owner, target.repo, target.pr_number
        );
        let request = InlineCommentRequest {
            body,
            commit_id: &target.commit_sha,
            path: &anchor.file,
            diff_hunk: &anchor.hunk_text,
            line: anchor.line,
            side: anchor.side.as_github_str(),
        };
        self.post_with_retry(&url, &request, deadline).await
    }

    #[instrument(skip(self, body, deadline), fields(pr = target.pr_number))]
    async fn post_aggregate(
        &self,
        target: &ReviewTarget,
        body: &str,
        deadline: Instant,
    ) -> Result<String, GitHubApiError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, target.owner, target.repo, target.pr_number
        );
        self.post_with_retry(&url, &IssueCommentRequest { body }, deadline)
            .await
    }
}

/// Logs each comment instead of posting it. Used for `--dry-run` and `--mock`.
#[derive(Debug, Default)]
pub struct DryRunPoster {
    posted: AtomicUsize,
}

impl DryRunPoster {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_url(&self, target: &ReviewTarget) -> String {
        let id = self.posted.fetch_add(1, Ordering::SeqCst) + 1;
        format!(
            "dry-run://{}/{}/pull/{}/comments/{}",
            target.owner, target.repo, target.pr_number, id
        )
    }
}

#[async_trait]
impl CommentPoster for DryRunPoster {
    async fn post_inline(
        &self,
        target: &ReviewTarget,
        anchor: &ResolvedAnchor,
        body: &str,
        _deadline: Instant,
    ) -> Result<String, GitHubApiError> {
        info!(path = %anchor.file, line = anchor.line, side = %anchor.side, body_len = body.len(), "dry run: inline comment");
        Ok(self.next_url(target))
    }

    async fn post_aggregate(
        &self,
        target: &ReviewTarget,
        body: &str,
        _deadline: Instant,
    ) -> Result<String, GitHubApiError> {
        info!(body_len = body.len(), "dry run: aggregate comment");
        Ok(self.next_url(target))
    }
}
