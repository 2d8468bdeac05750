pub mod types;

pub use types::{PrUrl, PullRequest, ReviewTarget};

use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Config;

#[derive(Debug, Error)]
pub enum PrError {
    #[error("GitHub API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid PR URL: {0}")]
    InvalidUrl(String),

    #[error("GitHub token not found in config or environment")]
    MissingToken,
}

/// Parse a GitHub PR URL into its component parts.
///
/// Expected format: https://github.com/{owner}/{repo}/pull/{number}
pub fn parse_pr_url(url: &str) -> Result<PrUrl, PrError> {
    let invalid = || PrError::InvalidUrl(url.to_string());
    let parsed = reqwest::Url::parse(url).map_err(|_| invalid())?;

    if parsed.host_str() != Some("github.com") {
        return Err(invalid());
    }

    let segments: Vec<_> = parsed
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|segment| !segment.is_empty())
        .collect();

    // Allow trailing views such as /files or /commits.
    if segments.len() < 4 || segments[2] != "pull" {
        return Err(invalid());
    }

    let pr_number = segments[3].parse::<u64>().map_err(|_| invalid())?;

    Ok(PrUrl {
        owner: segments[0].to_string(),
        repo: segments[1].to_string(),
        pr_number,
    })
}

fn api_client(config: &Config) -> Result<reqwest::Client, PrError> {
    Ok(reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?)
}

fn pull_url(pr_url: &PrUrl, config: &Config) -> String {
    format!(
        "{}/repos/{}/{}/pulls/{}",
        config.github.api_url.trim_end_matches('/'),
        pr_url.owner,
        pr_url.repo,
        pr_url.pr_number
    )
}

/// Fetch pull request metadata: GET /repos/{owner}/{repo}/pulls/{number}.
#[instrument(skip(config), fields(owner = %pr_url.owner, repo = %pr_url.repo, pr = pr_url.pr_number))]
pub async fn fetch_pull_request(pr_url: &PrUrl, config: &Config) -> Result<PullRequest, PrError> {
    let token = config.github_token().ok_or(PrError::MissingToken)?;
    let client = api_client(config)?;

    #[derive(serde::Deserialize)]
    struct User {
        login: String,
    }

    #[derive(serde::Deserialize)]
    struct Head {
        sha: String,
    }

    #[derive(serde::Deserialize)]
    struct PullResponse {
        number: u64,
        title: String,
        user: User,
        head: Head,
    }

    debug!("fetching PR metadata from GitHub API");
    let metadata = client
        .get(pull_url(pr_url, config))
        .header("User-Agent", "review-anchor")
        .bearer_auth(&token)
        .send()
        .await?
        .error_for_status()?
        .json::<PullResponse>()
        .await?;
    debug!(title = %metadata.title, head_sha = %metadata.head.sha, "received PR metadata");

    Ok(PullRequest {
        number: metadata.number,
        title: metadata.title,
        author: metadata.user.login,
        head_sha: metadata.head.sha,
    })
}

/// Fetch the raw unified diff of a pull request (Accept: application/vnd.github.diff).
///
/// Kept separate from the metadata fetch: GitHub refuses very large diffs
/// with 406 while the PR itself is still reachable. The diff is returned
/// unparsed so the caller decides how to treat a malformed one.
#[instrument(skip(config), fields(owner = %pr_url.owner, repo = %pr_url.repo, pr = pr_url.pr_number))]
pub async fn fetch_diff(pr_url: &PrUrl, config: &Config) -> Result<String, PrError> {
    let token = config.github_token().ok_or(PrError::MissingToken)?;
    let client = api_client(config)?;

    debug!("fetching PR diff from GitHub API");
    let diff_text = client
        .get(pull_url(pr_url, config))
        .header("User-Agent", "review-anchor")
        .bearer_auth(&token)
        .header("Accept", "application/vnd.github.diff")
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    debug!(diff_bytes = diff_text.len(), "received PR diff");
    Ok(diff_text)
}
