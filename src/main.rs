mod config;
mod diff;
mod github;
mod placement;
mod pr;
mod report;

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use diff::UnifiedDiff;
use github::{CommentPoster, DryRunPoster, GitHubClient};
use placement::{PlacementOptions, PlacementResult};
use pr::ReviewTarget;

/// Review Anchor: places automated review suggestions on a GitHub Pull
/// Request as inline review comments, falling back to one summary comment
/// when the suggestions do not match the diff.
#[derive(Parser, Debug)]
#[command(name = "review-anchor", version, about)]
struct Cli {
    /// GitHub Pull Request URL (e.g., https://github.com/org/repo/pull/42)
    ///
    /// Not required when --mock is used.
    pr_url: Option<String>,

    /// JSON file with suggestions: [{file, line, side?, comment}]
    #[arg(short, long)]
    suggestions: Option<PathBuf>,

    /// Read the unified diff from a file instead of fetching it
    #[arg(long)]
    diff: Option<PathBuf>,

    /// Commit SHA to anchor comments to (defaults to the PR head)
    #[arg(long)]
    commit: Option<String>,

    /// Log comments instead of posting them
    #[arg(long)]
    dry_run: bool,

    /// Post one summary comment instead of inline comments
    #[arg(long)]
    aggregate: bool,

    /// Print the placement ledger as JSON
    #[arg(long, conflicts_with = "output")]
    json: bool,

    /// Optional output file path for markdown report
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use a built-in mock PR and suggestions for demo purposes (no GitHub token needed)
    #[arg(long)]
    r#mock: bool,
}

/// Everything needed to run one placement batch.
struct Batch {
    target: ReviewTarget,
    /// None when the diff could not be fetched; the batch then goes out as one summary comment.
    diff_text: Option<String>,
    suggestions_json: String,
    poster: Arc<dyn CommentPoster>,
    options: PlacementOptions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut batch = if cli.r#mock {
        info!("using mock PR data for demo");
        build_mock_batch()
    } else {
        let pr_url = cli.pr_url.as_deref().ok_or(
            "PR URL is required unless --mock is used. Usage: review-anchor <URL> --suggestions <FILE> or review-anchor --mock",
        )?;
        let _main_span = info_span!("review_anchor", pr_url = %pr_url).entered();
        info!("loading configuration");
        let config = Config::load()?;
        build_batch(&cli, pr_url, &config).await?
    };
    if cli.aggregate {
        batch.options.always_aggregate = true;
    }

    let results = run_batch(&batch).await?;

    let built_report = report::build(results, &batch.target);
    if cli.json {
        report::output_json(&built_report)?;
    } else {
        report::output(&built_report, cli.output.as_deref())?;
    }
    info!(summary = %built_report.summary, "done");

    Ok(())
}

/// Parse the diff and place the suggestions.
/// Without a diff every suggestion goes into one aggregate comment.
async fn run_batch(batch: &Batch) -> Result<Vec<PlacementResult>, Box<dyn std::error::Error>> {
    let suggestions = placement::load_suggestions(&batch.suggestions_json)?;
    let mut options = batch.options.clone();
    let unified = match &batch.diff_text {
        Some(text) => {
            info!("parsing diff");
            diff::parse(text)?
        }
        None => {
            options.always_aggregate = true;
            UnifiedDiff::default()
        }
    };
    info!(files = unified.files.len(), suggestions = suggestions.len(), "placing suggestions");

    Ok(placement::place(
        &unified,
        &suggestions,
        &batch.target,
        Arc::clone(&batch.poster),
        &options,
    )
    .await)
}

async fn build_batch(cli: &Cli, pr_url: &str, config: &Config) -> Result<Batch, Box<dyn std::error::Error>> {
    info!("parsing PR URL");
    let parsed_url = pr::parse_pr_url(pr_url)?;
    debug!(owner = %parsed_url.owner, repo = %parsed_url.repo, pr = parsed_url.pr_number, "parsed PR URL");

    let suggestions_path = cli
        .suggestions
        .as_deref()
        .ok_or("--suggestions <FILE> is required unless --mock is used")?;
    let suggestions_json = std::fs::read_to_string(suggestions_path)?;

    let (diff_text, commit_sha) = match (&cli.diff, &cli.commit) {
        (Some(path), Some(sha)) => (Some(std::fs::read_to_string(path)?), sha.clone()),
        (diff_path, commit) => {
            info!("fetching pull request from GitHub");
            let fetched = pr::fetch_pull_request(&parsed_url, config).await?;
            info!(number = fetched.number, title = %fetched.title, author = %fetched.author, head_sha = %fetched.head_sha, "fetched PR");
            let diff_text = match diff_path {
                Some(path) => Some(std::fs::read_to_string(path)?),
                None => match pr::fetch_diff(&parsed_url, config).await {
                    Ok(text) => Some(text),
                    Err(err) => {
                        warn!(error = %err, "diff unavailable, posting suggestions as one summary comment");
                        None
                    }
                },
            };
            (diff_text, commit.clone().unwrap_or(fetched.head_sha))
        }
    };

    let poster: Arc<dyn CommentPoster> = if cli.dry_run {
        Arc::new(DryRunPoster::new())
    } else {
        let token = config.github_token().ok_or(pr::PrError::MissingToken)?;
        Arc::new(GitHubClient::from_config(config, token)?)
    };

    Ok(Batch {
        target: ReviewTarget::new(&parsed_url, commit_sha),
        diff_text,
        suggestions_json,
        poster,
        options: PlacementOptions::from(&config.placement),
    })
}

/// Build a batch from the embedded fixtures.
/// This runs the full placement pipeline without a GitHub token.
fn build_mock_batch() -> Batch {
    Batch {
        target: ReviewTarget {
            owner: "acme".to_string(),
            repo: "auth-service".to_string(),
            pr_number: 42,
            commit_sha: "8c9d0e1f2a3b4c5d6e7f8091a2b3c4d5e6f70812".to_string(),
        },
        diff_text: Some(include_str!("../tests/fixtures/sample_diff.patch").to_string()),
        suggestions_json: include_str!("../tests/fixtures/sample_suggestions.json").to_string(),
        poster: Arc::new(DryRunPoster::new()),
        options: PlacementOptions::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placement::{PlacementOutcome, PostMode};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE_SUGGESTIONS: &str = include_str!("../tests/fixtures/sample_suggestions.json");

    #[tokio::test]
    async fn test_mock_batch_places_inline() {
        let results = run_batch(&build_mock_batch()).await.unwrap();
        assert_eq!(results.len(), 6);
        assert!(results
            .iter()
            .any(|r| matches!(r.outcome, PlacementOutcome::Posted { mode: PostMode::Inline, .. })));
    }

    #[tokio::test]
    async fn test_unavailable_diff_falls_back_to_one_summary_comment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/org/repo/pulls/42"))
            .and(header("accept", "application/vnd.github.diff"))
            .respond_with(ResponseTemplate::new(406).set_body_string("diff too large"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/org/repo/pulls/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "number": 42,
                "title": "Huge refactor",
                "user": { "login": "alice" },
                "head": { "sha": "abc123" },
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/org/repo/issues/42/comments"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "html_url": "https://github.com/org/repo/pull/42#issuecomment-1",
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/org/repo/pulls/42/comments"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let suggestions_path = std::env::temp_dir().join("review_anchor_diff_unavailable.json");
        std::fs::write(&suggestions_path, SAMPLE_SUGGESTIONS).unwrap();
        let cli = Cli::try_parse_from([
            "review-anchor",
            "https://github.com/org/repo/pull/42",
            "--suggestions",
            suggestions_path.to_str().unwrap(),
        ])
        .unwrap();
        let mut config = Config::default();
        config.github.token = Some("t".to_string());
        config.github.api_url = server.uri();
        config.retry.backoff_ms = 1;

        let batch = build_batch(&cli, "https://github.com/org/repo/pull/42", &config)
            .await
            .unwrap();
        std::fs::remove_file(&suggestions_path).ok();
        assert!(batch.diff_text.is_none());
        assert_eq!(batch.target.commit_sha, "abc123");

        let results = run_batch(&batch).await.unwrap();
        assert_eq!(results.len(), 6);
        for result in &results {
            assert_eq!(
                result.outcome,
                PlacementOutcome::Posted {
                    url: "https://github.com/org/repo/pull/42#issuecomment-1".to_string(),
                    mode: PostMode::Aggregate,
                }
            );
        }
    }

    #[tokio::test]
    async fn test_malformed_diff_is_fatal() {
        let mut batch = build_mock_batch();
        batch.diff_text = Some("not a diff".to_string());
        assert!(run_batch(&batch).await.is_err());
    }
}
