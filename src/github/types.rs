use serde::{Deserialize, Serialize};

/// Body of `POST /repos/{owner}/{repo}/pulls/{number}/comments`.
#[derive(Debug, Serialize)]
pub struct InlineCommentRequest<'a> {
    pub body: &'a str,
    pub commit_id: &'a str,
    pub path: &'a str,
    pub diff_hunk: &'a str,
    pub line: usize,
    /// `LEFT` or `RIGHT`
    pub side: &'static str,
}

/// Body of `POST /repos/{owner}/{repo}/issues/{number}/comments`.
#[derive(Debug, Serialize)]
pub struct IssueCommentRequest<'a> {
    pub body: &'a str,
}

/// The part of a created comment we care about.
#[derive(Debug, Deserialize)]
pub struct CommentResponse {
    pub html_url: String,
}
