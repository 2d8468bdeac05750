/// Pull request metadata needed to place review comments.
/// Not Deserialize; built from the GitHub API JSON response.
#[derive(Debug, Clone)]
pub struct PullRequest {
    /// PR number (e.g., 42)
    pub number: u64,
    /// PR title
    pub title: String,
    /// Author's GitHub login
    pub author: String,
    /// Current head commit; inline comments are anchored to it
    pub head_sha: String,
}

/// Represents the parsed components of a GitHub PR URL.
#[derive(Debug, Clone)]
pub struct PrUrl {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
}

/// The pull request and commit that comments are posted against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTarget {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub commit_sha: String,
}

impl ReviewTarget {
    pub fn new(pr_url: &PrUrl, commit_sha: impl Into<String>) -> Self {
        Self {
            owner: pr_url.owner.clone(),
            repo: pr_url.repo.clone(),
            pr_number: pr_url.pr_number,
            commit_sha: commit_sha.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_target_from_url() {
        let url = PrUrl {
            owner: "org".to_string(),
            repo: "repo".to_string(),
            pr_number: 42,
        };
        let target = ReviewTarget::new(&url, "deadbeef");
        assert_eq!(target.owner, "org");
        assert_eq!(target.repo, "repo");
        assert_eq!(target.pr_number, 42);
        assert_eq!(target.commit_sha, "deadbeef");
    }
}
