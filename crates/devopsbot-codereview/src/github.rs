use std::time::Duration;

use async_trait::async_trait;
use devopsbot_core::{BotError, GitHubConfig, PullRequestRef};

/// Banner prepended to every posted review.
pub const COMMENT_BANNER: &str = "<b>Feedback generated by DevOpsBot</b>";

/// The source control operations the review step needs.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Fetch the unified diff of a pull request.
    async fn fetch_diff(&self, pr: &PullRequestRef) -> Result<String, BotError>;

    /// Post a conversation comment on a pull request.
    async fn post_comment(&self, pr: &PullRequestRef, body: &str) -> Result<(), BotError>;
}

/// GitHub REST client for fetching diffs and posting comments.
///
/// Diffs are fetched with a plain HTTP client because they are served as
/// `text/plain` rather than JSON; comments go through octocrab.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl GitHubClient {
    /// Create a client from the `[github]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::MissingSetting`] if `GITHUB_TOKEN` is not set, or
    /// [`BotError::SourceControl`] if the clients cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use devopsbot_codereview::github::GitHubClient;
    /// use devopsbot_core::GitHubConfig;
    ///
    /// let config = GitHubConfig { token: Some("ghp_xxxx".into()), ..GitHubConfig::default() };
    /// let client = GitHubClient::new(&config).unwrap();
    /// ```
    pub fn new(config: &GitHubConfig) -> Result<Self, BotError> {
        let token = devopsbot_core::require(&config.token, "GITHUB_TOKEN")?.to_string();
        let api_base = config.api_base.trim_end_matches('/').to_string();
        let timeout = Duration::from_secs(config.timeout_secs);

        let octocrab = octocrab::Octocrab::builder()
            .set_connect_timeout(Some(timeout))
            .set_read_timeout(Some(timeout))
            .set_write_timeout(Some(timeout))
            .personal_token(token.clone())
            .base_uri(api_base.as_str())
            .map_err(|e| BotError::SourceControl(format!("invalid GitHub API base: {e}")))?
            .build()
            .map_err(|e| BotError::SourceControl(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("devopsbot")
            .build()
            .map_err(|e| BotError::SourceControl(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            octocrab,
            http,
            token,
            api_base,
        })
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn fetch_diff(&self, pr: &PullRequestRef) -> Result<String, BotError> {
        let url = format!("{}/repos/{}/pulls/{}", self.api_base, pr.repository, pr.number);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github.v3.diff")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| BotError::SourceControl(format!("failed to fetch diff for {pr}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::SourceControl(format!(
                "GitHub API error {status} fetching {pr}: {body}"
            )));
        }

        response
            .text()
            .await
            .map_err(|e| BotError::SourceControl(format!("failed to read diff for {pr}: {e}")))
    }

    async fn post_comment(&self, pr: &PullRequestRef, body: &str) -> Result<(), BotError> {
        let route = format!("/repos/{}/issues/{}/comments", pr.repository, pr.number);
        let payload = serde_json::json!({ "body": format!("{COMMENT_BANNER}\n\n{body}") });

        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| BotError::SourceControl(format!("failed to comment on {pr}: {e}")))?;

        tracing::info!(pr = %pr, "review comment posted");
        Ok(())
    }
}

/// Parse a pull request reference string (`owner/repo#number`).
///
/// # Errors
///
/// Returns [`BotError::InvalidPayload`] if the format is invalid.
///
/// # Examples
///
/// ```
/// use devopsbot_codereview::github::parse_pr_reference;
///
/// let pr = parse_pr_reference("octocat/hello-world#42").unwrap();
/// assert_eq!(pr.repository, "octocat/hello-world");
/// assert_eq!(pr.number, 42);
/// ```
pub fn parse_pr_reference(pr_ref: &str) -> Result<PullRequestRef, BotError> {
    let invalid =
        || BotError::InvalidPayload(format!("invalid PR reference '{pr_ref}', expected owner/repo#number"));
    let (repository, number_str) = pr_ref.split_once('#').ok_or_else(invalid)?;
    let (owner, name) = repository.split_once('/').ok_or_else(invalid)?;
    if owner.is_empty() || name.is_empty() {
        return Err(invalid());
    }
    let number: u64 = number_str
        .parse()
        .map_err(|_| BotError::InvalidPayload(format!("invalid PR number: {number_str}")))?;
    Ok(PullRequestRef {
        repository: repository.to_string(),
        number,
    })
}
