use async_trait::async_trait;
use devopsbot_core::{BotError, Issue, JiraConfig, NewSubtask, Reporter};
use serde::Deserialize;
use serde_json::json;

/// The issue tracker operations the kanban steps need.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Fetch an issue by key.
    async fn get_issue(&self, key: &str) -> Result<Issue, BotError>;

    /// Add a plain-text comment to an issue.
    async fn add_comment(&self, key: &str, body: &str) -> Result<(), BotError>;

    /// Assign an issue to the account with `account_id`.
    async fn assign(&self, key: &str, account_id: &str) -> Result<(), BotError>;

    /// Create a subtask and return its key.
    async fn create_subtask(&self, subtask: &NewSubtask) -> Result<String, BotError>;
}

/// Jira Cloud REST (v2) client using basic auth.
///
/// # Examples
///
/// ```
/// use devopsbot_kanban::jira::JiraClient;
///
/// let client = JiraClient::new("https://example.atlassian.net/", "bot@example.com", "token");
/// assert_eq!(client.base_url(), "https://example.atlassian.net");
/// ```
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
}

impl JiraClient {
    /// Create a client for the Jira site at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            api_token: api_token.into(),
        }
    }

    /// Create a client from the `[jira]` section of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::MissingSetting`] naming the first unset variable.
    pub fn from_config(config: &JiraConfig) -> Result<Self, BotError> {
        let url = devopsbot_core::require(&config.url, "JIRA_URL")?;
        let username = devopsbot_core::require(&config.username, "JIRA_USERNAME")?;
        let token = devopsbot_core::require(&config.api_token, "JIRA_API_TOKEN")?;
        Ok(Self::new(url, username, token))
    }

    /// Site URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.api_token))
            .header("Accept", "application/json")
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
        action: &str,
    ) -> Result<reqwest::Response, BotError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BotError::Tracker(format!("failed to {action}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Tracker(format!(
                "failed to {action}: Jira API error {status}: {body}"
            )));
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct IssueResponse {
    key: String,
    fields: IssueFields,
}

#[derive(Deserialize)]
struct IssueFields {
    #[serde(default)]
    description: Option<String>,
    reporter: ReporterFields,
    issuetype: IssueTypeFields,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReporterFields {
    account_id: String,
    #[serde(default)]
    email_address: Option<String>,
}

#[derive(Deserialize)]
struct IssueTypeFields {
    name: String,
}

#[derive(Deserialize)]
struct CreatedIssue {
    key: String,
}

#[async_trait]
impl IssueTracker for JiraClient {
    async fn get_issue(&self, key: &str) -> Result<Issue, BotError> {
        let response = self
            .send(
                self.request(reqwest::Method::GET, &format!("issue/{key}")),
                "fetch issue",
            )
            .await?;
        let raw: IssueResponse = response
            .json()
            .await
            .map_err(|e| BotError::Tracker(format!("unexpected issue payload for {key}: {e}")))?;

        Ok(Issue {
            key: raw.key,
            description: raw.fields.description,
            reporter: Reporter {
                account_id: raw.fields.reporter.account_id,
                email_address: raw.fields.reporter.email_address,
            },
            issue_type: raw.fields.issuetype.name,
        })
    }

    async fn add_comment(&self, key: &str, body: &str) -> Result<(), BotError> {
        self.send(
            self.request(reqwest::Method::POST, &format!("issue/{key}/comment"))
                .json(&json!({ "body": body })),
            "add comment",
        )
        .await?;
        tracing::debug!(issue = key, "comment added");
        Ok(())
    }

    async fn assign(&self, key: &str, account_id: &str) -> Result<(), BotError> {
        self.send(
            self.request(reqwest::Method::PUT, &format!("issue/{key}"))
                .json(&json!({ "fields": { "assignee": { "accountId": account_id } } })),
            "assign issue",
        )
        .await?;
        tracing::debug!(issue = key, account_id, "issue reassigned");
        Ok(())
    }

    async fn create_subtask(&self, subtask: &NewSubtask) -> Result<String, BotError> {
        let body = json!({
            "fields": {
                "project": { "key": subtask.project_key },
                "parent": { "key": subtask.parent_key },
                "summary": subtask.summary,
                "description": subtask.description,
                "issuetype": { "name": "Subtask" },
            }
        });
        let response = self
            .send(
                self.request(reqwest::Method::POST, "issue").json(&body),
                "create subtask",
            )
            .await?;
        let created: CreatedIssue = response
            .json()
            .await
            .map_err(|e| BotError::Tracker(format!("unexpected create payload: {e}")))?;
        Ok(created.key)
    }
}
