use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// Top-level configuration loaded from `.devopsbot.toml`.
///
/// Supports layered resolution: environment variables > local config > defaults.
/// The environment variable names are the ones the deployed functions have
/// always read (`JIRA_URL`, `MODEL_ID`, `SLACK_CHANNEL`, ...).
///
/// # Examples
///
/// ```
/// use devopsbot_core::BotConfig;
///
/// let config = BotConfig::default();
/// assert_eq!(config.github.timeout_secs, 30);
/// assert!(config.jira.url.is_none());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BotConfig {
    /// Model inference settings.
    #[serde(default)]
    pub model: ModelConfig,
    /// Issue tracker settings.
    #[serde(default)]
    pub jira: JiraConfig,
    /// Source control settings.
    #[serde(default)]
    pub github: GitHubConfig,
    /// Chat platform settings.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Incident pipeline storage and knowledge base settings.
    #[serde(default)]
    pub incident: IncidentConfig,
    /// Workflow engine selection.
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl BotConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Io`] if the file cannot be read, or
    /// [`BotError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, BotError> {
        if !path.exists() {
            return Err(BotError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Examples
    ///
    /// ```
    /// use devopsbot_core::BotConfig;
    ///
    /// let toml = r#"
    /// [slack]
    /// channel = "C0123"
    /// "#;
    /// let config = BotConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.slack.channel.as_deref(), Some("C0123"));
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, BotError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|name| std::env::var(name).ok());
    }

    /// Overlay values from `lookup`, which maps a variable name to its value.
    ///
    /// Empty values are ignored so that an exported-but-blank variable does not
    /// mask a value from the config file.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        overlay(&mut self.model.model_id, get("MODEL_ID"));
        overlay(&mut self.jira.url, get("JIRA_URL"));
        overlay(&mut self.jira.username, get("JIRA_USERNAME"));
        overlay(&mut self.jira.api_token, get("JIRA_API_TOKEN"));
        overlay(&mut self.github.token, get("GITHUB_TOKEN"));
        overlay(&mut self.github.webhook_secret, get("GITHUB_SECRET"));
        overlay(&mut self.slack.token, get("SLACK_TOKEN"));
        overlay(&mut self.slack.channel, get("SLACK_CHANNEL"));
        overlay(&mut self.incident.bucket, get("S3_BUCKET_NAME"));
        overlay(&mut self.incident.knowledge_base_id, get("KNOWLEDGE_BASE_ID"));
        overlay(&mut self.incident.data_source_id, get("DATA_SOURCE_ID"));
        overlay(&mut self.incident.state_machine_arn, get("STATE_MACHINE_ARN"));
        overlay(&mut self.workflow.kanban_state_machine_arn, get("STEP_FUNCTIONS_ARN"));
        if let Some(engine) = get("WORKFLOW_ENGINE") {
            match engine.as_str() {
                "local" => self.workflow.engine = WorkflowEngine::Local,
                "step-functions" | "stepfunctions" => {
                    self.workflow.engine = WorkflowEngine::StepFunctions
                }
                other => tracing::warn!(engine = other, "ignoring unknown WORKFLOW_ENGINE"),
            }
        }
    }
}

fn overlay(slot: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Return the configured value or a [`BotError::MissingSetting`] naming the
/// environment variable that supplies it.
///
/// # Examples
///
/// ```
/// use devopsbot_core::require;
///
/// let value = Some("C0123".to_string());
/// assert_eq!(require(&value, "SLACK_CHANNEL").unwrap(), "C0123");
/// assert!(require(&None, "SLACK_CHANNEL").is_err());
/// ```
pub fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, BotError> {
    value.as_deref().ok_or(BotError::MissingSetting(name))
}

/// Model inference configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier or inference-profile ARN (`MODEL_ID`).
    pub model_id: Option<String>,
}

/// Jira connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Base URL of the Jira site (`JIRA_URL`).
    pub url: Option<String>,
    /// Automation account login; also used to detect self-reported issues.
    pub username: Option<String>,
    /// API token for basic auth.
    pub api_token: Option<String>,
}

/// GitHub connection settings.
///
/// # Examples
///
/// ```
/// use devopsbot_core::GitHubConfig;
///
/// let config = GitHubConfig::default();
/// assert_eq!(config.api_base, "https://api.github.com");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Personal access or app token (`GITHUB_TOKEN`).
    pub token: Option<String>,
    /// Shared webhook secret (`GITHUB_SECRET`).
    pub webhook_secret: Option<String>,
    /// REST API base URL.
    #[serde(default = "default_github_api")]
    pub api_base: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_github_timeout")]
    pub timeout_secs: u64,
}

fn default_github_api() -> String {
    "https://api.github.com".into()
}

fn default_github_timeout() -> u64 {
    30
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            webhook_secret: None,
            api_base: default_github_api(),
            timeout_secs: default_github_timeout(),
        }
    }
}

/// Slack connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token (`SLACK_TOKEN`).
    pub token: Option<String>,
    /// Channel whose history is gathered as incident evidence.
    pub channel: Option<String>,
    /// Web API base URL.
    #[serde(default = "default_slack_api")]
    pub api_base: String,
}

fn default_slack_api() -> String {
    "https://slack.com/api".into()
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel: None,
            api_base: default_slack_api(),
        }
    }
}

/// Incident pipeline settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentConfig {
    /// Bucket receiving markdown reports (`S3_BUCKET_NAME`).
    pub bucket: Option<String>,
    /// Knowledge base indexing the report bucket.
    pub knowledge_base_id: Option<String>,
    /// Data source of that knowledge base.
    pub data_source_id: Option<String>,
    /// State machine running the report workflow (`STATE_MACHINE_ARN`).
    pub state_machine_arn: Option<String>,
}

/// Which engine executes declared workflows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowEngine {
    /// Interpret the step graph inside this process.
    #[default]
    Local,
    /// Hand executions to an AWS Step Functions state machine.
    StepFunctions,
}

/// Workflow engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Engine used by trigger steps.
    #[serde(default)]
    pub engine: WorkflowEngine,
    /// State machine running the kanban workflow (`STEP_FUNCTIONS_ARN`).
    pub kanban_state_machine_arn: Option<String>,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}
