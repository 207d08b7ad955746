use std::path::PathBuf;

/// Errors that can occur across the devopsbot automations.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the HTTP layer and the binary convert at their boundaries.
///
/// # Examples
///
/// ```
/// use devopsbot_core::BotError;
///
/// let err = BotError::MissingSetting("JIRA_URL");
/// assert!(err.to_string().contains("JIRA_URL"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A setting required by the invoked step is not configured.
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),

    /// Issue tracker (Jira) request failure.
    #[error("issue tracker error: {0}")]
    Tracker(String),

    /// Source control (GitHub) request failure.
    #[error("source control error: {0}")]
    SourceControl(String),

    /// Chat platform (Slack) request failure.
    #[error("chat error: {0}")]
    Chat(String),

    /// Model inference request failure.
    #[error("model error: {0}")]
    Model(String),

    /// The model answered, but not with the structure the caller asked for.
    #[error("malformed model completion: {reason}")]
    MalformedCompletion {
        /// What was wrong with the completion.
        reason: String,
        /// The raw completion text.
        raw: String,
    },

    /// Knowledge base ingestion or retrieval failure.
    #[error("knowledge base error: {0}")]
    KnowledgeBase(String),

    /// Any other cloud service failure (alarms, audit trail, object store).
    #[error("cloud service error: {0}")]
    Cloud(String),

    /// Workflow definition or execution failure.
    #[error("workflow error: {0}")]
    Workflow(String),

    /// An inbound payload is missing a field or has the wrong shape.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A timestamp could not be parsed.
    #[error("invalid timestamp '{value}': {reason}")]
    Time {
        /// The offending input.
        value: String,
        /// Parser message.
        reason: String,
    },

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl BotError {
    /// Whether this error came from an external service rather than from the
    /// caller's input or local configuration.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Tracker(_)
                | Self::SourceControl(_)
                | Self::Chat(_)
                | Self::Model(_)
                | Self::MalformedCompletion { .. }
                | Self::KnowledgeBase(_)
                | Self::Cloud(_)
        )
    }
}
