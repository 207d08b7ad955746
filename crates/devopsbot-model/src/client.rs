use async_trait::async_trait;
use devopsbot_core::BotError;
use serde::{Deserialize, Serialize};

/// A message in a single-turn conversation with the model.
///
/// # Examples
///
/// ```
/// use devopsbot_model::client::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("Review this ticket");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    /// A user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the conversation.
///
/// # Examples
///
/// ```
/// use devopsbot_model::client::Role;
///
/// assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Caller input.
    User,
    /// Model response.
    Assistant,
}

/// Sampling parameters sent with every request.
///
/// # Examples
///
/// ```
/// use devopsbot_model::client::InferenceParams;
///
/// let params = InferenceParams::with_max_tokens(512);
/// assert_eq!(params.temperature, 0.5);
/// assert_eq!(params.top_p, 0.9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceParams {
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling probability.
    pub top_p: f32,
}

impl InferenceParams {
    /// The automations' standard sampling (temperature 0.5, top-p 0.9) with
    /// the given token budget.
    pub fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            temperature: 0.5,
            top_p: 0.9,
        }
    }
}

/// A hosted chat model.
///
/// Implementations send one request per call and return the first text block
/// of the reply. No retries are attempted.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send `messages` and return the reply text.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Model`] on transport or service errors, or when
    /// the reply carries no text.
    async fn converse(
        &self,
        messages: Vec<ChatMessage>,
        params: InferenceParams,
    ) -> Result<String, BotError>;

    /// Send a single user prompt.
    async fn ask(&self, prompt: &str, params: InferenceParams) -> Result<String, BotError> {
        self.converse(vec![ChatMessage::user(prompt)], params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_message_serializes() {
        let msg = ChatMessage::user("hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hello");
    }

    #[test]
    fn params_serialize_camel_case() {
        let json = serde_json::to_value(InferenceParams::with_max_tokens(2048)).unwrap();
        assert_eq!(json["maxTokens"], 2048);
        assert!(json.get("topP").is_some());
    }
}
