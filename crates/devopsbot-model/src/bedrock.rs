use async_trait::async_trait;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, InferenceConfiguration, Message,
};
use devopsbot_core::BotError;

use crate::client::{ChatMessage, InferenceParams, ModelClient, Role};

/// Bedrock Converse API client.
///
/// Works with foundation model ids and cross-region inference-profile ARNs
/// alike; the identifier is passed through unchanged.
pub struct BedrockModel {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
}

impl BedrockModel {
    /// Create a client from a loaded AWS configuration.
    pub fn new(sdk: &aws_config::SdkConfig, model_id: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_bedrockruntime::Client::new(sdk),
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl ModelClient for BedrockModel {
    async fn converse(
        &self,
        messages: Vec<ChatMessage>,
        params: InferenceParams,
    ) -> Result<String, BotError> {
        let inference = InferenceConfiguration::builder()
            .max_tokens(i32::try_from(params.max_tokens).unwrap_or(i32::MAX))
            .temperature(params.temperature)
            .top_p(params.top_p)
            .build();

        let mut request = self
            .client
            .converse()
            .model_id(&self.model_id)
            .inference_config(inference);

        for msg in messages {
            let role = match msg.role {
                Role::User => ConversationRole::User,
                Role::Assistant => ConversationRole::Assistant,
            };
            let message = Message::builder()
                .role(role)
                .content(ContentBlock::Text(msg.content))
                .build()
                .map_err(|e| BotError::Model(format!("invalid message: {e}")))?;
            request = request.messages(message);
        }

        tracing::debug!(model = %self.model_id, max_tokens = params.max_tokens, "invoking model");

        let response = request
            .send()
            .await
            .map_err(|e| BotError::Model(format!("converse failed: {}", DisplayErrorContext(&e))))?;

        let text = response
            .output()
            .and_then(|output| output.as_message().ok())
            .and_then(|message| message.content().first())
            .and_then(|block| block.as_text().ok())
            .ok_or_else(|| BotError::Model("response contained no text block".into()))?;

        Ok(text.clone())
    }
}
