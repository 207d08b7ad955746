//! A [`ModelClient`] that replays canned replies, for tests and dry runs.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use devopsbot_core::BotError;

use crate::client::{ChatMessage, InferenceParams, ModelClient};

/// Replays replies in order and records every prompt it receives.
///
/// # Examples
///
/// ```
/// use devopsbot_model::client::{InferenceParams, ModelClient};
/// use devopsbot_model::scripted::ScriptedModel;
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let model = ScriptedModel::new(["{\"pass\": true}"]);
/// let reply = rt.block_on(model.ask("review", InferenceParams::with_max_tokens(8))).unwrap();
/// assert_eq!(reply, "{\"pass\": true}");
/// assert_eq!(model.call_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
    params: Mutex<Vec<InferenceParams>>,
}

impl ScriptedModel {
    /// A model that answers with `replies`, one per call.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// Prompts received so far, one entry per call (messages joined by a blank line).
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Inference parameters received so far.
    pub fn params(&self) -> Vec<InferenceParams> {
        self.params.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|p| p.len()).unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn converse(
        &self,
        messages: Vec<ChatMessage>,
        params: InferenceParams,
    ) -> Result<String, BotError> {
        let prompt = messages
            .into_iter()
            .map(|m| m.content)
            .collect::<Vec<_>>()
            .join("\n\n");
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt);
        }
        if let Ok(mut recorded) = self.params.lock() {
            recorded.push(params);
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .ok_or_else(|| BotError::Model("no scripted reply left".into()))
    }
}
