use async_trait::async_trait;
use devopsbot_core::{epoch_seconds, BotError, SlackConfig, TimeWindow};
use serde::Deserialize;
use serde_json::Value;

/// Source of chat messages.
#[async_trait]
pub trait ChatHistory: Send + Sync {
    /// Every message posted inside `window`, across all pages.
    async fn messages(&self, window: TimeWindow) -> Result<Vec<Value>, BotError>;
}

/// Slack Web API client reading one channel's history.
///
/// # Examples
///
/// ```
/// use devopsbot_core::SlackConfig;
/// use devopsbot_incident::slack::SlackClient;
///
/// let config = SlackConfig {
///     token: Some("xoxb-1".into()),
///     channel: Some("C0123".into()),
///     ..SlackConfig::default()
/// };
/// let client = SlackClient::from_config(&config).unwrap();
/// assert_eq!(client.channel(), "C0123");
/// ```
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    channel: String,
}

impl SlackClient {
    /// Create a client for `channel` on the API at `api_base`.
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            channel: channel.into(),
        }
    }

    /// Create a client from the `[slack]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::MissingSetting`] if the token or channel is unset.
    pub fn from_config(config: &SlackConfig) -> Result<Self, BotError> {
        let token = devopsbot_core::require(&config.token, "SLACK_TOKEN")?;
        let channel = devopsbot_core::require(&config.channel, "SLACK_CHANNEL")?;
        Ok(Self::new(&config.api_base, token, channel))
    }

    /// Channel whose history is read.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    async fn page(
        &self,
        oldest: &str,
        latest: &str,
        cursor: Option<&str>,
    ) -> Result<HistoryPage, BotError> {
        let mut query = vec![
            ("channel", self.channel.as_str()),
            ("oldest", oldest),
            ("latest", latest),
        ];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor));
        }

        let response = self
            .http
            .get(format!("{}/conversations.history", self.api_base))
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .await
            .map_err(|e| BotError::Chat(format!("failed to read channel history: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Chat(format!("Slack API error {status}: {body}")));
        }

        let page: HistoryPage = response
            .json()
            .await
            .map_err(|e| BotError::Chat(format!("unexpected history payload: {e}")))?;
        if !page.ok {
            return Err(BotError::Chat(format!(
                "conversations.history failed: {}",
                page.error.as_deref().unwrap_or("unknown error")
            )));
        }
        Ok(page)
    }
}

#[derive(Deserialize)]
struct HistoryPage {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    messages: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

#[async_trait]
impl ChatHistory for SlackClient {
    async fn messages(&self, window: TimeWindow) -> Result<Vec<Value>, BotError> {
        let oldest = epoch_seconds(window.start);
        let latest = epoch_seconds(window.end);
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self.page(&oldest, &latest, cursor.as_deref()).await?;
            messages.extend(page.messages);

            let next = page
                .response_metadata
                .map(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            match next {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        tracing::debug!(channel = %self.channel, count = messages.len(), "chat messages found");
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use mockito::Matcher;
    use serde_json::json;

    use super::*;

    fn window() -> TimeWindow {
        TimeWindow {
            start: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn follows_cursor_until_exhausted() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/conversations.history")
            .match_header("authorization", "Bearer xoxb-test")
            .match_query(Matcher::Regex(
                r"^channel=C0123&oldest=1714564800\.000000&latest=1714568400\.000000$".into(),
            ))
            .with_status(200)
            .with_body(
                json!({
                    "ok": true,
                    "messages": [{"type": "message", "text": "db latency is spiking", "ts": "1714565000.000100"}],
                    "has_more": true,
                    "response_metadata": {"next_cursor": "bmV4dA=="}
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/conversations.history")
            .match_query(Matcher::UrlEncoded("cursor".into(), "bmV4dA==".into()))
            .with_status(200)
            .with_body(
                json!({
                    "ok": true,
                    "messages": [{"type": "message", "text": "rolled back deploy", "ts": "1714567000.000200"}],
                    "has_more": false,
                    "response_metadata": {"next_cursor": ""}
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = SlackClient::new(server.url(), "xoxb-test", "C0123");
        let messages = client.messages(window()).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
        let texts: Vec<_> = messages.iter().map(|m| m["text"].as_str().unwrap()).collect();
        assert_eq!(texts, vec!["db latency is spiking", "rolled back deploy"]);
    }

    #[tokio::test]
    async fn not_ok_response_is_chat_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/conversations.history")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"ok": false, "error": "channel_not_found"}"#)
            .create_async()
            .await;

        let client = SlackClient::new(server.url(), "xoxb-test", "C0123");
        let err = client.messages(window()).await.unwrap_err();
        assert!(matches!(err, BotError::Chat(_)));
        assert!(err.to_string().contains("channel_not_found"));
    }

    #[test]
    fn from_config_requires_channel() {
        let config = SlackConfig {
            token: Some("xoxb-1".into()),
            ..SlackConfig::default()
        };
        let err = SlackClient::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("SLACK_CHANNEL"));
    }
}
