//! Alarm state history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use devopsbot_core::BotError;
use serde::Deserialize;

/// History item type carrying state transitions.
pub const STATE_UPDATE: &str = "StateUpdate";

/// Upper bound on history items inspected per alarm.
pub const MAX_HISTORY_RECORDS: i32 = 100;

/// One entry of an alarm's history, newest first as the service returns them.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryItem {
    /// History item type (`StateUpdate`, `ConfigurationUpdate`, `Action`).
    pub item_type: String,
    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
    /// JSON document describing the change, if any.
    pub history_data: Option<String>,
}

/// Source of alarm state history.
#[async_trait]
pub trait AlarmHistory: Send + Sync {
    /// Return the state-update history of `alarm_name` in service order.
    async fn state_updates(&self, alarm_name: &str) -> Result<Vec<HistoryItem>, BotError>;
}

/// CloudWatch-backed [`AlarmHistory`].
pub struct CloudWatchAlarms {
    client: aws_sdk_cloudwatch::Client,
}

impl CloudWatchAlarms {
    /// Create a client from shared SDK configuration.
    pub fn new(sdk: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_cloudwatch::Client::new(sdk),
        }
    }
}

#[async_trait]
impl AlarmHistory for CloudWatchAlarms {
    async fn state_updates(&self, alarm_name: &str) -> Result<Vec<HistoryItem>, BotError> {
        let output = self
            .client
            .describe_alarm_history()
            .alarm_name(alarm_name)
            .history_item_type(aws_sdk_cloudwatch::types::HistoryItemType::StateUpdate)
            .max_records(MAX_HISTORY_RECORDS)
            .send()
            .await
            .map_err(|e| {
                BotError::Cloud(format!(
                    "failed to describe alarm history for {alarm_name}: {}",
                    aws_sdk_cloudwatch::error::DisplayErrorContext(&e)
                ))
            })?;

        let items = output
            .alarm_history_items()
            .iter()
            .filter_map(|item| {
                let ts = item.timestamp()?;
                let timestamp = DateTime::from_timestamp(ts.secs(), ts.subsec_nanos())?;
                Some(HistoryItem {
                    item_type: item
                        .history_item_type()
                        .map(|t| t.as_str().to_string())
                        .unwrap_or_default(),
                    timestamp,
                    history_data: item.history_data().map(str::to_string),
                })
            })
            .collect();
        Ok(items)
    }
}

/// First OK and first ALARM transitions found in a history list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Transitions {
    /// Timestamp of the first `ALARM` transition encountered.
    pub last_alarm: Option<DateTime<Utc>>,
    /// Timestamp of the first `OK` transition encountered.
    pub last_ok: Option<DateTime<Utc>>,
}

impl Transitions {
    /// Both transitions, if both were found.
    pub fn both(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.last_alarm?, self.last_ok?))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryData {
    new_state: StateChange,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateChange {
    state_value: String,
}

/// Scan `items` in order and keep the first `OK` and first `ALARM` transition.
///
/// Later repeats of either state are ignored, as are items of other types and
/// items without readable history data. Items are not re-sorted.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use devopsbot_incident::alarms::{scan_transitions, HistoryItem};
///
/// let item = |minute, state: &str| HistoryItem {
///     item_type: "StateUpdate".into(),
///     timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, minute, 0).unwrap(),
///     history_data: Some(format!(r#"{{"newState":{{"stateValue":"{state}"}}}}"#)),
/// };
/// let found = scan_transitions(&[item(30, "OK"), item(10, "ALARM"), item(5, "OK")]);
/// assert_eq!(found.last_ok.unwrap().format("%M").to_string(), "30");
/// assert_eq!(found.last_alarm.unwrap().format("%M").to_string(), "10");
/// ```
pub fn scan_transitions(items: &[HistoryItem]) -> Transitions {
    let mut found = Transitions::default();
    for item in items {
        if item.item_type != STATE_UPDATE {
            continue;
        }
        let Some(data) = item.history_data.as_deref().filter(|d| !d.is_empty()) else {
            continue;
        };
        let state = match serde_json::from_str::<HistoryData>(data) {
            Ok(d) => d.new_state.state_value,
            Err(e) => {
                tracing::warn!(error = %e, at = %item.timestamp, "unreadable alarm history data");
                continue;
            }
        };
        match state.as_str() {
            "OK" if found.last_ok.is_none() => found.last_ok = Some(item.timestamp),
            "ALARM" if found.last_alarm.is_none() => found.last_alarm = Some(item.timestamp),
            _ => {}
        }
        if found.both().is_some() {
            break;
        }
    }
    found
}
