use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::BotError;

/// Deserialize a step input, reporting shape problems as
/// [`BotError::InvalidPayload`].
///
/// # Examples
///
/// ```
/// use devopsbot_core::parse_payload;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Input { task_key: String }
///
/// let input: Input = parse_payload(serde_json::json!({"taskKey": "OPS-3"})).unwrap();
/// assert_eq!(input.task_key, "OPS-3");
/// assert!(parse_payload::<Input>(serde_json::json!({})).is_err());
/// ```
pub fn parse_payload<T: DeserializeOwned>(value: Value) -> Result<T, BotError> {
    serde_json::from_value(value).map_err(|e| BotError::InvalidPayload(e.to_string()))
}

/// Serialize a step output.
pub fn to_payload<T: Serialize>(value: &T) -> Result<Value, BotError> {
    Ok(serde_json::to_value(value)?)
}
