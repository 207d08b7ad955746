//! Structured completions: prompts whose reply must be a JSON object.
//!
//! Every caller that needs machine-readable output goes through
//! [`complete`], so a reply that is not the expected object always surfaces
//! as [`BotError::MalformedCompletion`] instead of a bare parse error from
//! deep inside a step.

use devopsbot_core::BotError;
use serde::de::DeserializeOwned;

use crate::client::{InferenceParams, ModelClient};

/// A JSON reply shape with invariants beyond what `serde` checks.
pub trait Schema: DeserializeOwned {
    /// Check cross-field invariants after deserialization.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the value is unusable.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Send `prompt` and parse the reply as `T`.
///
/// # Errors
///
/// Returns [`BotError::Model`] if the request fails, or
/// [`BotError::MalformedCompletion`] if the reply does not match `T`.
pub async fn complete<T: Schema>(
    model: &dyn ModelClient,
    prompt: &str,
    params: InferenceParams,
) -> Result<T, BotError> {
    let raw = model.ask(prompt, params).await?;
    parse_completion(&raw)
}

/// Parse a raw model reply as `T`.
///
/// Surrounding markdown code fences are tolerated; anything else that is not
/// a single JSON value of the right shape is rejected.
///
/// # Examples
///
/// ```
/// use devopsbot_model::structured::{parse_completion, Schema};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Verdict { pass: bool }
/// impl Schema for Verdict {}
///
/// let v: Verdict = parse_completion("```json\n{\"pass\": true}\n```").unwrap();
/// assert!(v.pass);
/// assert!(parse_completion::<Verdict>("I think it passes").is_err());
/// ```
pub fn parse_completion<T: Schema>(raw: &str) -> Result<T, BotError> {
    let cleaned = strip_code_fences(raw);
    let value: T = serde_json::from_str(cleaned).map_err(|e| {
        tracing::warn!(error = %e, "model reply is not valid JSON for the expected shape");
        BotError::MalformedCompletion {
            reason: e.to_string(),
            raw: raw.to_string(),
        }
    })?;
    value
        .validate()
        .map_err(|reason| BotError::MalformedCompletion {
            reason,
            raw: raw.to_string(),
        })?;
    Ok(value)
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}
