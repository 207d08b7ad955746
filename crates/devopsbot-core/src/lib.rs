//! Core types, configuration, and error handling for devopsbot.
//!
//! This crate provides the shared foundation used by all other devopsbot crates:
//! - [`BotError`]: unified error type using `thiserror`
//! - [`BotConfig`]: configuration loaded from `.devopsbot.toml` and the environment
//! - Shared payload types: [`Issue`], [`PullRequestRef`], [`AlarmWindow`],
//!   [`IncidentReport`], and the timestamp formats that travel between steps

mod config;
mod error;
mod payload;
mod types;

pub use config::{
    require, BotConfig, GitHubConfig, IncidentConfig, JiraConfig, ModelConfig, ServerConfig,
    SlackConfig, WorkflowConfig, WorkflowEngine,
};
pub use error::BotError;
pub use payload::{parse_payload, to_payload};
pub use types::{
    epoch_seconds, evidence_time, format_transition_time, iso_format, parse_timestamp,
    project_key_of, AlarmWindow, IncidentReport, Issue, NewSubtask, PullRequestRef, Reporter,
    SubtaskDraft, TimeWindow, UNSPLITTABLE_ISSUE_TYPES,
};

/// A convenience `Result` type for devopsbot operations.
pub type Result<T> = std::result::Result<T, BotError>;
