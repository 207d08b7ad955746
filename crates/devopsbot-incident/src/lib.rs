//! Incident response automation.
//!
//! When an alarm recovers, [`trigger::IncidentTrigger`] finds its last
//! transitions and starts [`flow::incident_flow`]: audit events and chat
//! messages from the alarm window are gathered in parallel
//! ([`evidence`]), a model writes a markdown report ([`report`]), and the
//! report is stored ([`persist`]). Stored reports are indexed into a
//! knowledge base ([`ingest`]) that later answers playbook requests
//! ([`query`]).

pub mod alarms;
pub mod cloudtrail;
pub mod evidence;
pub mod flow;
pub mod ingest;
pub mod persist;
pub mod query;
pub mod report;
pub mod slack;
pub mod trigger;

use serde::{Deserialize, Serialize};

/// A status-code-and-body result, as returned to chat and alarm integrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// HTTP-style status code.
    pub status_code: u16,
    /// Message body.
    pub body: String,
}

impl StatusResponse {
    /// Build a response.
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }
}
