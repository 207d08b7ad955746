use std::fmt;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// Issue types that are never split into subtasks.
pub const UNSPLITTABLE_ISSUE_TYPES: &[&str] = &["Bug", "Subtask"];

/// A Jira issue, reduced to the fields the automations read.
///
/// # Examples
///
/// ```
/// use devopsbot_core::{Issue, Reporter};
///
/// let issue = Issue {
///     key: "OPS-12".into(),
///     description: Some("Add a health check".into()),
///     reporter: Reporter { account_id: "abc".into(), email_address: None },
///     issue_type: "Task".into(),
/// };
/// assert_eq!(issue.project_key(), "OPS");
/// assert!(issue.is_splittable());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Issue key, e.g. `OPS-12`.
    pub key: String,
    /// Free-text description; Jira returns `null` for empty descriptions.
    pub description: Option<String>,
    /// Who filed the issue.
    pub reporter: Reporter,
    /// Issue type name (`Task`, `Story`, `Bug`, `Subtask`, ...).
    pub issue_type: String,
}

impl Issue {
    /// Project key: the part of the issue key before the first `-`.
    pub fn project_key(&self) -> &str {
        project_key_of(&self.key)
    }

    /// Whether the split step may break this issue into subtasks.
    pub fn is_splittable(&self) -> bool {
        !UNSPLITTABLE_ISSUE_TYPES.contains(&self.issue_type.as_str())
    }

    /// Description text, empty when the issue has none.
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }
}

/// Project key of an issue key (`OPS-12` → `OPS`).
pub fn project_key_of(issue_key: &str) -> &str {
    issue_key.split('-').next().unwrap_or(issue_key)
}

/// The reporter of an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reporter {
    /// Atlassian account id, used for reassignment.
    pub account_id: String,
    /// Email address; hidden by Jira for some privacy settings.
    pub email_address: Option<String>,
}

impl Reporter {
    /// Whether this reporter is the automation account itself.
    pub fn is_automation(&self, automation_username: &str) -> bool {
        self.email_address.as_deref() == Some(automation_username)
    }
}

/// A subtask proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskDraft {
    /// Subtask summary line.
    pub title: String,
    /// Subtask body.
    pub description: String,
}

/// A subtask ready to be created under a parent issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubtask {
    /// Key of the parent issue.
    pub parent_key: String,
    /// Project the subtask is filed in.
    pub project_key: String,
    /// Summary line.
    pub summary: String,
    /// Body text.
    pub description: String,
}

impl NewSubtask {
    /// Build a subtask under `parent_key` from a model draft.
    pub fn from_draft(parent_key: &str, draft: SubtaskDraft) -> Self {
        Self {
            parent_key: parent_key.to_string(),
            project_key: project_key_of(parent_key).to_string(),
            summary: draft.title,
            description: draft.description,
        }
    }
}

/// A pull request addressed by repository full name and number.
///
/// # Examples
///
/// ```
/// use devopsbot_core::PullRequestRef;
///
/// let pr = PullRequestRef { repository: "octocat/hello".into(), number: 7 };
/// assert_eq!(pr.to_string(), "octocat/hello#7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    /// `owner/name`.
    pub repository: String,
    /// Pull request number.
    pub number: u64,
}

impl fmt::Display for PullRequestRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.repository, self.number)
    }
}

/// Most recent ALARM and OK transitions of a CloudWatch alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmWindow {
    /// Alarm name.
    pub alarm_name: String,
    /// When the alarm last entered `ALARM`.
    pub last_alarm_time: DateTime<Utc>,
    /// When the alarm last entered `OK`.
    pub last_ok_time: DateTime<Utc>,
}

impl AlarmWindow {
    /// Range to query evidence over.
    pub fn query_window(&self) -> TimeWindow {
        TimeWindow::spanning(self.last_alarm_time, self.last_ok_time)
    }
}

/// A closed time range with `start <= end`.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use devopsbot_core::TimeWindow;
///
/// let later = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
/// let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();
/// let window = TimeWindow::spanning(later, earlier);
/// assert_eq!(window.start, earlier);
/// assert_eq!(window.end, later);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Inclusive upper bound.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// The smallest window containing both instants, in either order.
    pub fn spanning(a: DateTime<Utc>, b: DateTime<Utc>) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }
}

/// A generated incident report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncidentReport {
    /// Alarm that triggered the report.
    pub alarm_name: String,
    /// When the alarm fired.
    pub alarm_time: DateTime<Utc>,
    /// Report body.
    pub markdown: String,
}

impl IncidentReport {
    /// Object key the report is stored under: `{isoAlarmTime}_{alarmName}.md`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use devopsbot_core::IncidentReport;
    ///
    /// let report = IncidentReport {
    ///     alarm_name: "HighErrorRate".into(),
    ///     alarm_time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap(),
    ///     markdown: "# Incident".into(),
    /// };
    /// assert_eq!(report.object_key(), "2024-05-01T12:30:00+00:00_HighErrorRate.md");
    /// ```
    pub fn object_key(&self) -> String {
        format!("{}_{}.md", iso_format(self.alarm_time), self.alarm_name)
    }
}

/// Render a timestamp the way alarm transitions travel between steps:
/// `2024-05-01T12:30:00.123456Z`.
pub fn format_transition_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Render a timestamp in ISO 8601 with an explicit `+00:00` offset, dropping
/// the fractional part when it is zero and otherwise keeping microseconds.
pub fn iso_format(at: DateTime<Utc>) -> String {
    let micros = at.nanosecond() / 1_000;
    if micros == 0 {
        at.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
    } else {
        at.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
    }
}

/// Parse an ISO 8601 / RFC 3339 timestamp into UTC.
///
/// # Errors
///
/// Returns [`BotError::Time`] if `value` is not a valid timestamp.
///
/// # Examples
///
/// ```
/// use devopsbot_core::parse_timestamp;
///
/// let at = parse_timestamp("2024-05-01T12:30:00.000001Z").unwrap();
/// assert_eq!(at.timestamp(), 1714566600);
/// assert!(parse_timestamp("yesterday").is_err());
/// ```
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, BotError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| BotError::Time {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Seconds since the epoch with microsecond precision, as chat APIs expect.
pub fn epoch_seconds(at: DateTime<Utc>) -> String {
    let micros = at.timestamp_micros();
    format!("{}.{:06}", micros.div_euclid(1_000_000), micros.rem_euclid(1_000_000))
}

/// RFC 3339 rendering used inside serialized evidence.
pub fn evidence_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(micros: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap()
            + chrono::Duration::microseconds(i64::from(micros))
    }

    #[test]
    fn project_key_splits_on_first_dash() {
        assert_eq!(project_key_of("OPS-12"), "OPS");
        assert_eq!(project_key_of("NOPROJECT"), "NOPROJECT");
    }

    #[test]
    fn bugs_and_subtasks_are_not_splittable() {
        let mut issue = Issue {
            key: "OPS-1".into(),
            description: None,
            reporter: Reporter {
                account_id: "a".into(),
                email_address: None,
            },
            issue_type: "Bug".into(),
        };
        assert!(!issue.is_splittable());
        issue.issue_type = "Subtask".into();
        assert!(!issue.is_splittable());
        issue.issue_type = "Story".into();
        assert!(issue.is_splittable());
        assert_eq!(issue.description_text(), "");
    }

    #[test]
    fn reporter_without_email_is_never_automation() {
        let reporter = Reporter {
            account_id: "a".into(),
            email_address: None,
        };
        assert!(!reporter.is_automation("bot@example.com"));
    }

    #[test]
    fn transition_time_keeps_microseconds() {
        assert_eq!(format_transition_time(at(0)), "2024-05-01T12:30:00.000000Z");
        assert_eq!(format_transition_time(at(42)), "2024-05-01T12:30:00.000042Z");
    }

    #[test]
    fn iso_format_drops_zero_fraction() {
        assert_eq!(iso_format(at(0)), "2024-05-01T12:30:00+00:00");
        assert_eq!(iso_format(at(1500)), "2024-05-01T12:30:00.001500+00:00");
    }

    #[test]
    fn transition_time_round_trips_through_parser() {
        let original = at(123_456);
        let parsed = parse_timestamp(&format_transition_time(original)).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn epoch_seconds_has_six_decimals() {
        assert_eq!(epoch_seconds(at(250_000)), "1714566600.250000");
    }

    #[test]
    fn window_is_ordered_regardless_of_transition_order() {
        let window = AlarmWindow {
            alarm_name: "cpu".into(),
            last_alarm_time: at(10),
            last_ok_time: at(5),
        };
        let q = window.query_window();
        assert!(q.start <= q.end);
        assert_eq!(q.start, at(5));
    }
}
