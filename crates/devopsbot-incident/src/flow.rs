use std::sync::Arc;

use devopsbot_flow::{Flow, StepRegistry};

use crate::evidence::{CloudTrailLookup, SlackLookup};
use crate::persist::PersistReport;
use crate::report::ReportCompose;

/// Registered name of the audit-trail lookup.
pub const CLOUDTRAIL_STEP: &str = "lookup-cloudtrail-events";

/// Registered name of the chat lookup.
pub const SLACK_STEP: &str = "lookup-slack-events";

/// Registered name of the report composer.
pub const COMPOSE_STEP: &str = "create-markdown-report";

/// Registered name of the report writer.
pub const PERSIST_STEP: &str = "upload-markdown-report";

/// Gather evidence in parallel, write the report, then store it.
///
/// # Examples
///
/// ```
/// use devopsbot_incident::flow::incident_flow;
///
/// assert_eq!(incident_flow().step_names().len(), 4);
/// ```
pub fn incident_flow() -> Flow {
    Flow::chain(vec![
        Flow::parallel(
            vec![Flow::task(CLOUDTRAIL_STEP), Flow::task(SLACK_STEP)],
            "$.parallelResults",
        ),
        Flow::task_into(COMPOSE_STEP, "$.reportResult"),
        Flow::task(PERSIST_STEP),
    ])
}

/// The steps [`incident_flow`] runs.
pub struct IncidentSteps {
    /// Audit-trail lookup.
    pub cloudtrail: CloudTrailLookup,
    /// Chat lookup.
    pub slack: SlackLookup,
    /// Report composer.
    pub compose: ReportCompose,
    /// Report writer.
    pub persist: PersistReport,
}

/// Register the incident steps under the names [`incident_flow`] uses.
pub fn register(registry: &mut StepRegistry, steps: IncidentSteps) {
    registry
        .register(CLOUDTRAIL_STEP, Arc::new(steps.cloudtrail))
        .register(SLACK_STEP, Arc::new(steps.slack))
        .register(COMPOSE_STEP, Arc::new(steps.compose))
        .register(PERSIST_STEP, Arc::new(steps.persist));
}
