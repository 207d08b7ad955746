//! Process-wide client handles.
//!
//! Every pipeline component is assembled here from [`BotConfig`]. Clients are
//! created on first use and shared afterwards; the AWS SDK configuration is
//! loaded at most once per process.

use std::sync::{Arc, Mutex};

use aws_config::{BehaviorVersion, SdkConfig};
use devopsbot_codereview::github::GitHubClient;
use devopsbot_codereview::handler::CodeReview;
use devopsbot_core::{require, BotConfig, BotError, WorkflowEngine};
use devopsbot_flow::{
    Engine, LocalStarter, RecordingStarter, StepFunctionsStarter, StepRegistry, WorkflowStarter,
};
use devopsbot_incident::alarms::CloudWatchAlarms;
use devopsbot_incident::cloudtrail::CloudTrailClient;
use devopsbot_incident::evidence::{CloudTrailLookup, SlackLookup};
use devopsbot_incident::flow::{incident_flow, IncidentSteps};
use devopsbot_incident::ingest::StartIngestion;
use devopsbot_incident::persist::{PersistReport, S3ReportStore};
use devopsbot_incident::query::PreviousIncidents;
use devopsbot_incident::report::ReportCompose;
use devopsbot_incident::slack::SlackClient;
use devopsbot_incident::trigger::IncidentTrigger;
use devopsbot_kanban::flow::kanban_flow;
use devopsbot_kanban::jira::{IssueTracker, JiraClient};
use devopsbot_kanban::review::TaskReview;
use devopsbot_kanban::split::SubtaskSplit;
use devopsbot_kanban::trigger::KanbanTrigger;
use devopsbot_model::bedrock::BedrockModel;
use devopsbot_model::client::ModelClient;
use devopsbot_model::knowledge::{BedrockKnowledgeBase, KnowledgeBase};
use serde_json::Value;
use tokio::sync::OnceCell;

/// Lazily-built, shared clients for every automation.
pub struct Services {
    config: BotConfig,
    dry_run: bool,
    sdk: OnceCell<SdkConfig>,
    model: OnceCell<Arc<dyn ModelClient>>,
    recorder: Arc<RecordingStarter>,
    local: Mutex<Vec<Arc<LocalStarter>>>,
}

impl Services {
    /// Services backed by `config`.
    pub fn new(config: BotConfig) -> Self {
        Self {
            config,
            dry_run: false,
            sdk: OnceCell::new(),
            model: OnceCell::new(),
            recorder: Arc::new(RecordingStarter::new()),
            local: Mutex::new(Vec::new()),
        }
    }

    /// Record workflow starts instead of executing them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// The configuration services are built from.
    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Workflow inputs recorded in dry-run mode.
    pub fn recorded_starts(&self) -> Vec<Value> {
        self.recorder.started()
    }

    /// Wait for in-process workflow executions to finish.
    pub async fn drain(&self) {
        let starters: Vec<Arc<LocalStarter>> = match self.local.lock() {
            Ok(local) => local.clone(),
            Err(_) => return,
        };
        for starter in starters {
            starter.drain().await;
        }
    }

    async fn sdk(&self) -> &SdkConfig {
        self.sdk
            .get_or_init(|| async {
                tracing::debug!("loading AWS configuration");
                aws_config::load_defaults(BehaviorVersion::latest()).await
            })
            .await
    }

    /// The chat model (`MODEL_ID`).
    ///
    /// # Errors
    ///
    /// Returns [`BotError::MissingSetting`] if no model is configured.
    pub async fn model(&self) -> Result<Arc<dyn ModelClient>, BotError> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let model_id = require(&self.config.model.model_id, "MODEL_ID")?;
                let client: Arc<dyn ModelClient> =
                    Arc::new(BedrockModel::new(self.sdk().await, model_id));
                Ok::<_, BotError>(client)
            })
            .await?;
        Ok(Arc::clone(model))
    }

    /// The issue tracker.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::MissingSetting`] if the Jira settings are incomplete.
    pub fn issue_tracker(&self) -> Result<Arc<dyn IssueTracker>, BotError> {
        Ok(Arc::new(JiraClient::from_config(&self.config.jira)?))
    }

    /// The kanban review step.
    pub async fn task_review(&self) -> Result<TaskReview, BotError> {
        let username = require(&self.config.jira.username, "JIRA_USERNAME")?;
        Ok(TaskReview::new(
            self.issue_tracker()?,
            self.model().await?,
            username,
        ))
    }

    /// The kanban split step.
    pub async fn subtask_split(&self) -> Result<SubtaskSplit, BotError> {
        Ok(SubtaskSplit::new(self.issue_tracker()?, self.model().await?))
    }

    /// Starter for the kanban workflow on the configured engine.
    pub async fn kanban_starter(&self) -> Result<Arc<dyn WorkflowStarter>, BotError> {
        if self.dry_run {
            return Ok(Arc::clone(&self.recorder) as Arc<dyn WorkflowStarter>);
        }
        match self.config.workflow.engine {
            WorkflowEngine::StepFunctions => {
                let arn = require(&self.config.workflow.kanban_state_machine_arn, "STEP_FUNCTIONS_ARN")?;
                Ok(Arc::new(StepFunctionsStarter::new(self.sdk().await, arn)))
            }
            WorkflowEngine::Local => {
                let mut registry = StepRegistry::new();
                devopsbot_kanban::flow::register(
                    &mut registry,
                    self.task_review().await?,
                    self.subtask_split().await?,
                );
                self.local_starter("kanban", kanban_flow(), registry)
            }
        }
    }

    /// The kanban trigger.
    pub async fn kanban_trigger(&self) -> Result<KanbanTrigger, BotError> {
        Ok(KanbanTrigger::new(self.kanban_starter().await?))
    }

    /// The pull request review handler.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::MissingSetting`] if the token, secret, or model is
    /// not configured.
    pub async fn code_review(&self) -> Result<CodeReview, BotError> {
        let secret = require(&self.config.github.webhook_secret, "GITHUB_SECRET")?;
        let github = GitHubClient::new(&self.config.github)?;
        Ok(CodeReview::new(Arc::new(github), self.model().await?, secret))
    }

    /// The steps of the incident report workflow.
    pub async fn incident_steps(&self) -> Result<IncidentSteps, BotError> {
        let bucket = require(&self.config.incident.bucket, "S3_BUCKET_NAME")?;
        let sdk = self.sdk().await;
        Ok(IncidentSteps {
            cloudtrail: CloudTrailLookup::new(Arc::new(CloudTrailClient::new(sdk))),
            slack: SlackLookup::new(Arc::new(SlackClient::from_config(&self.config.slack)?)),
            compose: ReportCompose::new(self.model().await?),
            persist: PersistReport::new(Arc::new(S3ReportStore::new(sdk, bucket))),
        })
    }

    /// Starter for the incident workflow on the configured engine.
    pub async fn incident_starter(&self) -> Result<Arc<dyn WorkflowStarter>, BotError> {
        if self.dry_run {
            return Ok(Arc::clone(&self.recorder) as Arc<dyn WorkflowStarter>);
        }
        match self.config.workflow.engine {
            WorkflowEngine::StepFunctions => {
                let arn = require(&self.config.incident.state_machine_arn, "STATE_MACHINE_ARN")?;
                Ok(Arc::new(StepFunctionsStarter::new(self.sdk().await, arn)))
            }
            WorkflowEngine::Local => {
                let mut registry = StepRegistry::new();
                devopsbot_incident::flow::register(&mut registry, self.incident_steps().await?);
                self.local_starter("incident", incident_flow(), registry)
            }
        }
    }

    /// The incident trigger.
    pub async fn incident_trigger(&self) -> Result<IncidentTrigger, BotError> {
        let starter = self.incident_starter().await?;
        let alarms = CloudWatchAlarms::new(self.sdk().await);
        Ok(IncidentTrigger::new(Arc::new(alarms), starter))
    }

    /// The report knowledge base.
    pub async fn knowledge_base(&self) -> Result<Arc<dyn KnowledgeBase>, BotError> {
        let kb_id = require(&self.config.incident.knowledge_base_id, "KNOWLEDGE_BASE_ID")?;
        Ok(Arc::new(BedrockKnowledgeBase::new(
            self.sdk().await,
            kb_id,
            self.config.incident.data_source_id.clone(),
            self.config.model.model_id.clone(),
        )))
    }

    /// The ingestion step.
    pub async fn start_ingestion(&self) -> Result<StartIngestion, BotError> {
        Ok(StartIngestion::new(self.knowledge_base().await?))
    }

    /// The playbook query step.
    pub async fn previous_incidents(&self) -> Result<PreviousIncidents, BotError> {
        Ok(PreviousIncidents::new(self.knowledge_base().await?))
    }

    fn local_starter(
        &self,
        name: &str,
        flow: devopsbot_flow::Flow,
        registry: StepRegistry,
    ) -> Result<Arc<dyn WorkflowStarter>, BotError> {
        let starter = Arc::new(LocalStarter::new(name, flow, Engine::new(registry))?);
        if let Ok(mut local) = self.local.lock() {
            local.push(Arc::clone(&starter));
        }
        Ok(starter as Arc<dyn WorkflowStarter>)
    }
}
