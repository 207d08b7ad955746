use std::io::Read;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use serde_json::{json, Value};

use devopsbot_core::BotConfig;
use devopsbot_flow::{Engine, Flow, Step, StepRegistry};
use devopsbot_server::{AppState, Services};

const CONFIG_FILE: &str = ".devopsbot.toml";

#[derive(Parser)]
#[command(
    name = "devopsbot",
    version,
    about = "AI-assisted DevOps automations",
    long_about = "DevOpsBot reviews and splits Jira tasks, reviews pull requests, and writes\n\
                   incident reports from alarm history, audit events, and chat.\n\n\
                   Examples:\n  \
                     devopsbot serve                          Run the webhook server\n  \
                     devopsbot kanban review OPS-12           Review one Jira task\n  \
                     devopsbot review-pr acme/api#42          Review a pull request\n  \
                     devopsbot incident trigger alarm.json    Start a report for an alarm\n  \
                     devopsbot flow show incident             Print a workflow graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .devopsbot.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Record workflow starts instead of executing them
    #[arg(long, global = true)]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server for webhooks and events
    Serve {
        /// Socket address to bind (default: from config, 0.0.0.0:8080)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Jira task review and subtask splitting
    Kanban {
        #[command(subcommand)]
        action: KanbanAction,
    },
    /// Handle one GitHub webhook delivery ({"headers": {...}, "body": "..."})
    ReviewWebhook {
        /// Read the delivery from file instead of stdin
        file: Option<PathBuf>,
    },
    /// Review a pull request directly, without a webhook
    ReviewPr {
        /// Pull request as owner/repo#number
        pr: String,
    },
    /// Incident reports and playbooks
    Incident {
        #[command(subcommand)]
        action: IncidentAction,
    },
    /// Inspect workflow definitions
    Flow {
        #[command(subcommand)]
        action: FlowAction,
    },
    /// Create a default .devopsbot.toml in the current directory
    Init,
}

#[derive(Subcommand)]
enum KanbanAction {
    /// Handle an automation notification envelope and start the workflow
    Trigger {
        /// Read the envelope from file instead of stdin
        file: Option<PathBuf>,
    },
    /// Review a task for completeness
    Review {
        /// Issue key, e.g. OPS-12
        key: String,
    },
    /// Split a task into subtasks
    Split {
        /// Issue key, e.g. OPS-12
        key: String,
    },
    /// Run the whole review-then-split workflow in this process
    Run {
        /// Issue key, e.g. OPS-12
        key: String,
    },
}

#[derive(Subcommand)]
enum IncidentAction {
    /// Handle an alarm event and start report generation
    Trigger {
        /// Read the event from file instead of stdin
        file: Option<PathBuf>,
    },
    /// Generate and store a report in this process from an event carrying
    /// lastAlarmTime and lastOkTime
    Report {
        /// Read the event from file instead of stdin
        file: Option<PathBuf>,
    },
    /// Start knowledge base ingestion for an object notification
    Ingest {
        /// Read the notification from file instead of stdin
        file: Option<PathBuf>,
    },
    /// Ask the knowledge base for a playbook
    Query {
        /// Read the request from file instead of stdin
        file: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum FlowAction {
    /// Print a workflow graph as JSON
    Show {
        /// Workflow name
        name: FlowName,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FlowName {
    Kanban,
    Incident,
}

const DEFAULT_CONFIG: &str = r#"# DevOpsBot configuration
# Environment variables (JIRA_URL, MODEL_ID, SLACK_TOKEN, ...) override these values.

[model]
# model_id = "anthropic.claude-3-5-sonnet-20241022-v2:0"

[jira]
# url = "https://example.atlassian.net"
# username = "automation@example.com"
# api_token = ""

[github]
api_base = "https://api.github.com"
timeout_secs = 30
# token = ""
# webhook_secret = ""

[slack]
api_base = "https://slack.com/api"
# token = ""
# channel = "C0123456789"

[incident]
# bucket = "incident-reports"
# knowledge_base_id = ""
# data_source_id = ""
# state_machine_arn = ""

[workflow]
# "local" runs workflows in this process; "step-functions" starts state machine executions.
engine = "local"
# kanban_state_machine_arn = ""

[server]
bind = "0.0.0.0:8080"
"#;

fn read_json_input(file: &Option<PathBuf>) -> Result<Value> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display()))?,
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .into_diagnostic()
                .wrap_err("reading stdin")?;
            input
        }
    };
    serde_json::from_str(&text)
        .into_diagnostic()
        .wrap_err("input is not valid JSON")
}

fn print_json(value: &Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{text}");
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<BotConfig> {
    let mut config = match path {
        Some(path) => BotConfig::from_file(path).into_diagnostic()?,
        None => {
            let default_path = Path::new(CONFIG_FILE);
            if default_path.exists() {
                BotConfig::from_file(default_path).into_diagnostic()?
            } else {
                BotConfig::default()
            }
        }
    };
    config.apply_env();
    Ok(config)
}

async fn run_step(step: &dyn Step, input: Value) -> Result<Value> {
    step.run(input).await.into_diagnostic()
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Command::Init = cli.command {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            miette::bail!("{CONFIG_FILE} already exists");
        }
        std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
        println!("Created {CONFIG_FILE} with default configuration");
        return Ok(());
    }
    if let Command::Flow {
        action: FlowAction::Show { name },
    } = cli.command
    {
        let flow = match name {
            FlowName::Kanban => devopsbot_kanban::flow::kanban_flow(),
            FlowName::Incident => devopsbot_incident::flow::incident_flow(),
        };
        return print_json(&serde_json::to_value(&flow).into_diagnostic()?);
    }

    let config = load_config(cli.config.as_deref())?;
    let services = Services::new(config).with_dry_run(cli.dry_run);

    match cli.command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| services.config().server.bind.clone());
            let state = AppState::from_services(&services).await;
            devopsbot_server::serve(state, &bind)
                .await
                .map_err(|e| miette::miette!("{e:#}"))?;
        }
        Command::Kanban { action } => match action {
            KanbanAction::Trigger { file } => {
                let envelope = read_json_input(&file)?;
                let trigger = services.kanban_trigger().await.into_diagnostic()?;
                print_json(&run_step(&trigger, envelope).await?)?;
            }
            KanbanAction::Review { key } => {
                let review = services.task_review().await.into_diagnostic()?;
                print_json(&run_step(&review, json!({ "taskKey": key })).await?)?;
            }
            KanbanAction::Split { key } => {
                let split = services.subtask_split().await.into_diagnostic()?;
                print_json(&run_step(&split, json!({ "taskKey": key })).await?)?;
            }
            KanbanAction::Run { key } => {
                let mut registry = StepRegistry::new();
                devopsbot_kanban::flow::register(
                    &mut registry,
                    services.task_review().await.into_diagnostic()?,
                    services.subtask_split().await.into_diagnostic()?,
                );
                let output = execute(
                    registry,
                    devopsbot_kanban::flow::kanban_flow(),
                    json!({ "taskKey": key }),
                )
                .await?;
                print_json(&output)?;
            }
        },
        Command::ReviewWebhook { file } => {
            let delivery = read_json_input(&file)?;
            let review = services.code_review().await.into_diagnostic()?;
            print_json(&run_step(&review, delivery).await?)?;
        }
        Command::ReviewPr { pr } => {
            let pr = devopsbot_codereview::github::parse_pr_reference(&pr).into_diagnostic()?;
            let review = services.code_review().await.into_diagnostic()?;
            let feedback = review.review(&pr).await.into_diagnostic()?;
            println!("{feedback}");
        }
        Command::Incident { action } => match action {
            IncidentAction::Trigger { file } => {
                let event = read_json_input(&file)?;
                let trigger = services.incident_trigger().await.into_diagnostic()?;
                print_json(&run_step(&trigger, event).await?)?;
            }
            IncidentAction::Report { file } => {
                let event = read_json_input(&file)?;
                let mut registry = StepRegistry::new();
                devopsbot_incident::flow::register(
                    &mut registry,
                    services.incident_steps().await.into_diagnostic()?,
                );
                let output =
                    execute(registry, devopsbot_incident::flow::incident_flow(), event).await?;
                print_json(&output)?;
            }
            IncidentAction::Ingest { file } => {
                let notification = read_json_input(&file)?;
                let ingest = services.start_ingestion().await.into_diagnostic()?;
                print_json(&run_step(&ingest, notification).await?)?;
            }
            IncidentAction::Query { file } => {
                let request = read_json_input(&file)?;
                let query = services.previous_incidents().await.into_diagnostic()?;
                print_json(&run_step(&query, request).await?)?;
            }
        },
        Command::Flow { .. } | Command::Init => {}
    }

    if cli.dry_run {
        let recorded = services.recorded_starts();
        if !recorded.is_empty() {
            eprintln!("dry run: {} workflow start(s) recorded", recorded.len());
        }
    }
    services.drain().await;

    Ok(())
}

async fn execute(registry: StepRegistry, flow: Flow, input: Value) -> Result<Value> {
    Engine::new(registry)
        .execute(&flow, input)
        .await
        .into_diagnostic()
}
