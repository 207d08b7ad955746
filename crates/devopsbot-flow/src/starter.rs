//! Starting workflow executions without waiting for them.
//!
//! Trigger steps only hand their payload to a [`WorkflowStarter`]; whether the
//! execution runs in this process or in a managed service is decided by which
//! implementation the caller wires in.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use devopsbot_core::BotError;
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::Instrument;

use crate::engine::Engine;
use crate::graph::Flow;

/// Starts an execution of one particular workflow.
#[async_trait]
pub trait WorkflowStarter: Send + Sync {
    /// Start an execution with `input` and return its execution id.
    ///
    /// Returns once the execution is accepted; the outcome is not awaited.
    async fn start(&self, input: Value) -> Result<String, BotError>;
}

/// Runs the workflow in-process on the current tokio runtime.
///
/// Executions outlive the call that started them; a short-lived process
/// should [`drain`](Self::drain) before exiting. Finished executions are
/// reaped whenever a new one starts.
pub struct LocalStarter {
    name: String,
    flow: Arc<Flow>,
    engine: Engine,
    running: Mutex<JoinSet<()>>,
}

impl LocalStarter {
    /// A starter that executes `flow` with `engine`.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Workflow`] if `flow` names steps the engine cannot resolve.
    pub fn new(name: impl Into<String>, flow: Flow, engine: Engine) -> Result<Self, BotError> {
        engine.registry().check(&flow)?;
        Ok(Self {
            name: name.into(),
            flow: Arc::new(flow),
            engine,
            running: Mutex::new(JoinSet::new()),
        })
    }

    /// Wait for every execution started so far to finish.
    pub async fn drain(&self) {
        let mut running = match self.running.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                tracing::error!(workflow = %self.name, error = %e, "execution task aborted");
            }
        }
    }
}

#[async_trait]
impl WorkflowStarter for LocalStarter {
    async fn start(&self, input: Value) -> Result<String, BotError> {
        let execution_id = format!("{}:{}", self.name, uuid::Uuid::new_v4());
        let flow = Arc::clone(&self.flow);
        let engine = self.engine.clone();
        let span = tracing::info_span!("execution", workflow = %self.name, id = %execution_id);

        let execution = async move {
            match engine.execute(&flow, input).await {
                Ok(_) => tracing::info!("execution succeeded"),
                Err(e) => tracing::error!(error = %e, "execution failed"),
            }
        }
        .instrument(span);
        let mut running = self
            .running
            .lock()
            .map_err(|_| BotError::Workflow("execution set lock poisoned".into()))?;
        while let Some(joined) = running.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(workflow = %self.name, error = %e, "execution task aborted");
            }
        }
        running.spawn(execution);
        drop(running);

        tracing::info!(workflow = %self.name, id = %execution_id, "execution started");
        Ok(execution_id)
    }
}

/// Starts executions of an AWS Step Functions state machine.
pub struct StepFunctionsStarter {
    client: aws_sdk_sfn::Client,
    state_machine_arn: String,
}

impl StepFunctionsStarter {
    /// A starter for `state_machine_arn`.
    pub fn new(sdk: &aws_config::SdkConfig, state_machine_arn: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sfn::Client::new(sdk),
            state_machine_arn: state_machine_arn.into(),
        }
    }
}

#[async_trait]
impl WorkflowStarter for StepFunctionsStarter {
    async fn start(&self, input: Value) -> Result<String, BotError> {
        let output = self
            .client
            .start_execution()
            .state_machine_arn(&self.state_machine_arn)
            .input(serde_json::to_string(&input)?)
            .send()
            .await
            .map_err(|e| {
                BotError::Workflow(format!(
                    "failed to start execution: {}",
                    aws_sdk_sfn::error::DisplayErrorContext(&e)
                ))
            })?;
        let execution_arn = output.execution_arn().to_string();
        tracing::info!(execution = %execution_arn, "execution started");
        Ok(execution_arn)
    }
}

/// Records start requests instead of executing anything.
///
/// Backs `--dry-run` and lets callers observe whether a trigger decided to
/// start a workflow at all.
#[derive(Debug, Default)]
pub struct RecordingStarter {
    started: Mutex<Vec<Value>>,
}

impl RecordingStarter {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inputs of every start request, in order.
    pub fn started(&self) -> Vec<Value> {
        self.started.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WorkflowStarter for RecordingStarter {
    async fn start(&self, input: Value) -> Result<String, BotError> {
        let mut started = self
            .started
            .lock()
            .map_err(|_| BotError::Workflow("recorder lock poisoned".into()))?;
        started.push(input);
        Ok(format!("dry-run:{}", started.len()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::engine::{Step, StepRegistry};

    struct Notify(mpsc::UnboundedSender<Value>);

    #[async_trait]
    impl Step for Notify {
        async fn run(&self, input: Value) -> Result<Value, BotError> {
            let _ = self.0.send(input.clone());
            Ok(input)
        }
    }

    #[tokio::test]
    async fn local_starter_runs_flow_in_background() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = StepRegistry::new();
        registry.register("notify", Arc::new(Notify(tx)));
        let starter = LocalStarter::new("demo", Flow::task("notify"), Engine::new(registry)).unwrap();

        let id = starter.start(json!({"taskKey": "OPS-9"})).await.unwrap();
        assert!(id.starts_with("demo:"));

        let seen = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(seen["taskKey"], "OPS-9");
    }

    #[tokio::test]
    async fn drain_waits_for_running_executions() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = StepRegistry::new();
        registry.register("notify", Arc::new(Notify(tx)));
        let starter = LocalStarter::new("demo", Flow::task("notify"), Engine::new(registry)).unwrap();

        starter.start(json!({"n": 1})).await.unwrap();
        starter.start(json!({"n": 2})).await.unwrap();
        starter.drain().await;

        let mut seen = vec![rx.try_recv().unwrap()["n"].clone(), rx.try_recv().unwrap()["n"].clone()];
        seen.sort_by_key(|v| v.as_i64());
        assert_eq!(seen, vec![json!(1), json!(2)]);
    }

    #[tokio::test]
    async fn finished_executions_are_released() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = StepRegistry::new();
        registry.register("notify", Arc::new(Notify(tx)));
        let starter = LocalStarter::new("demo", Flow::task("notify"), Engine::new(registry)).unwrap();

        for n in 0..200 {
            starter.start(json!({ "n": n })).await.unwrap();
        }
        for _ in 0..200 {
            tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        starter.start(json!({ "n": 200 })).await.unwrap();
        assert!(starter.running.lock().unwrap().len() < 10);
    }

    #[test]
    fn local_starter_rejects_unknown_steps() {
        let result = LocalStarter::new("demo", Flow::task("nope"), Engine::new(StepRegistry::new()));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn recording_starter_keeps_inputs() {
        let starter = RecordingStarter::new();
        starter.start(json!({"a": 1})).await.unwrap();
        let id = starter.start(json!({"a": 2})).await.unwrap();
        assert_eq!(id, "dry-run:2");
        assert_eq!(starter.started(), vec![json!({"a": 1}), json!({"a": 2})]);
    }
}
