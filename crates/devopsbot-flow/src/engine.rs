//! In-process interpreter for [`Flow`] graphs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use devopsbot_core::BotError;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;

use crate::graph::Flow;
use crate::path::JsonPath;

/// A single stateless unit of work.
///
/// Steps receive their input as JSON and return JSON, exactly as they would
/// when invoked by a managed workflow service.
#[async_trait]
pub trait Step: Send + Sync {
    /// Run the step.
    async fn run(&self, input: Value) -> Result<Value, BotError>;
}

/// Steps addressable by name from a [`Flow`].
#[derive(Default, Clone)]
pub struct StepRegistry {
    steps: HashMap<String, Arc<dyn Step>>,
}

impl StepRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `step` under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, step: Arc<dyn Step>) -> &mut Self {
        self.steps.insert(name.into(), step);
        self
    }

    /// Look up a step.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    /// Check that every step `flow` references is registered.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Workflow`] listing the unknown step names.
    pub fn check(&self, flow: &Flow) -> Result<(), BotError> {
        let missing: Vec<&str> = flow
            .step_names()
            .into_iter()
            .filter(|name| !self.steps.contains_key(*name))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BotError::Workflow(format!(
                "unregistered steps: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Interprets flows against a [`StepRegistry`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use async_trait::async_trait;
/// use devopsbot_core::BotError;
/// use devopsbot_flow::engine::{Engine, Step, StepRegistry};
/// use devopsbot_flow::graph::Flow;
/// use serde_json::{json, Value};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Step for Echo {
///     async fn run(&self, input: Value) -> Result<Value, BotError> {
///         Ok(input)
///     }
/// }
///
/// let mut registry = StepRegistry::new();
/// registry.register("echo", Arc::new(Echo));
/// let engine = Engine::new(registry);
///
/// let rt = tokio::runtime::Runtime::new().unwrap();
/// let out = rt.block_on(engine.execute(&Flow::task("echo"), json!({"a": 1}))).unwrap();
/// assert_eq!(out, json!({"a": 1}));
/// ```
#[derive(Clone)]
pub struct Engine {
    registry: Arc<StepRegistry>,
}

impl Engine {
    /// Create an engine over `registry`.
    pub fn new(registry: StepRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    /// The registry steps are resolved from.
    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Run `flow` to completion starting from `input` and return the final state.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a step, or [`BotError::Workflow`] for
    /// unregistered steps, bad paths, and non-boolean choice values. There is
    /// no retry; a failed step fails the execution.
    pub async fn execute(&self, flow: &Flow, input: Value) -> Result<Value, BotError> {
        self.registry.check(flow)?;
        self.run_node(flow, input).await
    }

    fn run_node<'a>(&'a self, flow: &'a Flow, state: Value) -> BoxFuture<'a, Result<Value, BotError>> {
        async move {
            match flow {
                Flow::Task {
                    step,
                    input_path,
                    result_path,
                } => {
                    let handler = self
                        .registry
                        .get(step)
                        .ok_or_else(|| BotError::Workflow(format!("unregistered step '{step}'")))?;
                    let input = match input_path {
                        Some(p) => JsonPath::parse(p)?.select(&state)?,
                        None => state.clone(),
                    };
                    tracing::debug!(step = %step, "running step");
                    let output = handler.run(input).await.inspect_err(|e| {
                        tracing::error!(step = %step, error = %e, "step failed");
                    })?;
                    write_result(state, result_path.as_deref(), output)
                }
                Flow::Chain { steps } => {
                    let mut state = state;
                    for node in steps {
                        state = self.run_node(node, state).await?;
                    }
                    Ok(state)
                }
                Flow::Choice {
                    path,
                    equals,
                    then,
                    otherwise,
                } => {
                    let value = JsonPath::parse(path)?.select(&state)?;
                    let flag = value.as_bool().ok_or_else(|| {
                        BotError::Workflow(format!("choice value at {path} is not a boolean: {value}"))
                    })?;
                    let branch = if flag == *equals { then } else { otherwise };
                    self.run_node(branch, state).await
                }
                Flow::Parallel {
                    branches,
                    result_path,
                } => {
                    let outputs = try_join_all(
                        branches
                            .iter()
                            .map(|branch| self.run_node(branch, state.clone())),
                    )
                    .await?;
                    write_result(state, result_path.as_deref(), Value::Array(outputs))
                }
                Flow::Succeed => Ok(state),
            }
        }
        .boxed()
    }
}

fn write_result(state: Value, result_path: Option<&str>, output: Value) -> Result<Value, BotError> {
    match result_path {
        Some(p) => JsonPath::parse(p)?.insert(state, output),
        None => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;

    struct Constant(Value);

    #[async_trait]
    impl Step for Constant {
        async fn run(&self, _input: Value) -> Result<Value, BotError> {
            Ok(self.0.clone())
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Step for Counting {
        async fn run(&self, input: Value) -> Result<Value, BotError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(input)
        }
    }

    /// Sleeps longer for earlier branches so completion order differs from branch order.
    struct Delayed {
        millis: u64,
        label: &'static str,
    }

    #[async_trait]
    impl Step for Delayed {
        async fn run(&self, _input: Value) -> Result<Value, BotError> {
            tokio::time::sleep(Duration::from_millis(self.millis)).await;
            Ok(json!({ "done": self.label }))
        }
    }

    struct Failing;

    #[async_trait]
    impl Step for Failing {
        async fn run(&self, _input: Value) -> Result<Value, BotError> {
            Err(BotError::Model("boom".into()))
        }
    }

    fn review_flow() -> Flow {
        Flow::chain(vec![
            Flow::task("review"),
            Flow::choice("$.proceed", true, Flow::task("split"), Flow::Succeed),
        ])
    }

    fn registry_with_review(proceed: bool, split_calls: Arc<AtomicUsize>) -> StepRegistry {
        let mut registry = StepRegistry::new();
        registry.register(
            "review",
            Arc::new(Constant(json!({"proceed": proceed, "taskKey": "OPS-1"}))),
        );
        registry.register("split", Arc::new(Counting(split_calls)));
        registry
    }

    #[tokio::test]
    async fn choice_takes_then_branch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Engine::new(registry_with_review(true, calls.clone()));
        let out = engine.execute(&review_flow(), json!({"taskKey": "OPS-1"})).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(out["taskKey"], "OPS-1");
    }

    #[tokio::test]
    async fn choice_takes_otherwise_branch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let engine = Engine::new(registry_with_review(false, calls.clone()));
        let out = engine.execute(&review_flow(), json!({"taskKey": "OPS-1"})).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(out["proceed"], false);
    }

    #[tokio::test]
    async fn choice_on_non_boolean_fails() {
        let mut registry = StepRegistry::new();
        registry.register("review", Arc::new(Constant(json!({"proceed": "yes"}))));
        registry.register("split", Arc::new(Constant(json!({}))));
        let err = Engine::new(registry)
            .execute(&review_flow(), json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::Workflow(_)));
    }

    #[tokio::test]
    async fn parallel_collects_in_branch_order() {
        let mut registry = StepRegistry::new();
        registry.register("slow", Arc::new(Delayed { millis: 30, label: "slow" }));
        registry.register("fast", Arc::new(Delayed { millis: 1, label: "fast" }));
        let flow = Flow::parallel(vec![Flow::task("slow"), Flow::task("fast")], "$.results");

        let out = Engine::new(registry)
            .execute(&flow, json!({"alarm": "cpu"}))
            .await
            .unwrap();
        assert_eq!(out["alarm"], "cpu");
        assert_eq!(out["results"], json!([{"done": "slow"}, {"done": "fast"}]));
    }

    #[tokio::test]
    async fn task_result_path_and_input_path() {
        let mut registry = StepRegistry::new();
        registry.register("echo", Arc::new(Counting(Arc::new(AtomicUsize::new(0)))));
        let flow = Flow::Task {
            step: "echo".into(),
            input_path: Some("$.inner".into()),
            result_path: Some("$.copy".into()),
        };
        let out = Engine::new(registry)
            .execute(&flow, json!({"inner": {"x": 1}}))
            .await
            .unwrap();
        assert_eq!(out, json!({"inner": {"x": 1}, "copy": {"x": 1}}));
    }

    #[tokio::test]
    async fn unregistered_step_fails_before_running_anything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = StepRegistry::new();
        registry.register("first", Arc::new(Counting(calls.clone())));
        let flow = Flow::chain(vec![Flow::task("first"), Flow::task("missing")]);

        let err = Engine::new(registry).execute(&flow, json!({})).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn step_error_stops_the_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = StepRegistry::new();
        registry.register("fail", Arc::new(Failing));
        registry.register("after", Arc::new(Counting(calls.clone())));
        let flow = Flow::chain(vec![Flow::task("fail"), Flow::task("after")]);

        let err = Engine::new(registry).execute(&flow, json!({})).await.unwrap_err();
        assert!(matches!(err, BotError::Model(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
