//! Declarative workflow graphs.
//!
//! A [`Flow`] is data: it names steps and describes how state moves between
//! them, but runs nothing itself. The [`crate::engine::Engine`] interprets it
//! in-process; a managed workflow service can execute an equivalent
//! definition instead.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A node in a workflow graph.
///
/// # Examples
///
/// ```
/// use devopsbot_flow::graph::Flow;
///
/// let flow = Flow::chain(vec![
///     Flow::task("review"),
///     Flow::choice("$.proceed", true, Flow::task("split"), Flow::Succeed),
/// ]);
/// let names: Vec<_> = flow.step_names().into_iter().collect();
/// assert_eq!(names, vec!["review", "split"]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Flow {
    /// Run a registered step.
    Task {
        /// Registered step name.
        step: String,
        /// Part of the state passed as the step's input (default: whole state).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input_path: Option<String>,
        /// Where the step's output is written (default: replaces the state).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_path: Option<String>,
    },
    /// Run nodes one after another, threading the state through.
    Chain {
        /// Nodes in execution order.
        steps: Vec<Flow>,
    },
    /// Branch on a boolean in the state.
    Choice {
        /// Path of the boolean to test.
        path: String,
        /// Value that selects `then`.
        equals: bool,
        /// Taken when the value matches.
        then: Box<Flow>,
        /// Taken otherwise.
        otherwise: Box<Flow>,
    },
    /// Run branches concurrently on copies of the state and collect their
    /// outputs in branch order.
    Parallel {
        /// Independent branches.
        branches: Vec<Flow>,
        /// Where the list of branch outputs is written.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result_path: Option<String>,
    },
    /// End successfully with the current state.
    Succeed,
}

impl Flow {
    /// A task whose output replaces the state.
    pub fn task(step: impl Into<String>) -> Self {
        Self::Task {
            step: step.into(),
            input_path: None,
            result_path: None,
        }
    }

    /// A task whose output is written at `result_path`, keeping the rest of the state.
    pub fn task_into(step: impl Into<String>, result_path: impl Into<String>) -> Self {
        Self::Task {
            step: step.into(),
            input_path: None,
            result_path: Some(result_path.into()),
        }
    }

    /// Sequential composition.
    pub fn chain(steps: Vec<Flow>) -> Self {
        Self::Chain { steps }
    }

    /// Conditional branch.
    pub fn choice(path: impl Into<String>, equals: bool, then: Flow, otherwise: Flow) -> Self {
        Self::Choice {
            path: path.into(),
            equals,
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Concurrent fan-out with fan-in at `result_path`.
    pub fn parallel(branches: Vec<Flow>, result_path: impl Into<String>) -> Self {
        Self::Parallel {
            branches,
            result_path: Some(result_path.into()),
        }
    }

    /// Every step name referenced anywhere in the graph.
    pub fn step_names(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_step_names(&mut names);
        names
    }

    fn collect_step_names<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            Self::Task { step, .. } => {
                names.insert(step.as_str());
            }
            Self::Chain { steps } => steps.iter().for_each(|s| s.collect_step_names(names)),
            Self::Choice {
                then, otherwise, ..
            } => {
                then.collect_step_names(names);
                otherwise.collect_step_names(names);
            }
            Self::Parallel { branches, .. } => {
                branches.iter().for_each(|b| b.collect_step_names(names))
            }
            Self::Succeed => {}
        }
    }
}
