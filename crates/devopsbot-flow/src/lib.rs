//! Workflow orchestration for devopsbot.
//!
//! Step logic lives in the pipeline crates; sequencing lives here, as data
//! ([`graph::Flow`]) interpreted by [`engine::Engine`] or handed to a managed
//! engine through [`starter::WorkflowStarter`].

pub mod engine;
pub mod graph;
pub mod path;
pub mod starter;

pub use engine::{Engine, Step, StepRegistry};
pub use graph::Flow;
pub use starter::{LocalStarter, RecordingStarter, StepFunctionsStarter, WorkflowStarter};
