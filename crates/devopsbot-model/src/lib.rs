//! Model inference and knowledge base access.
//!
//! Provides the [`client::ModelClient`] seam with its Bedrock implementation,
//! the structured-completion adapter every JSON-producing prompt goes through,
//! and the retrieval knowledge base used by the incident pipeline.

pub mod bedrock;
pub mod client;
pub mod knowledge;
pub mod scripted;
pub mod structured;

pub use client::{ChatMessage, InferenceParams, ModelClient, Role};
pub use knowledge::KnowledgeBase;
pub use structured::Schema;
