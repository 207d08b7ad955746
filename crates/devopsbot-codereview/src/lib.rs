//! Pull request review automation.
//!
//! A signed GitHub webhook delivery is verified ([`signature`]), the pull
//! request diff is fetched ([`github`]), reviewed against the developer
//! checklist ([`prompt`]), and the model's feedback is posted back as a
//! comment ([`handler::CodeReview`]).

pub mod github;
pub mod handler;
pub mod prompt;
pub mod signature;
