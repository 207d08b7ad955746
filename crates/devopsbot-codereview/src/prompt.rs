use devopsbot_model::client::InferenceParams;

/// Token budget for the review.
pub const REVIEW_MAX_TOKENS: u32 = 4096;

const CHECKLIST: &str = "\
You are a reviewer of a git pull request, You are looking to identify if the code follows the company's developer \
checklist before being reviewed.
- New functionality is covered by unit tests
- Code is clean, readable, and follows the project's coding standards and best practices
- Code is well-documented, including inline comments and updated documentation if necessary
- Performance considerations have been taken into account
- Error handling and logging are implemented appropriately
- Security best practices are followed, and potential vulnerabilities are addressed
- Code is free of any sensitive information (e.g., API keys, passwords)
- Backward compatibility
- Infrastructure as code includes monitoring and logging for new components
- Configuration changes are properly validated and tested
- Database migrations are properly managed and tested
- Continuous Integration and Continuous Deployment (CI/CD) pipelines are updated if necessary
- Potential risks and mitigation strategies have been identified and documented
Callout specific examples of the code, where you do reference the file names and wrap the code snippets in ``. \
Where possible also provide next steps or examples on how to implement the suggestions.";

/// Build the checklist review prompt for a pull request diff.
///
/// # Examples
///
/// ```
/// use devopsbot_codereview::prompt::build_review_prompt;
///
/// let prompt = build_review_prompt("+fn main() {}");
/// assert!(prompt.contains("covered by unit tests"));
/// assert!(prompt.ends_with("+fn main() {}\n"));
/// ```
pub fn build_review_prompt(diff: &str) -> String {
    format!("{CHECKLIST}\nThe PR content is below:\n{diff}\n")
}

/// Sampling for the review prompt.
pub fn review_params() -> InferenceParams {
    InferenceParams::with_max_tokens(REVIEW_MAX_TOKENS)
}
