use devopsbot_model::client::InferenceParams;

/// Token budget for the quality review.
pub const REVIEW_MAX_TOKENS: u32 = 512;

/// Token budget for the subtask split.
pub const SPLIT_MAX_TOKENS: u32 = 2048;

const REVIEW_RUBRIC: &str = "\
You are a reviewer of Jira Tickets, designed to highlight when a ticket is not clear enough for a developer to work on
You will return a result in a JSON format where one attribute key is pass being either true or false. \
It is false if it does not meet the quality bar.
A second optional JSON attribute key will be called comment where you are providing guidance and provide an example \
of how the ticket would meet the pass requirements.
Focus on whether a developer would understand without being pedantic.
Ensure there is a general overview, user story, acceptance criteria, implementation details, testing criteria \
and any additional considerations.";

const SPLIT_RUBRIC: &str = "\
You are a technical project manager for Jira Tickets, who breaks down tickets into subtasks where there may be \
multiple individuals involved or the time expected to complete is longer than 2 hours.
You will return a result in a JSON format with one attribute key being subtasks. This is a list. \
If no subtasks are needed this will be empty.
Each would be an object in the list with a key of title and a key of description. \
Split by logical divisions and provide as much guidance as possible. Make sure the ticket description is high quality.";

const SPLIT_CONSTRAINTS: &str = "\
Only generate subtasks where it is completely necessary. These are tasks completed by software development engineers, \
frontend developers and/or DevOps Engineers. Do not include tasks to do testing (including unit and integration) \
or deployment as this is part of the SDLC.
Investigation and analysis should not have separate subtasks.
Not tasks for analyzing, no tasks for regression testing.
Each task must be able to be deployed separately (increasing deployment frequency). \
Do not make any assumptions, only use the existing knowledge you have.";

const JSON_ONLY: &str = "Only return JSON, no text. JSON should be a single line";

/// Build the quality-review prompt for a task description.
///
/// # Examples
///
/// ```
/// use devopsbot_kanban::prompt::build_review_prompt;
///
/// let prompt = build_review_prompt("As a user I want a health check");
/// assert!(prompt.contains("acceptance criteria"));
/// assert!(prompt.contains("As a user I want a health check"));
/// assert!(prompt.ends_with("single line"));
/// ```
pub fn build_review_prompt(description: &str) -> String {
    format!("{REVIEW_RUBRIC}\nThe task description to review is: {description}\n{JSON_ONLY}")
}

/// Build the subtask-split prompt for a parent task description.
///
/// # Examples
///
/// ```
/// use devopsbot_kanban::prompt::build_split_prompt;
///
/// let prompt = build_split_prompt("Build the billing export");
/// assert!(prompt.contains("subtasks"));
/// assert!(prompt.contains("Build the billing export"));
/// ```
pub fn build_split_prompt(description: &str) -> String {
    format!(
        "{SPLIT_RUBRIC}\nThe parent task description to review is: {description}\n{SPLIT_CONSTRAINTS}\n{JSON_ONLY}"
    )
}

/// Sampling for the review prompt.
pub fn review_params() -> InferenceParams {
    InferenceParams::with_max_tokens(REVIEW_MAX_TOKENS)
}

/// Sampling for the split prompt.
pub fn split_params() -> InferenceParams {
    InferenceParams::with_max_tokens(SPLIT_MAX_TOKENS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_prompt_lists_every_rubric_section() {
        let prompt = build_review_prompt("x");
        for section in [
            "general overview",
            "user story",
            "acceptance criteria",
            "implementation details",
            "testing criteria",
            "additional considerations",
        ] {
            assert!(prompt.contains(section), "missing {section}");
        }
    }

    #[test]
    fn split_prompt_excludes_testing_and_deployment_tasks() {
        let prompt = build_split_prompt("x");
        assert!(prompt.contains("Do not include tasks to do testing"));
        assert!(prompt.contains("deployed separately"));
    }

    #[test]
    fn params_use_expected_budgets() {
        assert_eq!(review_params().max_tokens, 512);
        assert_eq!(split_params().max_tokens, 2048);
        assert_eq!(split_params().temperature, 0.5);
    }
}
