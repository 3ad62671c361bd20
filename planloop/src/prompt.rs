//! Instruction text sent to the agent each iteration.

use crate::options::LoopOptions;

/// Built-in iteration instructions: read the plan, pick one task, verify,
/// commit, update the plan, and create the done marker when finished.
const DEFAULT_TEMPLATE: &str = include_str!("prompts/iteration.md");

/// Placeholder token substituted with the plan file path.
const PLAN_PLACEHOLDER: &str = "{plan}";

/// Render the effective prompt for one iteration.
///
/// Uses the configured template when present, otherwise the built-in
/// default, and replaces every `{plan}` occurrence with the plan file
/// path. Pure; no I/O.
pub fn build_prompt(options: &LoopOptions) -> String {
    let template = options.prompt.as_deref().unwrap_or(DEFAULT_TEMPLATE);
    template.replace(PLAN_PLACEHOLDER, &options.plan_file)
}
