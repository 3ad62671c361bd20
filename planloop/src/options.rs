//! Immutable options supplied when a loop starts.

use anyhow::Result;

use crate::error::LoopError;

/// Options for one loop invocation.
///
/// Validated once at controller construction; invalid values are a
/// configuration error, not a runtime fault.
#[derive(Debug, Clone)]
pub struct LoopOptions {
    /// Path to the plan document, relative to the working directory.
    pub plan_file: String,
    /// Model identifier of the form `provider/model`.
    pub model: String,
    /// Prompt template overriding the built-in default. `{plan}` is
    /// replaced with `plan_file` wherever it appears.
    pub prompt: Option<String>,
    /// Stop before starting an iteration past this absolute count.
    pub max_iterations: Option<u32>,
}

impl LoopOptions {
    pub fn validate(&self) -> Result<()> {
        if self.plan_file.trim().is_empty() {
            return Err(LoopError::Config("plan file path must not be empty".to_string()).into());
        }
        ModelRef::parse(&self.model)?;
        Ok(())
    }
}

/// A model identifier split into its provider and model parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    /// Split a `provider/model` identifier at the first `/`.
    pub fn parse(raw: &str) -> Result<Self> {
        let Some((provider, model)) = raw.split_once('/') else {
            return Err(LoopError::Config(format!(
                "invalid model \"{raw}\": expected \"provider/model\" (e.g. \"anthropic/claude-opus-4\")"
            ))
            .into());
        };
        Ok(Self {
            provider: provider.to_string(),
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> LoopOptions {
        LoopOptions {
            plan_file: "plan.md".to_string(),
            model: "anthropic/claude-opus-4".to_string(),
            prompt: None,
            max_iterations: None,
        }
    }

    #[test]
    fn parses_provider_and_model() {
        let parsed = ModelRef::parse("anthropic/claude-opus-4").expect("parse");
        assert_eq!(parsed.provider, "anthropic");
        assert_eq!(parsed.model, "claude-opus-4");
    }

    /// Splitting happens at the first separator; later slashes belong to
    /// the model name.
    #[test]
    fn splits_at_first_separator() {
        let parsed = ModelRef::parse("openai/gpt-4/preview").expect("parse");
        assert_eq!(parsed.provider, "openai");
        assert_eq!(parsed.model, "gpt-4/preview");
    }

    #[test]
    fn missing_separator_is_config_error() {
        let err = ModelRef::parse("claude-opus-4").expect_err("must fail");
        let category = err.downcast_ref::<LoopError>().expect("category");
        assert!(matches!(category, LoopError::Config(_)));
    }

    #[test]
    fn validate_accepts_good_options() {
        options().validate().expect("valid");
    }

    #[test]
    fn validate_rejects_empty_plan_path() {
        let mut opts = options();
        opts.plan_file = "  ".to_string();
        assert!(opts.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_model() {
        let mut opts = options();
        opts.model = "no-separator".to_string();
        assert!(opts.validate().is_err());
    }
}
