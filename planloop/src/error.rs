//! Typed failure categories for the loop core.
//!
//! Most functions return `anyhow::Result`; these categories are attached at
//! the point of failure so callers that care (exit-code mapping, the
//! controller's terminal-state logic) can recover them with
//! `err.downcast_ref::<LoopError>()`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoopError {
    /// Invalid option or configuration value. Fatal at startup, never
    /// retried.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A version-control query could not be executed at all.
    #[error("version control unavailable: {0}")]
    VcsUnavailable(String),

    /// The state file exists but does not parse as persisted loop state.
    /// Distinct from an absent file, which is not an error.
    #[error("corrupt state file {path}: {reason}")]
    CorruptState { path: PathBuf, reason: String },

    /// The agent session could not be established, or a work unit failed.
    #[error("agent session failed: {0}")]
    AgentSession(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = LoopError::Config("missing model".to_string());
        assert_eq!(err.to_string(), "invalid configuration: missing model");
    }

    #[test]
    fn corrupt_state_names_path_and_reason() {
        let err = LoopError::CorruptState {
            path: PathBuf::from(".planloop/state.json"),
            reason: "expected value at line 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains(".planloop/state.json"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn categories_survive_anyhow_roundtrip() {
        let err: anyhow::Error = LoopError::AgentSession("boom".to_string()).into();
        let category = err.downcast_ref::<LoopError>().expect("category");
        assert!(matches!(category, LoopError::AgentSession(_)));
    }
}
