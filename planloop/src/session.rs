//! Agent session abstraction and the process-backed implementation.
//!
//! The [`AgentSession`] trait decouples the loop controller from the
//! actual agent backend. Tests use scripted sessions that replay
//! predetermined events without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::LoopConfig;
use crate::control::LoopSignal;
use crate::error::LoopError;
use crate::process::run_streaming;

/// One observable action taken by the agent during an iteration.
///
/// Produced by the session, forwarded verbatim to observers, and never
/// stored beyond the current iteration unless an observer retains it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolEvent {
    /// The agent invoked a tool.
    Tool {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// A chunk of agent output text.
    Text { text: String },
    /// The agent declared the work unit finished.
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
    },
}

/// Parameters for one unit of agent work.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    /// Model identifier (`provider/model`) passed through to the agent.
    pub model: String,
    /// Full instruction text for this iteration.
    pub prompt: String,
    /// Hard wall-clock budget for the work unit.
    pub timeout: Duration,
}

/// How one work unit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The agent ran to completion.
    Finished,
    /// The run was interrupted by the cancellation signal.
    Cancelled,
}

/// Abstraction over agent execution backends.
pub trait AgentSession {
    /// Run one unit of work, forwarding each event to `sink` in emission
    /// order. Returns once the agent completes or the run is cancelled.
    fn submit(
        &mut self,
        request: &TurnRequest,
        sink: &mut dyn FnMut(ToolEvent),
    ) -> Result<TurnOutcome>;

    /// Terminate the session. Safe to call more than once.
    fn shutdown(&mut self);
}

/// Session that spawns the configured agent CLI per work unit.
///
/// The agent command receives `--model <provider/model>` and the prompt on
/// stdin, and is expected to emit JSON events one per stdout line; lines
/// that are not recognizable events are forwarded as plain text output.
pub struct ProcessSession {
    workdir: PathBuf,
    command: Vec<String>,
    output_limit_bytes: usize,
    signal: LoopSignal,
    active: bool,
}

impl ProcessSession {
    /// Establish a session for `workdir` with the configured agent command.
    pub fn start(
        workdir: impl Into<PathBuf>,
        config: &LoopConfig,
        signal: LoopSignal,
    ) -> Result<Self> {
        let command = config.agent.command.clone();
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(LoopError::AgentSession(
                "agent command is empty (set agent.command in .planloop/config.toml)".to_string(),
            )
            .into());
        }
        info!(command = %command.join(" "), "agent session established");
        Ok(Self {
            workdir: workdir.into(),
            command,
            output_limit_bytes: config.agent_output_limit_bytes,
            signal,
            active: true,
        })
    }
}

impl AgentSession for ProcessSession {
    #[instrument(skip_all, fields(model = %request.model, timeout_secs = request.timeout.as_secs()))]
    fn submit(
        &mut self,
        request: &TurnRequest,
        sink: &mut dyn FnMut(ToolEvent),
    ) -> Result<TurnOutcome> {
        if !self.active {
            return Err(
                LoopError::AgentSession("session already terminated".to_string()).into(),
            );
        }

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .arg("--model")
            .arg(&request.model)
            .current_dir(&self.workdir);

        let output = run_streaming(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            self.output_limit_bytes,
            &self.signal,
            |line| {
                if let Some(event) = parse_event_line(line) {
                    sink(event);
                }
            },
        )
        .map_err(|err| LoopError::AgentSession(format!("{err:#}")))
        .context("run agent command")?;

        if output.cancelled {
            return Ok(TurnOutcome::Cancelled);
        }
        if output.timed_out {
            warn!("agent work unit timed out");
            return Err(LoopError::AgentSession(format!(
                "agent timed out after {}s",
                request.timeout.as_secs()
            ))
            .into());
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(exit_code = ?output.status.code(), "agent exited with failure");
            return Err(LoopError::AgentSession(format!(
                "agent exited with status {:?}: {}",
                output.status.code(),
                stderr.trim()
            ))
            .into());
        }

        debug!("agent work unit finished");
        Ok(TurnOutcome::Finished)
    }

    fn shutdown(&mut self) {
        if self.active {
            debug!("agent session closed");
            self.active = false;
        }
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Parse one stdout line into a tool event.
///
/// Unknown JSON shapes and plain text both degrade to [`ToolEvent::Text`],
/// so an agent with a different event vocabulary still yields a readable
/// stream. Blank lines yield nothing.
fn parse_event_line(line: &str) -> Option<ToolEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with('{')
        && let Ok(event) = serde_json::from_str::<ToolEvent>(trimmed)
    {
        return Some(event);
    }
    Some(ToolEvent::Text {
        text: trimmed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentConfig;

    #[test]
    fn parses_tool_event_line() {
        let event = parse_event_line(r#"{"type":"tool","name":"edit","detail":"src/lib.rs"}"#)
            .expect("event");
        assert_eq!(
            event,
            ToolEvent::Tool {
                name: "edit".to_string(),
                detail: Some("src/lib.rs".to_string()),
            }
        );
    }

    #[test]
    fn parses_done_event_without_summary() {
        let event = parse_event_line(r#"{"type":"done"}"#).expect("event");
        assert_eq!(event, ToolEvent::Done { summary: None });
    }

    #[test]
    fn plain_text_becomes_text_event() {
        let event = parse_event_line("compiling planloop v0.1.0").expect("event");
        assert_eq!(
            event,
            ToolEvent::Text {
                text: "compiling planloop v0.1.0".to_string()
            }
        );
    }

    #[test]
    fn unknown_json_degrades_to_text() {
        let event = parse_event_line(r#"{"kind":"mystery"}"#).expect("event");
        assert!(matches!(event, ToolEvent::Text { .. }));
    }

    #[test]
    fn blank_lines_yield_nothing() {
        assert!(parse_event_line("").is_none());
        assert!(parse_event_line("   ").is_none());
    }

    fn sh_config(script: &str) -> LoopConfig {
        LoopConfig {
            agent: AgentConfig {
                command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            },
            ..LoopConfig::default()
        }
    }

    fn request() -> TurnRequest {
        TurnRequest {
            model: "anthropic/claude-opus-4".to_string(),
            prompt: "do the thing".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Events stream from the agent's stdout in order; the extra `--model`
    /// argument lands after the script and is ignored by `sh -c`.
    #[test]
    fn submit_forwards_events_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = sh_config(
            "cat > /dev/null; printf '{\"type\":\"text\",\"text\":\"working\"}\\n{\"type\":\"done\"}\\n'",
        );
        let mut session =
            ProcessSession::start(temp.path(), &config, LoopSignal::new()).expect("start");

        let mut events = Vec::new();
        let outcome = session
            .submit(&request(), &mut |event| events.push(event))
            .expect("submit");

        assert_eq!(outcome, TurnOutcome::Finished);
        assert_eq!(
            events,
            vec![
                ToolEvent::Text {
                    text: "working".to_string()
                },
                ToolEvent::Done { summary: None },
            ]
        );
    }

    #[test]
    fn submit_fails_on_nonzero_exit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = sh_config("cat > /dev/null; echo 'broken pipe' >&2; exit 2");
        let mut session =
            ProcessSession::start(temp.path(), &config, LoopSignal::new()).expect("start");

        let err = session
            .submit(&request(), &mut |_| {})
            .expect_err("must fail");
        let category = err.downcast_ref::<LoopError>().expect("category");
        assert!(matches!(category, LoopError::AgentSession(_)));
        assert!(err.to_string().contains("broken pipe") || format!("{err:#}").contains("broken pipe"));
    }

    #[test]
    fn submit_reports_cancellation() {
        let temp = tempfile::tempdir().expect("tempdir");
        let signal = LoopSignal::new();
        signal.abort();
        let config = sh_config("sleep 5");
        let mut session = ProcessSession::start(temp.path(), &config, signal).expect("start");

        let outcome = session.submit(&request(), &mut |_| {}).expect("submit");
        assert_eq!(outcome, TurnOutcome::Cancelled);
    }

    #[test]
    fn shutdown_is_idempotent_and_blocks_submit() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = sh_config("true");
        let mut session =
            ProcessSession::start(temp.path(), &config, LoopSignal::new()).expect("start");

        session.shutdown();
        session.shutdown();
        assert!(session.submit(&request(), &mut |_| {}).is_err());
    }

    #[test]
    fn start_rejects_empty_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = LoopConfig {
            agent: AgentConfig {
                command: Vec::new(),
            },
            ..LoopConfig::default()
        };
        let err =
            ProcessSession::start(temp.path(), &config, LoopSignal::new()).expect_err("must fail");
        let category = err.downcast_ref::<LoopError>().expect("category");
        assert!(matches!(category, LoopError::AgentSession(_)));
    }
}
