//! Resumable agent-loop controller for plan-driven coding sessions.
//!
//! planloop repeatedly hands a plan checklist to an external coding agent,
//! one work unit at a time, measuring progress by commit deltas and task
//! counts and persisting enough state to resume after interruption. The
//! architecture keeps a strict separation:
//!
//! - **[`controller`]**: the iteration state machine (the core). Owns
//!   sequencing, pause/resume/abort, measurement, and persistence order.
//! - **Leaf collaborators**: [`plan`] (checkbox scanning), [`git`] (commit
//!   delta queries), [`state`] (durable resume record), [`prompt`]
//!   (instruction rendering).
//! - **Execution**: [`session`] and [`process`] run the external agent and
//!   stream its events.
//! - **Surfaces**: [`observer`] and [`control`] connect operator frontends
//!   (the headless CLI here, the terminal UI in `planloop-tui`).

pub mod config;
pub mod control;
pub mod controller;
pub mod error;
pub mod exit_codes;
pub mod git;
pub mod logging;
pub mod observer;
pub mod options;
pub mod plan;
pub mod process;
pub mod prompt;
pub mod session;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
