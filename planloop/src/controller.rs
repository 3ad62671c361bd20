//! The iteration state machine driving resumable agent loops.
//!
//! One controller per working directory. Each iteration invokes the agent
//! for a single unit of work, measures elapsed time and the cumulative
//! commit delta, re-parses the plan, persists state, and reports to
//! observers — until the plan completes, the agent signals done, a limit
//! is hit, or the operator pauses/aborts.
//!
//! Status moves `Starting → Ready → Running ⇄ Paused → Complete`, with
//! `Error` reachable from anywhere and abort observable from any state.
//! Iterations never run concurrently: each depends on the commit and plan
//! state left by the previous one.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::control::LoopSignal;
use crate::git::CommitLog;
use crate::observer::LoopObserver;
use crate::options::LoopOptions;
use crate::plan::plan_progress;
use crate::prompt::build_prompt;
use crate::session::{AgentSession, TurnOutcome, TurnRequest};
use crate::state::{PersistedState, done_marker_path, save_state, state_path};

/// Externally observable controller status. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Starting,
    Ready,
    Running,
    Paused,
    Complete,
    Error,
}

impl LoopStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// Reason why [`LoopController::run`] stopped without erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStop {
    /// Every plan task is checked, or the agent created the done marker.
    Complete,
    /// The configured iteration limit was reached with work remaining.
    /// State stays resumable.
    IterationLimit {
        next_iteration: u32,
        max_iterations: u32,
    },
    /// The operator aborted the loop. The last fully completed iteration's
    /// record stands; an interrupted iteration leaves no duration entry.
    Aborted,
}

/// Drives agent iterations against a plan until done, stopped, or failed.
///
/// Owns the persisted state; every mutation is followed by a
/// whole-document write before observers hear about the iteration.
pub struct LoopController<S: AgentSession, C: CommitLog> {
    workdir: PathBuf,
    options: LoopOptions,
    state: PersistedState,
    session: S,
    commits: C,
    signal: LoopSignal,
    iteration_timeout: Duration,
    status: LoopStatus,
}

impl<S: AgentSession, C: CommitLog> LoopController<S, C> {
    /// Build a controller around loaded (or freshly initialized) state and
    /// an established session. Option validation failures are fatal here,
    /// before any agent work.
    pub fn new(
        workdir: impl Into<PathBuf>,
        options: LoopOptions,
        state: PersistedState,
        session: S,
        commits: C,
        signal: LoopSignal,
        iteration_timeout: Duration,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            workdir: workdir.into(),
            options,
            state,
            session,
            commits,
            signal,
            iteration_timeout,
            status: LoopStatus::Ready,
        })
    }

    pub fn status(&self) -> LoopStatus {
        self.status
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    /// Handle for pausing/resuming/aborting this loop from another thread.
    pub fn signal(&self) -> LoopSignal {
        self.signal.clone()
    }

    /// Run iterations until a terminal condition, reporting to `observer`.
    ///
    /// The agent session is released on every exit path — completion,
    /// error, or abort.
    pub fn run(&mut self, observer: &mut dyn LoopObserver) -> Result<LoopStop> {
        let result = self.run_inner(observer);
        self.session.shutdown();
        match &result {
            Ok(LoopStop::Complete) => {
                self.status = LoopStatus::Complete;
                info!("loop complete");
                observer.completed();
            }
            Ok(LoopStop::IterationLimit { max_iterations, .. }) => {
                self.status = LoopStatus::Ready;
                info!(max_iterations, "loop stopped at iteration limit");
            }
            Ok(LoopStop::Aborted) => {
                self.status = LoopStatus::Ready;
                info!("loop aborted");
            }
            Err(err) => {
                self.status = LoopStatus::Error;
                observer.errored(&format!("{err:#}"));
            }
        }
        result
    }

    fn run_inner(&mut self, observer: &mut dyn LoopObserver) -> Result<LoopStop> {
        let plan_path = self.workdir.join(&self.options.plan_file);
        let state_file = state_path(&self.workdir);
        let prompt = build_prompt(&self.options);

        loop {
            // Boundary checks: operator signals and cheap terminal
            // conditions before any agent work.
            if self.signal.cancelled() {
                info!("abort observed at iteration boundary");
                return Ok(LoopStop::Aborted);
            }
            if self.signal.paused() {
                self.status = LoopStatus::Paused;
                observer.paused();
                self.signal.wait_while_paused();
                if self.signal.cancelled() {
                    return Ok(LoopStop::Aborted);
                }
                observer.resumed();
            }

            let progress = plan_progress(&plan_path)?;
            if progress.is_complete() {
                observer.tasks_updated(progress);
                return Ok(LoopStop::Complete);
            }
            if done_marker_path(&self.workdir).exists() {
                info!("done marker present");
                return Ok(LoopStop::Complete);
            }

            let iteration = self.state.iteration_times.len() as u32 + 1;
            if let Some(max_iterations) = self.options.max_iterations
                && iteration > max_iterations
            {
                return Ok(LoopStop::IterationLimit {
                    next_iteration: iteration,
                    max_iterations,
                });
            }

            self.status = LoopStatus::Running;
            observer.iteration_started(iteration);
            debug!(iteration, "iteration started");
            let started = Instant::now();

            let request = TurnRequest {
                model: self.options.model.clone(),
                prompt: prompt.clone(),
                timeout: self.iteration_timeout,
            };
            let outcome = self
                .session
                .submit(&request, &mut |event| observer.tool_event(&event))
                .with_context(|| format!("iteration {iteration}"))?;
            if outcome == TurnOutcome::Cancelled {
                // The interrupted iteration leaves no duration entry; the
                // last fully completed iteration's record stands.
                info!(iteration, "iteration interrupted by abort");
                return Ok(LoopStop::Aborted);
            }

            let duration = started.elapsed();
            let commits = self.commits.commits_since(&self.state.initial_commit_hash)?;
            self.state.iteration_times.push(duration.as_millis() as u64);
            let progress = plan_progress(&plan_path)?;

            // Persist before the completion notification, so a crash after
            // this point cannot lose an iteration observers already saw
            // recorded.
            save_state(&state_file, &self.state)?;

            observer.iteration_completed(iteration, duration, commits);
            observer.tasks_updated(progress);
            observer.commits_updated(commits);
            info!(
                iteration,
                duration_ms = duration.as_millis() as u64,
                commits,
                done = progress.done,
                total = progress.total,
                "iteration completed"
            );
        }
    }
}
