//! Test-only fakes and fixtures for driving the loop without real agents.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::error::LoopError;
use crate::git::CommitLog;
use crate::observer::{LoopEvent, LoopObserver};
use crate::plan::PlanProgress;
use crate::session::{AgentSession, ToolEvent, TurnOutcome, TurnRequest};

/// Write `contents` as the workdir's `plan.md`.
pub fn write_plan(workdir: &Path, contents: &str) {
    fs::write(workdir.join("plan.md"), contents).expect("write plan");
}

/// One scripted agent turn.
pub struct ScriptedTurn {
    /// Events replayed to the sink, in order.
    pub events: Vec<ToolEvent>,
    /// Plan contents written before the turn completes, simulating the
    /// agent editing the plan.
    pub plan_update: Option<String>,
    /// Extra behavior after the events, e.g. flipping a signal.
    pub side_effect: Option<Box<dyn FnOnce() + Send>>,
    pub result: ScriptedResult,
}

/// How a scripted turn ends.
pub enum ScriptedResult {
    Finished,
    Cancelled,
    Fail(String),
}

impl ScriptedTurn {
    /// A successful turn that rewrites the plan file.
    pub fn updating_plan(plan: &str) -> Self {
        Self {
            events: vec![ToolEvent::Text {
                text: "working".to_string(),
            }],
            plan_update: Some(plan.to_string()),
            side_effect: None,
            result: ScriptedResult::Finished,
        }
    }

    /// A successful turn that leaves the plan alone.
    pub fn no_change() -> Self {
        Self {
            events: Vec::new(),
            plan_update: None,
            side_effect: None,
            result: ScriptedResult::Finished,
        }
    }

    /// A turn interrupted by cancellation.
    pub fn cancelled() -> Self {
        Self {
            events: Vec::new(),
            plan_update: None,
            side_effect: None,
            result: ScriptedResult::Cancelled,
        }
    }

    /// A turn that fails with the given message.
    pub fn failing(message: &str) -> Self {
        Self {
            events: Vec::new(),
            plan_update: None,
            side_effect: None,
            result: ScriptedResult::Fail(message.to_string()),
        }
    }

    pub fn with_events(mut self, events: Vec<ToolEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn with_side_effect(mut self, effect: impl FnOnce() + Send + 'static) -> Self {
        self.side_effect = Some(Box::new(effect));
        self
    }
}

/// Session that replays scripted turns without spawning processes.
pub struct ScriptedSession {
    workdir: PathBuf,
    plan_file: String,
    turns: VecDeque<ScriptedTurn>,
    shutdowns: Arc<AtomicU32>,
}

impl ScriptedSession {
    pub fn new(workdir: impl Into<PathBuf>, plan_file: &str, turns: Vec<ScriptedTurn>) -> Self {
        Self {
            workdir: workdir.into(),
            plan_file: plan_file.to_string(),
            turns: turns.into(),
            shutdowns: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Shared counter of `shutdown` calls, observable after the session
    /// moves into a controller.
    pub fn shutdown_count(&self) -> Arc<AtomicU32> {
        self.shutdowns.clone()
    }
}

impl AgentSession for ScriptedSession {
    fn submit(
        &mut self,
        _request: &TurnRequest,
        sink: &mut dyn FnMut(ToolEvent),
    ) -> Result<TurnOutcome> {
        let turn = self
            .turns
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted turns left"))?;
        for event in turn.events {
            sink(event);
        }
        if let Some(plan) = turn.plan_update {
            fs::write(self.workdir.join(&self.plan_file), plan).context("write scripted plan")?;
        }
        if let Some(effect) = turn.side_effect {
            effect();
        }
        match turn.result {
            ScriptedResult::Finished => Ok(TurnOutcome::Finished),
            ScriptedResult::Cancelled => Ok(TurnOutcome::Cancelled),
            ScriptedResult::Fail(message) => Err(LoopError::AgentSession(message).into()),
        }
    }

    fn shutdown(&mut self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Commit log replaying fixed cumulative counts; the last count repeats.
pub struct FakeCommitLog {
    head: String,
    counts: Mutex<VecDeque<u64>>,
    last: Mutex<u64>,
}

impl FakeCommitLog {
    pub fn with_counts(head: &str, counts: Vec<u64>) -> Self {
        Self {
            head: head.to_string(),
            counts: Mutex::new(counts.into()),
            last: Mutex::new(0),
        }
    }
}

impl CommitLog for FakeCommitLog {
    fn head_hash(&self) -> Result<String> {
        Ok(self.head.clone())
    }

    fn commits_since(&self, _reference: &str) -> Result<u64> {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = counts.pop_front() {
            *last = next;
        }
        Ok(*last)
    }
}

/// Observer that records every notification for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    pub events: Vec<LoopEvent>,
}

impl RecordingObserver {
    pub fn started_iterations(&self) -> Vec<u32> {
        self.events
            .iter()
            .filter_map(|e| match e {
                LoopEvent::IterationStarted { iteration } => Some(*iteration),
                _ => None,
            })
            .collect()
    }

    /// Cumulative commit counts as reported at each iteration completion.
    pub fn iteration_commits(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|e| match e {
                LoopEvent::IterationCompleted { commits, .. } => Some(*commits),
                _ => None,
            })
            .collect()
    }

    pub fn last_progress(&self) -> Option<PlanProgress> {
        self.events
            .iter()
            .rev()
            .find_map(|e| match e {
                LoopEvent::TasksUpdated(progress) => Some(*progress),
                _ => None,
            })
    }

    pub fn saw_completed(&self) -> bool {
        self.events.iter().any(|e| matches!(e, LoopEvent::Completed))
    }

    pub fn saw_paused(&self) -> bool {
        self.events.iter().any(|e| matches!(e, LoopEvent::Paused))
    }

    pub fn saw_resumed(&self) -> bool {
        self.events.iter().any(|e| matches!(e, LoopEvent::Resumed))
    }

    pub fn error_message(&self) -> Option<&str> {
        self.events.iter().find_map(|e| match e {
            LoopEvent::Errored { message } => Some(message.as_str()),
            _ => None,
        })
    }
}

impl LoopObserver for RecordingObserver {
    fn iteration_started(&mut self, iteration: u32) {
        self.events.push(LoopEvent::IterationStarted { iteration });
    }

    fn tool_event(&mut self, event: &ToolEvent) {
        self.events.push(LoopEvent::Tool(event.clone()));
    }

    fn iteration_completed(&mut self, iteration: u32, duration: Duration, commits: u64) {
        self.events.push(LoopEvent::IterationCompleted {
            iteration,
            duration,
            commits,
        });
    }

    fn tasks_updated(&mut self, progress: PlanProgress) {
        self.events.push(LoopEvent::TasksUpdated(progress));
    }

    fn commits_updated(&mut self, commits: u64) {
        self.events.push(LoopEvent::CommitsUpdated { commits });
    }

    fn paused(&mut self) {
        self.events.push(LoopEvent::Paused);
    }

    fn resumed(&mut self) {
        self.events.push(LoopEvent::Resumed);
    }

    fn completed(&mut self) {
        self.events.push(LoopEvent::Completed);
    }

    fn errored(&mut self, message: &str) {
        self.events.push(LoopEvent::Errored {
            message: message.to_string(),
        });
    }
}

/// Temp directory with a real git repository and an initial commit.
pub struct TestRepo {
    temp: tempfile::TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("tempdir")?;
        let root = temp.path();

        run_git(root, &["init"])?;
        run_git(root, &["config", "user.email", "test@example.com"])?;
        run_git(root, &["config", "user.name", "test"])?;

        fs::write(root.join("README.md"), "hi\n").context("write README")?;
        run_git(root, &["add", "README.md"])?;
        run_git(root, &["commit", "-m", "chore: init"])?;

        Ok(Self { temp })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Write (or overwrite) a file and commit it.
    pub fn commit_file(&self, name: &str, contents: &str, message: &str) -> Result<()> {
        commit_file(self.root(), name, contents, message)
    }
}

/// Write (or overwrite) a file under `root` and commit it.
pub fn commit_file(root: &Path, name: &str, contents: &str, message: &str) -> Result<()> {
    fs::write(root.join(name), contents).with_context(|| format!("write {name}"))?;
    run_git(root, &["add", "-A"])?;
    run_git(root, &["commit", "-m", message])?;
    Ok(())
}

fn run_git(root: &Path, args: &[&str]) -> Result<()> {
    let status = Command::new("git")
        .args(args)
        .current_dir(root)
        .status()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !status.success() {
        return Err(anyhow!("git {} failed", args.join(" ")));
    }
    Ok(())
}
