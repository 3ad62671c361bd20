//! Terminal UI state, fed by loop events.
//!
//! `App` is a plain value: the UI loop applies incoming [`LoopEvent`]s and
//! key presses to it, and the views render from it. Nothing here feeds
//! back into the loop state machine.

use planloop::controller::LoopStatus;
use planloop::git::DiffStat;
use planloop::observer::LoopEvent;
use planloop::plan::{PlanProgress, PlanTask};
use planloop::session::ToolEvent;
use planloop::state::now_ms;

use crate::format::calculate_eta;

/// Cap on retained log lines; older lines scroll away for good.
const LOG_CAPACITY: usize = 1_000;

/// One line in the scrolling event log.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub kind: LogKind,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Info,
    Tool,
    Output,
    Error,
}

pub struct App {
    pub status: LoopStatus,
    pub iteration: u32,
    pub progress: PlanProgress,
    pub tasks: Vec<PlanTask>,
    pub commits: u64,
    pub diff: DiffStat,
    pub iteration_times_ms: Vec<u64>,
    pub log: Vec<LogLine>,
    pub start_time_ms: u64,
    pub show_tasks: bool,
    pub should_quit: bool,
    pub error: Option<String>,
}

impl App {
    pub fn new(start_time_ms: u64, iteration_times_ms: Vec<u64>, tasks: Vec<PlanTask>) -> Self {
        Self {
            status: LoopStatus::Ready,
            iteration: iteration_times_ms.len() as u32,
            progress: PlanProgress::default(),
            tasks,
            commits: 0,
            diff: DiffStat::default(),
            iteration_times_ms,
            log: Vec::new(),
            start_time_ms,
            show_tasks: false,
            should_quit: false,
            error: None,
        }
    }

    /// Apply one loop notification.
    pub fn apply(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::IterationStarted { iteration } => {
                self.status = LoopStatus::Running;
                self.iteration = iteration;
                self.push_log(LogKind::Info, format!("iteration {iteration} started"));
            }
            LoopEvent::Tool(tool_event) => self.apply_tool_event(tool_event),
            LoopEvent::IterationCompleted {
                iteration,
                duration,
                commits,
            } => {
                self.iteration_times_ms.push(duration.as_millis() as u64);
                self.commits = commits;
                self.push_log(
                    LogKind::Info,
                    format!(
                        "iteration {iteration} completed in {}s",
                        duration.as_secs()
                    ),
                );
            }
            LoopEvent::TasksUpdated(progress) => self.progress = progress,
            LoopEvent::CommitsUpdated { commits } => self.commits = commits,
            LoopEvent::Paused => {
                self.status = LoopStatus::Paused;
                self.push_log(LogKind::Info, "paused".to_string());
            }
            LoopEvent::Resumed => {
                self.status = LoopStatus::Running;
                self.push_log(LogKind::Info, "resumed".to_string());
            }
            LoopEvent::Completed => {
                self.status = LoopStatus::Complete;
                self.push_log(LogKind::Info, "plan complete".to_string());
            }
            LoopEvent::Errored { message } => {
                self.status = LoopStatus::Error;
                self.push_log(LogKind::Error, message.clone());
                self.error = Some(message);
            }
        }
    }

    fn apply_tool_event(&mut self, event: ToolEvent) {
        match event {
            ToolEvent::Tool { name, detail } => {
                let text = match detail {
                    Some(detail) => format!("{name} {detail}"),
                    None => name,
                };
                self.push_log(LogKind::Tool, text);
            }
            ToolEvent::Text { text } => self.push_log(LogKind::Output, text),
            ToolEvent::Done { summary } => {
                self.push_log(LogKind::Info, summary.unwrap_or_else(|| "done".to_string()));
            }
        }
    }

    /// Wall-clock time since the loop first started.
    pub fn elapsed_ms(&self) -> u64 {
        now_ms().saturating_sub(self.start_time_ms)
    }

    pub fn eta_ms(&self) -> Option<u64> {
        let remaining = self.progress.total.saturating_sub(self.progress.done);
        calculate_eta(&self.iteration_times_ms, remaining)
    }

    /// Label for the `p` key in the footer.
    pub fn action_label(&self) -> &'static str {
        match self.status {
            LoopStatus::Ready => "start",
            LoopStatus::Paused => "resume",
            _ => "pause",
        }
    }

    fn push_log(&mut self, kind: LogKind, text: String) {
        if self.log.len() >= LOG_CAPACITY {
            self.log.remove(0);
        }
        self.log.push(LogLine { kind, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn app() -> App {
        App::new(0, Vec::new(), Vec::new())
    }

    #[test]
    fn starts_ready() {
        let app = app();
        assert_eq!(app.status, LoopStatus::Ready);
        assert_eq!(app.action_label(), "start");
    }

    #[test]
    fn iteration_events_move_status_and_counters() {
        let mut app = app();
        app.apply(LoopEvent::IterationStarted { iteration: 1 });
        assert_eq!(app.status, LoopStatus::Running);
        assert_eq!(app.action_label(), "pause");

        app.apply(LoopEvent::IterationCompleted {
            iteration: 1,
            duration: Duration::from_secs(90),
            commits: 2,
        });
        assert_eq!(app.iteration_times_ms, vec![90_000]);
        assert_eq!(app.commits, 2);
    }

    #[test]
    fn pause_and_resume_toggle_status() {
        let mut app = app();
        app.apply(LoopEvent::IterationStarted { iteration: 1 });
        app.apply(LoopEvent::Paused);
        assert_eq!(app.status, LoopStatus::Paused);
        assert_eq!(app.action_label(), "resume");

        app.apply(LoopEvent::Resumed);
        assert_eq!(app.status, LoopStatus::Running);
    }

    #[test]
    fn error_event_records_message() {
        let mut app = app();
        app.apply(LoopEvent::Errored {
            message: "agent session failed: boom".to_string(),
        });
        assert_eq!(app.status, LoopStatus::Error);
        assert_eq!(
            app.error.as_deref(),
            Some("agent session failed: boom")
        );
    }

    #[test]
    fn tool_events_land_in_the_log() {
        let mut app = app();
        app.apply(LoopEvent::Tool(ToolEvent::Tool {
            name: "edit".to_string(),
            detail: Some("src/lib.rs".to_string()),
        }));
        app.apply(LoopEvent::Tool(ToolEvent::Text {
            text: "compiling".to_string(),
        }));

        assert_eq!(app.log.len(), 2);
        assert_eq!(app.log[0].kind, LogKind::Tool);
        assert_eq!(app.log[0].text, "edit src/lib.rs");
        assert_eq!(app.log[1].kind, LogKind::Output);
    }

    #[test]
    fn log_is_bounded() {
        let mut app = app();
        for i in 0..1_100 {
            app.apply(LoopEvent::Tool(ToolEvent::Text {
                text: format!("line {i}"),
            }));
        }
        assert_eq!(app.log.len(), 1_000);
        assert_eq!(app.log[0].text, "line 100");
    }

    #[test]
    fn eta_tracks_remaining_tasks() {
        let mut app = App::new(0, vec![60_000], Vec::new());
        app.progress = PlanProgress { done: 1, total: 3 };
        assert_eq!(app.eta_ms(), Some(120_000));

        app.progress = PlanProgress { done: 3, total: 3 };
        assert_eq!(app.eta_ms(), None);
    }
}
