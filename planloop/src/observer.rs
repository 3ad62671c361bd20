//! Observer interface for loop progress and event forwarding.
//!
//! Observers receive a push stream of notifications and must not block the
//! controller; delivery is fire-and-forget and observer failures never
//! reach the loop state machine. The channel-backed implementation below
//! is the usual way a UI subscribes.

use std::sync::mpsc::Sender;
use std::time::Duration;

use crate::plan::PlanProgress;
use crate::session::ToolEvent;

/// Receives loop notifications. All methods default to no-ops so
/// implementations override only what they need.
pub trait LoopObserver {
    /// An iteration is about to invoke the agent.
    fn iteration_started(&mut self, _iteration: u32) {}

    /// One agent event, forwarded in emission order.
    fn tool_event(&mut self, _event: &ToolEvent) {}

    /// An iteration finished; `commits` is cumulative from the initial
    /// reference, not per-iteration. State is already persisted when this
    /// fires.
    fn iteration_completed(&mut self, _iteration: u32, _duration: Duration, _commits: u64) {}

    fn tasks_updated(&mut self, _progress: PlanProgress) {}

    fn commits_updated(&mut self, _commits: u64) {}

    fn paused(&mut self) {}

    fn resumed(&mut self) {}

    fn completed(&mut self) {}

    fn errored(&mut self, _message: &str) {}
}

/// Owned notification, for observers that forward over a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    IterationStarted {
        iteration: u32,
    },
    Tool(ToolEvent),
    IterationCompleted {
        iteration: u32,
        duration: Duration,
        commits: u64,
    },
    TasksUpdated(PlanProgress),
    CommitsUpdated {
        commits: u64,
    },
    Paused,
    Resumed,
    Completed,
    Errored {
        message: String,
    },
}

/// Forwards notifications over an unbounded channel.
///
/// Sends never block and a dropped receiver is ignored, so a stalled or
/// dead consumer cannot stall or corrupt the loop.
impl LoopObserver for Sender<LoopEvent> {
    fn iteration_started(&mut self, iteration: u32) {
        let _ = self.send(LoopEvent::IterationStarted { iteration });
    }

    fn tool_event(&mut self, event: &ToolEvent) {
        let _ = self.send(LoopEvent::Tool(event.clone()));
    }

    fn iteration_completed(&mut self, iteration: u32, duration: Duration, commits: u64) {
        let _ = self.send(LoopEvent::IterationCompleted {
            iteration,
            duration,
            commits,
        });
    }

    fn tasks_updated(&mut self, progress: PlanProgress) {
        let _ = self.send(LoopEvent::TasksUpdated(progress));
    }

    fn commits_updated(&mut self, commits: u64) {
        let _ = self.send(LoopEvent::CommitsUpdated { commits });
    }

    fn paused(&mut self) {
        let _ = self.send(LoopEvent::Paused);
    }

    fn resumed(&mut self) {
        let _ = self.send(LoopEvent::Resumed);
    }

    fn completed(&mut self) {
        let _ = self.send(LoopEvent::Completed);
    }

    fn errored(&mut self, message: &str) {
        let _ = self.send(LoopEvent::Errored {
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn channel_observer_forwards_notifications() {
        let (tx, rx) = mpsc::channel();
        let mut observer: Sender<LoopEvent> = tx;

        observer.iteration_started(1);
        observer.commits_updated(4);
        observer.completed();

        let events: Vec<LoopEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                LoopEvent::IterationStarted { iteration: 1 },
                LoopEvent::CommitsUpdated { commits: 4 },
                LoopEvent::Completed,
            ]
        );
    }

    /// A dropped receiver must not turn sends into failures.
    #[test]
    fn dead_receiver_is_ignored() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut observer: Sender<LoopEvent> = tx;

        observer.iteration_started(1);
        observer.errored("boom");
    }
}
