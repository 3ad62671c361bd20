//! Plan document scanning for checkbox task markers.
//!
//! The plan is an operator-supplied checklist; task lines carry markdown
//! checkboxes (`- [ ]` open, `- [x]` done). Everything else in the document
//! is ignored. Read-only; the agent is the only writer.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

// Done markers are case-insensitive (`- [x]` and `- [X]`); open markers
// must match exactly.
static DONE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)- \[x\]").expect("done marker pattern should be valid"));
static OPEN_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"- \[ \]").expect("open marker pattern should be valid"));
static TASK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*- \[(x|X| )\]\s*(.*)$").expect("task line pattern should be valid")
});

/// Completed/total task counts for a plan document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlanProgress {
    pub done: usize,
    pub total: usize,
}

impl PlanProgress {
    /// True once at least one task exists and every task is checked.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }
}

/// One task line from the plan, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanTask {
    pub done: bool,
    pub title: String,
}

/// Count completed and total tasks in the plan at `path`.
///
/// An absent plan is "no tasks", not an error.
pub fn plan_progress(path: &Path) -> Result<PlanProgress> {
    if !path.exists() {
        return Ok(PlanProgress::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    Ok(progress_of(&contents))
}

/// List the plan's task lines in order, for display.
pub fn plan_tasks(path: &Path) -> Result<Vec<PlanTask>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    Ok(tasks_of(&contents))
}

fn progress_of(contents: &str) -> PlanProgress {
    let done = DONE_MARKER.find_iter(contents).count();
    let open = OPEN_MARKER.find_iter(contents).count();
    PlanProgress {
        done,
        total: done + open,
    }
}

fn tasks_of(contents: &str) -> Vec<PlanTask> {
    contents
        .lines()
        .filter_map(|line| {
            let caps = TASK_LINE.captures(line)?;
            Some(PlanTask {
                done: caps
                    .get(1)
                    .is_some_and(|m| m.as_str().eq_ignore_ascii_case("x")),
                title: caps.get(2).map_or(String::new(), |m| m.as_str().to_string()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "\
# Rollout plan

- [x] Wire up config loading
- [X] Add state persistence
- [ ] Drive the agent session
- [ ] Forward tool events
- [ ] Ship the TUI

Notes: the dash below is not a task.
- plain list item
";

    #[test]
    fn counts_done_and_open_markers() {
        let progress = progress_of(PLAN);
        assert_eq!(
            progress,
            PlanProgress {
                done: 2,
                total: 5
            }
        );
        assert!(!progress.is_complete());
    }

    #[test]
    fn missing_plan_is_empty_not_an_error() {
        let progress = plan_progress(Path::new("does/not/exist.md")).expect("progress");
        assert_eq!(progress, PlanProgress::default());
        assert!(plan_tasks(Path::new("does/not/exist.md"))
            .expect("tasks")
            .is_empty());
    }

    #[test]
    fn all_checked_is_complete() {
        let progress = progress_of("- [x] a\n- [X] b\n");
        assert!(progress.is_complete());
    }

    #[test]
    fn empty_plan_is_not_complete() {
        assert!(!progress_of("").is_complete());
    }

    #[test]
    fn tasks_preserve_order_and_titles() {
        let tasks = tasks_of(PLAN);
        assert_eq!(tasks.len(), 5);
        assert!(tasks[0].done);
        assert_eq!(tasks[0].title, "Wire up config loading");
        assert!(tasks[1].done, "uppercase X counts as done");
        assert!(!tasks[2].done);
        assert_eq!(tasks[4].title, "Ship the TUI");
    }

    #[test]
    fn non_task_lines_are_ignored() {
        let tasks = tasks_of("# title\n- plain item\ntext - [x] inline does not match\n");
        assert!(tasks.is_empty());
    }

    #[test]
    fn indented_tasks_match() {
        let tasks = tasks_of("  - [ ] nested task\n");
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "nested task");
    }
}
