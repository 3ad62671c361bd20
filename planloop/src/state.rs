//! Durable loop state enabling resume after interruption.
//!
//! One state file per working directory (`.planloop/state.json`). The loop
//! controller is its only writer and every write replaces the whole
//! document; the file is deleted only by operator action (`planloop
//! reset`), never by the controller.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LoopError;
use crate::git::CommitLog;

/// Directory holding loop bookkeeping, relative to the working directory.
pub const STATE_DIR: &str = ".planloop";
/// State file name inside [`STATE_DIR`].
pub const STATE_FILE: &str = "state.json";
/// Marker file the agent creates once every plan task is finished.
pub const DONE_MARKER: &str = ".planloop-done";

pub fn state_path(workdir: &Path) -> PathBuf {
    workdir.join(STATE_DIR).join(STATE_FILE)
}

pub fn done_marker_path(workdir: &Path) -> PathBuf {
    workdir.join(DONE_MARKER)
}

/// Persisted bookkeeping for the loop.
///
/// `start_time` and `initial_commit_hash` are fixed at first start; the
/// duration list grows by exactly one entry per completed iteration, in
/// iteration order. Field names are camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    /// Wall-clock start of the first run, in ms since the epoch.
    pub start_time: u64,
    /// HEAD commit hash captured when the loop first started; baseline for
    /// cumulative commit counting.
    pub initial_commit_hash: String,
    /// Per-iteration durations in ms. Append-only.
    pub iteration_times: Vec<u64>,
    /// Plan file path in effect when this state was created.
    pub plan_file: String,
}

/// Load persisted state, or `None` when no state file exists.
///
/// Absence is not an error; a file that exists but does not parse is
/// [`LoopError::CorruptState`] — silently discarding it would erase
/// resumability without operator consent.
pub fn load_state(path: &Path) -> Result<Option<PersistedState>> {
    if !path.exists() {
        debug!(path = %path.display(), "no state file");
        return Ok(None);
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let state: PersistedState =
        serde_json::from_str(&contents).map_err(|err| LoopError::CorruptState {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;
    debug!(iterations = state.iteration_times.len(), "state loaded");
    Ok(Some(state))
}

/// Atomically replace the state file with `state` (temp file + rename).
///
/// Always writes a complete document; there is no patch-in-place path, so
/// readers never see mixed old/new fields.
pub fn save_state(path: &Path, state: &PersistedState) -> Result<()> {
    debug!(path = %path.display(), iterations = state.iteration_times.len(), "writing state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Load existing state, or initialize and persist a fresh one.
///
/// First start captures the current HEAD as the baseline commit reference.
pub fn load_or_init_state(
    workdir: &Path,
    plan_file: &str,
    commits: &dyn CommitLog,
) -> Result<PersistedState> {
    let path = state_path(workdir);
    if let Some(state) = load_state(&path)? {
        return Ok(state);
    }
    let state = PersistedState {
        start_time: now_ms(),
        initial_commit_hash: commits.head_hash()?,
        iteration_times: Vec::new(),
        plan_file: plan_file.to_string(),
    };
    save_state(&path, &state)?;
    Ok(state)
}

/// Current wall-clock time in ms since the epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PersistedState {
        PersistedState {
            start_time: 1_704_067_200_000,
            initial_commit_hash: "abc123def456789012345678901234567890abcd".to_string(),
            iteration_times: vec![60_000, 120_000, 90_000],
            plan_file: "plan.md".to_string(),
        }
    }

    /// Verifies save → load preserves all fields.
    #[test]
    fn state_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");

        let state = sample();
        save_state(&path, &state).expect("save");
        let loaded = load_state(&path).expect("load").expect("present");
        assert_eq!(loaded, state);
    }

    #[test]
    fn load_missing_returns_none_without_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let loaded = load_state(&temp.path().join("state.json")).expect("load");
        assert!(loaded.is_none());
    }

    #[test]
    fn load_invalid_is_corrupt_state() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        fs::write(&path, "{\"startTime\": \"not a number\"").expect("write");

        let err = load_state(&path).expect_err("must fail");
        let category = err.downcast_ref::<LoopError>().expect("category");
        assert!(matches!(category, LoopError::CorruptState { .. }));
    }

    /// The wire format uses the agreed camelCase field names, nothing else.
    #[test]
    fn wire_format_is_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");
        save_state(&path, &sample()).expect("save");

        let contents = fs::read_to_string(&path).expect("read");
        for field in [
            "\"startTime\"",
            "\"initialCommitHash\"",
            "\"iterationTimes\"",
            "\"planFile\"",
        ] {
            assert!(contents.contains(field), "missing {field} in {contents}");
        }
        assert!(!contents.contains("start_time"));
    }

    /// A second save fully replaces the first document.
    #[test]
    fn save_overwrites_whole_document() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("state.json");

        save_state(&path, &sample()).expect("save first");
        let second = PersistedState {
            start_time: 1_704_153_600_000,
            initial_commit_hash: "def456789012345678901234567890abcdef1234".to_string(),
            iteration_times: vec![90_000, 120_000, 150_000],
            plan_file: "new-plan.md".to_string(),
        };
        save_state(&path, &second).expect("save second");

        let loaded = load_state(&path).expect("load").expect("present");
        assert_eq!(loaded, second);
        assert_ne!(loaded.plan_file, sample().plan_file);
    }

    #[test]
    fn state_paths_are_stable() {
        let workdir = Path::new("/work");
        assert_eq!(
            state_path(workdir),
            Path::new("/work/.planloop/state.json")
        );
        assert_eq!(done_marker_path(workdir), Path::new("/work/.planloop-done"));
    }
}
