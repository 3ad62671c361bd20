//! Git adapter for loop progress queries.
//!
//! The loop measures progress by commit deltas against a baseline
//! reference, so we keep a small, explicit wrapper around `git` subprocess
//! calls. Version-control semantics stay in git itself; only textual
//! output is parsed here.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::error::LoopError;

/// Read-only queries the loop controller needs from version control.
///
/// Implemented by [`Git`]; tests substitute fakes so no external commands
/// run.
pub trait CommitLog {
    /// Current HEAD commit hash.
    fn head_hash(&self) -> Result<String>;

    /// Number of commits reachable from HEAD but not from `reference`.
    ///
    /// A failed or non-numeric query degrades to `0`, so callers cannot
    /// distinguish "no new commits" from "query failed" here.
    fn commits_since(&self, reference: &str) -> Result<u64>;
}

/// Lines added/removed relative to a baseline commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStat {
    pub added: u64,
    pub removed: u64,
}

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Lines added/removed between `reference` and the working tree.
    ///
    /// Display-only; failures degrade to zeros.
    #[instrument(skip_all)]
    pub fn diff_stat_since(&self, reference: &str) -> DiffStat {
        let out = match self.run(&["diff", "--numstat", reference]) {
            Ok(out) if out.status.success() => out,
            _ => {
                warn!(reference, "diff query failed");
                return DiffStat::default();
            }
        };
        parse_numstat(&String::from_utf8_lossy(&out.stdout))
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl CommitLog for Git {
    #[instrument(skip_all)]
    fn head_hash(&self) -> Result<String> {
        let out = self
            .run(&["rev-parse", "HEAD"])
            .map_err(|err| LoopError::VcsUnavailable(format!("{err:#}")))?;
        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(LoopError::VcsUnavailable(format!(
                "git rev-parse HEAD failed: {}",
                stderr.trim()
            ))
            .into());
        }
        let hash = String::from_utf8_lossy(&out.stdout).trim().to_string();
        debug!(hash = %hash, "captured head reference");
        Ok(hash)
    }

    #[instrument(skip_all, fields(reference))]
    fn commits_since(&self, reference: &str) -> Result<u64> {
        let range = format!("{reference}..HEAD");
        let out = self
            .run(&["rev-list", "--count", &range])
            .map_err(|err| LoopError::VcsUnavailable(format!("{err:#}")))?;
        let raw = String::from_utf8_lossy(&out.stdout);
        match raw.trim().parse::<u64>() {
            Ok(count) => {
                debug!(count, "commits since baseline");
                Ok(count)
            }
            Err(_) => {
                // Bad or unreachable references land here; the warning is
                // the only way to tell this apart from zero progress.
                warn!(reference, output = %raw.trim(), "unparsable commit count, reporting 0");
                Ok(0)
            }
        }
    }
}

fn parse_numstat(raw: &str) -> DiffStat {
    let mut stat = DiffStat::default();
    for line in raw.lines() {
        let mut cols = line.split_whitespace();
        let (Some(added), Some(removed)) = (cols.next(), cols.next()) else {
            continue;
        };
        // Binary files report "-" in both columns; skip them.
        if let (Ok(added), Ok(removed)) = (added.parse::<u64>(), removed.parse::<u64>()) {
            stat.added += added;
            stat.removed += removed;
        }
    }
    stat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;

    #[test]
    fn parses_numstat_totals() {
        let stat = parse_numstat("3\t1\tsrc/lib.rs\n10\t0\tsrc/new.rs\n");
        assert_eq!(
            stat,
            DiffStat {
                added: 13,
                removed: 1
            }
        );
    }

    #[test]
    fn numstat_skips_binary_entries() {
        let stat = parse_numstat("-\t-\tassets/logo.png\n2\t2\tREADME.md\n");
        assert_eq!(stat, DiffStat { added: 2, removed: 2 });
    }

    #[test]
    fn head_hash_is_full_hex() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());

        let hash = git.head_hash().expect("head");
        assert_eq!(hash.len(), 40);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn head_hash_fails_outside_a_repository() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path());

        let err = git.head_hash().expect_err("must fail");
        let category = err.downcast_ref::<LoopError>().expect("category");
        assert!(matches!(category, LoopError::VcsUnavailable(_)));
    }

    /// Counts accumulate from the baseline reference across iterations and
    /// repeated queries are stable.
    #[test]
    fn commits_since_is_cumulative_and_idempotent() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());
        let baseline = git.head_hash().expect("baseline");

        assert_eq!(git.commits_since(&baseline).expect("count"), 0);

        repo.commit_file("a.txt", "a\n", "feat: first").expect("commit");
        repo.commit_file("b.txt", "b\n", "feat: second").expect("commit");
        assert_eq!(git.commits_since(&baseline).expect("count"), 2);
        assert_eq!(git.commits_since(&baseline).expect("count"), 2);

        repo.commit_file("c.txt", "c\n", "feat: third").expect("commit");
        assert_eq!(git.commits_since(&baseline).expect("count"), 3);
    }

    /// An invalid reference degrades to 0 rather than erroring.
    #[test]
    fn bogus_reference_reports_zero() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());

        assert_eq!(git.commits_since("not-a-ref").expect("count"), 0);
    }

    #[test]
    fn diff_stat_counts_lines_since_reference() {
        let repo = TestRepo::new().expect("repo");
        let git = Git::new(repo.root());
        let baseline = git.head_hash().expect("baseline");

        repo.commit_file("notes.txt", "one\ntwo\nthree\n", "docs: notes")
            .expect("commit");
        let stat = git.diff_stat_since(&baseline);
        assert_eq!(stat.added, 3);
        assert_eq!(stat.removed, 0);
    }
}
