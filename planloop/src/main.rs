//! Headless CLI for the plan-driven agent loop.
//!
//! Presentation glue only: argument parsing, a plain-text observer, and
//! exit-code mapping. The loop semantics live in `planloop::controller`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use planloop::config::{config_path, load_config};
use planloop::control::LoopSignal;
use planloop::controller::{LoopController, LoopStop};
use planloop::error::LoopError;
use planloop::exit_codes;
use planloop::git::Git;
use planloop::observer::LoopObserver;
use planloop::options::LoopOptions;
use planloop::plan::{PlanProgress, plan_progress};
use planloop::session::{ProcessSession, ToolEvent};
use planloop::state::{load_or_init_state, load_state, state_path};

#[derive(Parser)]
#[command(
    name = "planloop",
    version,
    about = "Resumable coding-agent loop driven by a plan checklist"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the loop until the plan completes, a limit is hit, or it fails.
    Run {
        /// Plan document with `- [ ]` / `- [x]` task markers.
        #[arg(long, default_value = "plan.md")]
        plan: String,

        /// Model identifier, `provider/model`.
        #[arg(long, default_value = "anthropic/claude-opus-4")]
        model: String,

        /// File with a prompt template overriding the default (`{plan}` is
        /// replaced with the plan path).
        #[arg(long)]
        prompt_file: Option<PathBuf>,

        /// Stop before starting an iteration past this absolute count.
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Echo agent tool events to stdout.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print persisted loop state and current plan progress.
    Status,
    /// Delete the persisted state file, discarding resume information.
    Reset,
}

fn main() {
    planloop::logging::init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let workdir = std::env::current_dir().context("resolve working directory")?;
    match cli.command {
        Command::Run {
            plan,
            model,
            prompt_file,
            max_iterations,
            verbose,
        } => {
            let prompt = match prompt_file {
                Some(path) => Some(
                    fs::read_to_string(&path)
                        .with_context(|| format!("read prompt template {}", path.display()))?,
                ),
                None => None,
            };
            let options = LoopOptions {
                plan_file: plan,
                model,
                prompt,
                max_iterations,
            };
            cmd_run(&workdir, options, verbose)
        }
        Command::Status => cmd_status(&workdir),
        Command::Reset => cmd_reset(&workdir),
    }
}

fn cmd_run(workdir: &std::path::Path, options: LoopOptions, verbose: bool) -> Result<i32> {
    let config = load_config(&config_path(workdir))?;
    let git = Git::new(workdir);
    let state = load_or_init_state(workdir, &options.plan_file, &git)?;
    let signal = LoopSignal::new();
    let session = ProcessSession::start(workdir, &config, signal.clone())?;

    let mut controller = LoopController::new(
        workdir,
        options,
        state,
        session,
        git,
        signal,
        Duration::from_secs(config.iteration_timeout_secs),
    )?;

    let mut observer = TextObserver { verbose };
    let stop = controller.run(&mut observer)?;
    Ok(match stop {
        LoopStop::Complete => {
            println!("plan complete");
            exit_codes::OK
        }
        LoopStop::IterationLimit {
            next_iteration,
            max_iterations,
        } => {
            println!(
                "stopped at iteration limit ({max_iterations}); next iteration would be {next_iteration}"
            );
            exit_codes::ITERATION_LIMIT
        }
        LoopStop::Aborted => {
            println!("aborted");
            exit_codes::ABORTED
        }
    })
}

fn cmd_status(workdir: &std::path::Path) -> Result<i32> {
    let path = state_path(workdir);
    let Some(state) = load_state(&path)? else {
        println!("no loop state (run `planloop run` to start)");
        return Ok(exit_codes::OK);
    };

    let progress = plan_progress(&workdir.join(&state.plan_file))?;
    let total_ms: u64 = state.iteration_times.iter().sum();
    println!("plan:        {}", state.plan_file);
    println!("tasks:       {}/{}", progress.done, progress.total);
    println!("iterations:  {}", state.iteration_times.len());
    println!("agent time:  {}s", total_ms / 1000);
    println!("baseline:    {}", state.initial_commit_hash);
    Ok(exit_codes::OK)
}

fn cmd_reset(workdir: &std::path::Path) -> Result<i32> {
    let path = state_path(workdir);
    if !path.exists() {
        println!("no state file to remove");
        return Ok(exit_codes::OK);
    }
    // Deleting state is an operator decision; the loop itself never does it.
    let had_corrupt = load_state(&path)
        .err()
        .is_some_and(|err| matches!(err.downcast_ref::<LoopError>(), Some(LoopError::CorruptState { .. })));
    fs::remove_file(&path).with_context(|| format!("remove {}", path.display()))?;
    if had_corrupt {
        println!("removed corrupt state file {}", path.display());
    } else {
        println!("removed {}", path.display());
    }
    Ok(exit_codes::OK)
}

/// Plain-text observer for headless runs.
struct TextObserver {
    verbose: bool,
}

impl LoopObserver for TextObserver {
    fn iteration_started(&mut self, iteration: u32) {
        println!("iteration {iteration} started");
    }

    fn tool_event(&mut self, event: &ToolEvent) {
        if !self.verbose {
            return;
        }
        match event {
            ToolEvent::Tool { name, detail } => match detail {
                Some(detail) => println!("  [tool] {name} {detail}"),
                None => println!("  [tool] {name}"),
            },
            ToolEvent::Text { text } => println!("  {text}"),
            ToolEvent::Done { summary } => match summary {
                Some(summary) => println!("  [done] {summary}"),
                None => println!("  [done]"),
            },
        }
    }

    fn iteration_completed(&mut self, iteration: u32, duration: Duration, commits: u64) {
        println!(
            "iteration {iteration} completed in {}s ({commits} commits since start)",
            duration.as_secs()
        );
    }

    fn tasks_updated(&mut self, progress: PlanProgress) {
        println!("tasks: {}/{}", progress.done, progress.total);
    }

    fn paused(&mut self) {
        println!("paused");
    }

    fn resumed(&mut self) {
        println!("resumed");
    }

    fn errored(&mut self, message: &str) {
        eprintln!("error: {message}");
    }
}
