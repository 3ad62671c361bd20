//! Terminal UI for the plan-driven agent loop.
//!
//! Runs the loop controller on a worker thread and renders its event
//! stream: single-line header (status, iteration, task progress, ETA), a
//! scrolling event log, a toggleable task panel, and a footer with key
//! hints and repo stats.

mod app;
mod events;
mod format;
mod theme;
mod views;

use std::io::{Stdout, stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::ExecutableCommand;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing::info;
use tracing_subscriber::EnvFilter;

use planloop::config::{config_path, load_config};
use planloop::control::LoopSignal;
use planloop::controller::{LoopController, LoopStatus};
use planloop::git::Git;
use planloop::observer::LoopEvent;
use planloop::options::LoopOptions;
use planloop::plan::{plan_progress, plan_tasks};
use planloop::session::ProcessSession;
use planloop::state::load_or_init_state;

use crate::app::App;
use crate::events::{EventHandler, UiEvent};
use crate::theme::Theme;

/// Type alias for our terminal backend.
type Tui = Terminal<CrosstermBackend<Stdout>>;

#[derive(Parser)]
#[command(
    name = "planloop-tui",
    version,
    about = "Terminal UI for the planloop coding-agent loop"
)]
struct Args {
    /// Plan document with `- [ ]` / `- [x]` task markers.
    #[arg(long, default_value = "plan.md")]
    plan: String,

    /// Model identifier, `provider/model`.
    #[arg(long, default_value = "anthropic/claude-opus-4")]
    model: String,

    /// File with a prompt template overriding the default.
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Stop before starting an iteration past this absolute count.
    #[arg(long)]
    max_iterations: Option<u32>,
}

/// Worker-thread side of the loop: built up front so configuration errors
/// surface before the terminal switches modes, started on the first `p`.
struct LoopRuntime {
    controller: Option<LoopController<ProcessSession, Git>>,
    handle: Option<JoinHandle<()>>,
    signal: LoopSignal,
    tx: Sender<LoopEvent>,
}

impl LoopRuntime {
    /// First request starts the loop thread; later requests toggle pause.
    fn start_or_toggle(&mut self, status: LoopStatus) {
        if let Some(mut controller) = self.controller.take() {
            info!("starting loop thread");
            let mut observer = self.tx.clone();
            self.handle = Some(std::thread::spawn(move || {
                // Failures reach the UI through the errored notification.
                let _ = controller.run(&mut observer);
            }));
            return;
        }
        match status {
            LoopStatus::Paused => self.signal.resume(),
            LoopStatus::Running => self.signal.pause(),
            _ => {}
        }
    }

    /// Abort the loop and wait for the worker to unwind.
    fn stop(&mut self) {
        info!("stopping loop thread");
        self.signal.abort();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn main() {
    // Diagnostics fight the alternate screen; keep them off unless
    // RUST_LOG is set explicitly (redirect stderr when enabling).
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("{err:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let workdir = std::env::current_dir().context("resolve working directory")?;

    let prompt = match &args.prompt_file {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("read prompt template {}", path.display()))?,
        ),
        None => None,
    };
    let options = LoopOptions {
        plan_file: args.plan.clone(),
        model: args.model.clone(),
        prompt,
        max_iterations: args.max_iterations,
    };

    let config = load_config(&config_path(&workdir))?;
    let git = Git::new(&workdir);
    let state = load_or_init_state(&workdir, &options.plan_file, &git)?;
    let signal = LoopSignal::new();
    let session = ProcessSession::start(&workdir, &config, signal.clone())?;

    let baseline = state.initial_commit_hash.clone();
    let plan_path = workdir.join(&options.plan_file);
    let mut app = App::new(
        state.start_time,
        state.iteration_times.clone(),
        plan_tasks(&plan_path)?,
    );
    app.progress = plan_progress(&plan_path)?;
    app.diff = git.diff_stat_since(&baseline);

    let controller = LoopController::new(
        &workdir,
        options,
        state,
        session,
        git.clone(),
        signal.clone(),
        Duration::from_secs(config.iteration_timeout_secs),
    )?;

    let (tx, rx) = mpsc::channel();
    let mut runtime = LoopRuntime {
        controller: Some(controller),
        handle: None,
        signal,
        tx,
    };

    let mut terminal = init_terminal()?;
    let result = ui_loop(&mut terminal, &mut app, &mut runtime, &rx, &git, &baseline, &plan_path);
    restore_terminal(&mut terminal)?;
    result
}

fn ui_loop(
    terminal: &mut Tui,
    app: &mut App,
    runtime: &mut LoopRuntime,
    rx: &Receiver<LoopEvent>,
    git: &Git,
    baseline: &str,
    plan_path: &Path,
) -> Result<()> {
    let theme = Theme::default();
    let handler = EventHandler::default();

    loop {
        for event in rx.try_iter() {
            // Iteration boundaries are when the repo and plan change.
            let refresh = matches!(event, LoopEvent::IterationCompleted { .. });
            app.apply(event);
            if refresh {
                app.tasks = plan_tasks(plan_path).unwrap_or_default();
                app.diff = git.diff_stat_since(baseline);
            }
        }

        terminal.draw(|frame| views::render(frame, app, &theme))?;

        match handler.next()? {
            UiEvent::Key(key) => handle_key(key, app, runtime),
            UiEvent::Tick | UiEvent::Resize => {}
        }

        if app.should_quit {
            runtime.stop();
            return Ok(());
        }
    }
}

fn handle_key(key: KeyEvent, app: &mut App, runtime: &mut LoopRuntime) {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => runtime.start_or_toggle(app.status),
        KeyCode::Char('t') => app.show_tasks = !app.show_tasks,
        _ => {}
    }
}

/// Initialize the terminal for UI mode (raw mode + alternate screen).
fn init_terminal() -> Result<Tui> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    Ok(terminal)
}

/// Restore the terminal to its original state.
fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
