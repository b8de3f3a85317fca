use anyhow::Context;
use clap::Parser;
use slither::terminal::{self, TerminalEvent, TerminalSession, TerminalSurface};
use slither::{Game, GameConfig, GameTasks, Input, SchedulerProvider};
use std::cell::RefCell;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Terminal snake.
#[derive(Debug, Parser)]
#[command(name = "slither", version, about)]
struct Cli {
    /// JSON config file; missing fields fall back to defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Milliseconds between snake steps. Overrides the config file.
    #[arg(long)]
    interval: Option<f64>,

    /// Keep the snake moving while the terminal is unfocused.
    #[arg(long)]
    render_when_hidden: bool,

    /// Write logs here. The screen belongs to the game, so nothing is
    /// logged without it.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<GameConfig> {
    let mut config = match &cli.config {
        Some(path) => GameConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GameConfig::default(),
    };
    if let Some(interval) = cli.interval {
        config.snake_interval_ms = interval;
    }
    if cli.render_when_hidden {
        config.render_when_hidden = true;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(path) = &cli.log_file {
        init_logging(path)?;
    }
    let config = load_config(&cli)?;
    tracing::info!(?config, "starting");

    let mut session = TerminalSession::enter().context("failed to set up the terminal")?;
    let result = run(&config);
    session.leave().context("failed to restore the terminal")?;
    result
}

fn run(config: &GameConfig) -> anyhow::Result<()> {
    let viewport = terminal::current_viewport()?;
    let mut provider = SchedulerProvider::new(Box::new(TerminalSurface::new()), viewport, 1.0)?;
    let game = Rc::new(RefCell::new(Game::new(viewport, config)));
    let tasks = GameTasks::install(&game, &mut provider, config);
    tasks.redraw(&game, &mut provider)?;

    let poll = Duration::from_millis(config.frame_poll_ms);
    let clock = Instant::now();

    loop {
        match terminal::poll_event(poll)? {
            Some(TerminalEvent::Input(input)) => match input {
                Input::Direction(direction) => {
                    game.borrow_mut().steer(direction);
                }
                Input::Start => {
                    game.borrow_mut().start();
                    provider.start();
                }
                Input::Pause => {
                    game.borrow_mut().pause();
                    provider.stop();
                    tasks.redraw(&game, &mut provider)?;
                }
                Input::Restart => {
                    game.borrow_mut().restart();
                    provider.stop();
                    tasks.redraw(&game, &mut provider)?;
                }
                Input::Quit => break,
            },
            Some(TerminalEvent::Resize(columns, rows)) => {
                let viewport = terminal::viewport_for(columns, rows);
                game.borrow_mut().resize(viewport);
                provider.resize(viewport, 1.0)?;
                tasks.redraw(&game, &mut provider)?;
            }
            Some(TerminalEvent::Focus(focused)) => provider.set_page_hidden(!focused),
            None => {}
        }

        provider.frame(clock.elapsed().as_secs_f64() * 1000.0)?;
    }

    tasks.uninstall();
    tracing::info!("quit");
    Ok(())
}
