//! BLOCKFALL - falling blocks, three skills, one leaderboard
//!
//! `blockfall` plays in the terminal, `blockfall serve` hosts the leaderboard
//! and `blockfall top` prints it.

mod board;
mod client;
mod game;
mod gravity;
mod input;
mod leaderboard;
mod piece;
mod protocol;
mod randomizer;
mod score;
mod server;
mod settings;
mod skill;
mod tetromino;
mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use client::{FeedStatus, LeaderboardClient, LeaderboardView};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use directories::ProjectDirs;
use game::{Action, Game, GameState};
use input::InputHandler;
use protocol::{ScoreRecord, DEFAULT_TOP_LIMIT};
use ratatui::{backend::CrosstermBackend, Terminal};
use settings::{Settings, DEFAULT_SERVER};
use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{Directive, EnvFilter};

/// Target frame rate
const TARGET_FPS: u64 = 60;
const FRAME_DURATION: Duration = Duration::from_micros(1_000_000 / TARGET_FPS);

/// Falling-block puzzle with time-gated skills and a live leaderboard.
#[derive(Debug, Parser)]
#[command(
    name = "blockfall",
    version,
    args_conflicts_with_subcommands = true,
    long_about = "Blockfall is a falling-block puzzle for the terminal.\n\n\
        Clear rows to score; every clear speeds the fall up a little. Three skills \
        help out on a cooldown: 1 slows gravity, 2 removes a random row, 3 swaps the \
        falling piece for the next one.\n\n\
        CONTROLS:\n  Left/Right  Move    Up     Rotate    Down   Soft drop\n  \
        Space       Hard drop   P/Esc  Pause     R      Restart   Q  Quit\n\n\
        Finished games are sent to the leaderboard server unless --offline is given."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    play: PlayArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play a game (the default)
    Play(PlayArgs),
    /// Run the leaderboard server
    Serve(ServeArgs),
    /// Print the current leaderboard
    Top(TopArgs),
}

#[derive(Debug, Args)]
struct PlayArgs {
    /// Name submitted with your scores. Overrides the settings file.
    #[arg(short, long)]
    name: Option<String>,

    /// Leaderboard server as host:port. Overrides the settings file.
    #[arg(short, long, value_name = "ADDR")]
    server: Option<String>,

    /// Don't connect to the leaderboard at all
    #[arg(long)]
    offline: bool,

    /// Fixed seed for the piece sequence
    #[arg(long)]
    seed: Option<u64>,

    /// Settings file to use instead of the platform default
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, default_value = DEFAULT_SERVER, value_name = "ADDR")]
    bind: String,

    /// Leaderboard JSON file. Defaults to the platform data directory.
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Entries returned when a query doesn't ask for a number (max 50)
    #[arg(short, long, default_value_t = DEFAULT_TOP_LIMIT, value_name = "N")]
    limit: usize,
}

#[derive(Debug, Args)]
struct TopArgs {
    /// Leaderboard server as host:port
    #[arg(short, long, default_value = DEFAULT_SERVER, value_name = "ADDR")]
    server: String,

    /// How many entries to show (max 50)
    #[arg(short, long, value_name = "N")]
    limit: Option<usize>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Play(cli.play)) {
        Command::Play(args) => play(args),
        Command::Serve(args) => serve(args),
        Command::Top(args) => top(args),
    }
}

/// Log to a per-session file so the TUI stays clean
fn init_file_logging() -> Result<(PathBuf, WorkerGuard)> {
    let session_id: u32 = rand::random();
    let dir = std::env::temp_dir().join("blockfall");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let log_file = format!("{session_id:08x}.log");

    let file_appender = tracing_appender::rolling::never(&dir, &log_file);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("blockfall=debug".parse::<Directive>()?),
        )
        .with_ansi(false)
        .init();

    Ok((dir.join(log_file), guard))
}

fn init_stderr_logging() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("blockfall=info".parse::<Directive>()?),
        )
        .init();
    Ok(())
}

fn play(args: PlayArgs) -> Result<()> {
    let (log_path, _guard) = init_file_logging()?;
    tracing::info!(log = %log_path.display(), "blockfall starting up");

    let settings_path = match args.config {
        Some(path) => path,
        None => Settings::default_path()?,
    };
    let mut settings = Settings::load_or_create(&settings_path)
        .with_context(|| format!("failed to load settings from {}", settings_path.display()))?;
    if let Some(name) = args.name {
        settings.player.name = name;
    }
    if let Some(server) = args.server {
        settings.leaderboard.server = server;
    }
    if args.offline {
        settings.leaderboard.enabled = false;
    }

    // Runtime for the leaderboard client only; the game loop stays synchronous
    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
    let client = settings.leaderboard.enabled.then(|| {
        LeaderboardClient::new(runtime.handle().clone(), settings.leaderboard.server.clone())
    });

    enable_raw_mode()?;
    execute!(stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let result = run_game(&mut terminal, &settings, client.as_ref(), args.seed);

    // Restore terminal
    disable_raw_mode()?;
    execute!(stdout(), LeaveAlternateScreen)?;

    let summary = result?;
    println!("\nThanks for playing BLOCKFALL!");
    if summary.games > 0 {
        println!(
            "Games finished: {} | Best score: {}",
            summary.games, summary.best
        );
    }
    if let Some(client) = &client {
        println!("Leaderboard: blockfall top --server {}", client.addr());
    }
    Ok(())
}

#[derive(Debug, Default)]
struct SessionSummary {
    games: u32,
    best: u64,
}

fn run_game(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    settings: &Settings,
    client: Option<&LeaderboardClient>,
    seed: Option<u64>,
) -> Result<SessionSummary> {
    let mut game = Game::new(settings.game_config(seed), Instant::now());
    let mut input = InputHandler::from_settings(settings);
    let mut summary = SessionSummary::default();

    let feed = client.map(LeaderboardClient::subscribe);
    let mut leaderboard = LeaderboardView::new(match feed {
        Some(_) => FeedStatus::Connecting,
        None => FeedStatus::Disabled,
    });

    loop {
        let now = Instant::now();
        let snapshot = game.snapshot(now);
        terminal.draw(|frame| ui::render_game(frame, &snapshot, &leaderboard))?;

        let mut actions = Vec::new();
        if event::poll(FRAME_DURATION)? {
            if let Event::Key(key) = event::read()? {
                match key.kind {
                    KeyEventKind::Press => actions.extend(input.key_down(key)),
                    KeyEventKind::Release => input.key_up(key),
                    _ => {}
                }
            }
        }
        actions.extend(input.update());

        for action in actions {
            if action == Action::Quit {
                tracing::info!(score = game.score().points, "quit");
                return Ok(summary);
            }
            game.process_action(action, Instant::now());
        }

        game.update(Instant::now());
        if game.state() != GameState::Running {
            // Held keys shouldn't carry over a pause or a game over
            input.clear();
        }

        if let Some(finished) = game.take_finished() {
            summary.games += 1;
            summary.best = summary.best.max(finished.score);
            if let Some(client) = client {
                client.submit(ScoreRecord {
                    name: settings.player.name.clone(),
                    score: finished.score,
                    lines: finished.lines,
                });
            }
        }

        if let Some(rx) = &feed {
            leaderboard.drain(rx);
        }
    }
}

fn default_store_path() -> Result<PathBuf> {
    ProjectDirs::from("com", "blockfall", "blockfall")
        .map(|dirs| dirs.data_dir().join("leaderboard.json"))
        .context("could not determine data directory; pass --store")
}

fn serve(args: ServeArgs) -> Result<()> {
    init_stderr_logging()?;

    let store = match args.store {
        Some(path) => path,
        None => default_store_path()?,
    };
    let config = server::ServerConfig {
        bind: args.bind,
        store: Some(store),
        default_limit: args.limit,
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
    runtime
        .block_on(server::run_server(config, None))
        .context("leaderboard server failed")
}

fn top(args: TopArgs) -> Result<()> {
    init_stderr_logging()?;

    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
    let client = LeaderboardClient::new(runtime.handle().clone(), args.server);
    let entries = runtime
        .block_on(client.fetch_top(args.limit))
        .with_context(|| format!("failed to query leaderboard at {}", client.addr()))?;

    if entries.is_empty() {
        println!("No scores yet");
        return Ok(());
    }
    println!("{:>4}  {:<24}  {:>10}  {:>6}", "#", "NAME", "SCORE", "LINES");
    for (rank, entry) in entries.iter().enumerate() {
        println!(
            "{:>4}  {:<24}  {:>10}  {:>6}",
            rank + 1,
            entry.name,
            entry.score,
            entry.lines
        );
    }
    Ok(())
}
