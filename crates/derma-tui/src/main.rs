//! Derma - sign in and upload photos from the terminal.
//!
//! Running `derma` opens a two-screen TUI: a login form, then a home
//! screen where a photo is picked by path and uploaded. `derma --upload
//! <path>` does the same without the TUI.

mod app;
mod headless;
mod ui;
mod utils;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use derma_core::Config;

use app::{build_services, App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file written while the TUI owns the terminal
const LOG_FILE: &str = "derma.log";

const USAGE: &str = "Usage: derma [--upload <path> [--username <name>]]";

/// Initialize the tracing subscriber for logging.
///
/// With a log directory, output goes to a file so it doesn't draw over
/// the TUI. The returned guard must live until exit to flush it.
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(io::stderr))
                .with(filter)
                .init();
            None
        }
    }
}

enum Command {
    Tui,
    Upload { path: PathBuf, username: Option<String> },
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut upload = None;
    let mut username = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--upload" => {
                let path = iter.next().context("--upload needs a path")?;
                upload = Some(PathBuf::from(path));
            }
            "--username" => {
                username = Some(iter.next().context("--username needs a value")?.clone());
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("Unknown argument: {}\n{}", other, USAGE),
        }
    }

    match upload {
        Some(path) => Ok(Command::Upload { path, username }),
        None if username.is_some() => bail!("--username only applies to --upload\n{}", USAGE),
        None => Ok(Command::Tui),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let config = Config::load().context("Failed to load configuration")?;

    match command {
        Command::Upload { path, username } => {
            let _guard = init_tracing(None);
            upload_headless(config, path, username).await
        }
        Command::Tui => {
            let log_dir = config.cache_dir().ok();
            if let Some(ref dir) = log_dir {
                std::fs::create_dir_all(dir)?;
            }
            let _guard = init_tracing(log_dir);
            run_tui(config).await
        }
    }
}

async fn run_tui(config: Config) -> Result<()> {
    info!(base_url = %config.base_url, "Derma starting");

    let mut app = App::new(config, Config::default_path().ok())?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Derma shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Apply completed login/upload results
        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

/// Upload one photo without the TUI, then sign out
async fn upload_headless(config: Config, path: PathBuf, username: Option<String>) -> Result<()> {
    let (sessions, uploads) = build_services(&config)?;

    let credentials = || -> Result<(String, String)> {
        let username = match username
            .clone()
            .or_else(|| std::env::var("DERMA_USERNAME").ok())
            .or_else(|| config.last_username.clone())
        {
            Some(name) => name,
            None => prompt_username()?,
        };
        let password = match std::env::var("DERMA_PASSWORD") {
            Ok(password) => password,
            Err(_) => rpassword::prompt_password("Password: ")?,
        };
        Ok((username, password))
    };

    let ack = headless::upload_once(&sessions, &uploads, path, credentials).await?;
    eprintln!("Upload complete (status {})", ack.status);
    if !ack.body.is_empty() {
        println!("{}", ack.body);
    }
    Ok(())
}

fn prompt_username() -> Result<String> {
    use std::io::Write;

    eprint!("Username: ");
    io::stderr().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}
