use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::fs::File;
use std::io;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

use server::ListenerConfig;
use terminal::app::{App, AppCommand};
use terminal::replay::reader::HistoryReader;
use terminal::Session;

const DEFAULT_LOG_FILE: &str = "telemetry-terminal.log";

/// Live match telemetry viewer with history replay.
#[derive(Parser, Debug)]
#[command(name = "telemetry-terminal", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Directory browsed for history logs
    #[arg(long, env = "TELEMETRY_HISTORY_DIR", default_value = ".")]
    history_dir: PathBuf,

    /// Address the live listener binds (overrides TELEMETRY_BIND)
    #[arg(long, global = true)]
    bind: Option<IpAddr>,

    /// Port shared by UDP and TCP (overrides TELEMETRY_PORT)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Player to follow from the start
    #[arg(long, global = true)]
    follow: Option<String>,

    /// Initial replay speed multiplier
    #[arg(long, global = true)]
    speed: Option<f64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start listening for live telemetry right away
    Live,
    /// Open a history log in the viewer
    Replay { file: PathBuf },
    /// Print a JSON summary of a history log and exit
    Summarize { file: PathBuf },
}

fn init_logging() -> Result<()> {
    let path = std::env::var("TELEMETRY_LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let file = File::create(&path).with_context(|| format!("Failed to create log file {}", path))?;

    // The terminal belongs to the UI, so logs go to a file
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    // Load .env file if exists
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging()?;

    if let Some(Command::Summarize { file }) = &cli.command {
        let data = HistoryReader::load_history(file)?;
        println!("{}", serde_json::to_string_pretty(&data.summary())?);
        return Ok(());
    }

    let config = ListenerConfig::from_env()
        .context("Invalid listener configuration")?
        .with_overrides(cli.bind, cli.port);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let mut session = Session::new(runtime.handle().clone(), config);
    let mut app = match &cli.command {
        Some(Command::Live) => {
            let addr = session.start_listening()?;
            info!("Listening for telemetry on {}", addr);
            App::viewing(cli.history_dir.clone(), session)
        }
        Some(Command::Replay { file }) => {
            session.load_history(file)?;
            App::viewing(cli.history_dir.clone(), session)
        }
        _ => {
            if !cli.history_dir.exists() {
                eprintln!("History directory does not exist: {:?}", cli.history_dir);
            }
            App::new(cli.history_dir.clone(), session)?
        }
    };
    if let Some(speed) = cli.speed {
        app.session.set_speed(speed);
    }
    if cli.follow.is_some() {
        app.session.follow(cli.follow.clone());
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    app.session.stop_listening();

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<()> {
    let mut last_update = Instant::now();

    loop {
        let now = Instant::now();
        let dt = now.duration_since(last_update);
        last_update = now;

        app.update(dt);

        terminal.draw(|f| app.render(f))?;

        if event::poll(Duration::from_millis(16))? {
            let command = match event::read()? {
                Event::Key(key) => app.handle_input(key),
                Event::Mouse(mouse) => app.handle_mouse(mouse),
                _ => None,
            };
            match command {
                Some(AppCommand::Quit) => return Ok(()),
                Some(command) => app.handle_command(command)?,
                None => {}
            }
        }
    }
}
