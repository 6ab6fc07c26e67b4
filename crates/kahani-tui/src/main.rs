use std::io::{self, Write};

use anyhow::{bail, Result};
use clap::Parser;
use kahani_core::{BackendClient, ChatController, ChatRole, ChatUpdate, Config};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "kahani")]
#[command(about = "Chat with an Urdu story generator and watch the story stream in")]
struct Cli {
    /// Backend (or relay) base URL
    #[arg(short, long)]
    backend_url: Option<String>,

    /// Number of tokens to ask the backend for
    #[arg(short, long)]
    max_length: Option<u32>,

    /// Generate one story from this prefix, print it and exit
    #[arg(short, long)]
    prefix: Option<String>,

    /// Print the backend health status and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|_| Config::new());

    let backend_url = config.resolve_backend_url(cli.backend_url.as_deref());
    let client = BackendClient::with_connect_timeout(&backend_url, config.connect_timeout())?;
    let controller = ChatController::new(cli.max_length.unwrap_or(config.max_length))
        .with_idle_timeout(config.idle_timeout());

    if cli.health {
        init_stderr_logging();
        let status = client.health().await?;
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    if let Some(prefix) = cli.prefix {
        init_stderr_logging();
        return generate_once(&client, controller, &prefix).await;
    }

    let _guard = init_file_logging()?;
    tracing::info!("Starting kahani against {}", backend_url);
    run_tui(client, controller).await
}

/// One-shot mode: stream a single story to stdout.
async fn generate_once(client: &BackendClient, mut controller: ChatController, prefix: &str) -> Result<()> {
    let mut stdout = io::stdout();

    let submitted = controller
        .run_with(client, prefix, |update| {
            if let ChatUpdate::Token { text, .. } = update {
                print!("{}", text);
                let _ = stdout.flush();
            }
        })
        .await;

    if submitted.is_none() {
        bail!("Prefix cannot be empty");
    }
    println!();

    match controller.messages().last() {
        Some(reply) if reply.role == ChatRole::Error => bail!("{}", reply.content),
        _ => Ok(()),
    }
}

async fn run_tui(client: BackendClient, controller: ChatController) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(client, controller, events.sender(), events.chat_sender());
    app.check_health();

    let result: Result<()> = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;

            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok(())
    }
    .await;

    app.cancel_generation();
    tui::restore()?;
    result
}

fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_target(false)
        .init();
}

/// The terminal is owned by the UI, so logs go to a daily file instead.
fn init_file_logging() -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("kahani")
        .join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "kahani.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kahani_core=debug".into()),
        )
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Ok(guard)
}
