use anyhow::Result;
use clap::Parser;
use kahani_relay::{router, RelayState};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(name = "kahani-relay")]
#[command(about = "Relay story generation requests to the backend and stream the events back")]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "KAHANI_RELAY_BIND", default_value = "127.0.0.1:3000")]
    bind: String,

    /// Base URL of the generation backend
    #[arg(long, env = "BACKEND_URL", default_value = "http://localhost:8000")]
    backend_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kahani_relay=debug,tower_http=debug".into()),
        )
        .with_target(false)
        .with_line_number(true)
        .init();

    let state = RelayState::new(&cli.backend_url);
    let app = router(state);

    let listener = TcpListener::bind(&cli.bind).await?;
    tracing::info!(
        "Relay listening on {} -> {}",
        listener.local_addr()?,
        cli.backend_url
    );

    axum::serve(listener, app).await?;
    Ok(())
}
