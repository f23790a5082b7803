use anyhow::Context;
use chatdesk::api::{Backend, HttpBackend};
use chatdesk::config::{self, Config};
use chatdesk::controller::AppController;
use chatdesk::repl::{self, Terminal};
use std::sync::Arc;
use time::UtcOffset;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: chatdesk

Chat with the assistant backend, organized into projects.

Environment:
  CHATDESK_BACKEND_URL   backend base url (default http://127.0.0.1:5001)
  CHATDESK_TIMEOUT_SECS  request timeout in seconds (default 120)
  RUST_LOG               log filter (default chatdesk=info)";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chatdesk=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    if std::env::args()
        .skip(1)
        .any(|arg| arg == "--help" || arg == "-h")
    {
        println!("{USAGE}");
        return Ok(());
    }

    // Only answerable while the process is single-threaded.
    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    config::load_dotenv();
    init_tracing();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?
        .block_on(run(local_offset))
}

async fn run(local_offset: UtcOffset) -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid configuration")?;
    let backend =
        Arc::new(HttpBackend::new(&config).context("failed to build the backend client")?);

    match backend.health().await {
        Ok(health) if health.is_healthy() => info!(url = %backend.base_url(), "backend is healthy"),
        Ok(health) => warn!(status = %health.status, "backend reports it is not healthy"),
        Err(err) => warn!(url = %backend.base_url(), error = %err, "backend health check failed"),
    }

    let terminal = Arc::new(Terminal::new(local_offset));
    let mut app =
        AppController::with_backend(backend, terminal.clone()).with_local_offset(local_offset);
    repl::run(&mut app, &terminal).await;

    Ok(())
}
