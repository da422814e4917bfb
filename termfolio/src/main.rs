//! termfolio-server - standalone HTTP server for the portfolio chat
//!
//! Serves the static front end and relays chat messages to the completion
//! service behind rate limiting, validation and origin checks.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/termfolio/config.toml (~/.config/termfolio/config.toml)
//! - Logs: $XDG_STATE_HOME/termfolio/ (~/.local/state/termfolio/)

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use termfolio::server::{router, AppState};
use termfolio_core::llm::OpenAiClient;
use termfolio_core::{ratelimit, ChatOrchestrator, Config, OriginPolicy, SessionStore};

#[derive(Parser)]
#[command(name = "termfolio-server")]
#[command(about = "Terminal-style portfolio chat server")]
#[command(version)]
struct Args {
    /// Config file path (default: XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Static asset root (overrides config)
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => {
            let mut config = Config::load_from(path).context("failed to load configuration")?;
            config.apply_env();
            config
        }
        None => Config::load().context("failed to load configuration")?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(static_dir) = args.static_dir {
        config.server.static_dir = static_dir;
    }
    config.validate().context("invalid configuration")?;

    // Initialize logging
    let _log_guard = termfolio_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!("termfolio-server starting");

    // Construct the stores and the chat pipeline
    let limiter = ratelimit::from_config(&config.rate_limit);
    let sessions = Arc::new(SessionStore::from_config(&config.session));
    let policy = OriginPolicy::from_config(&config.cors).context("invalid CORS config")?;

    let orchestrator = OpenAiClient::from_config(&config.llm)
        .context("failed to create completion client")?
        .map(|client| {
            ChatOrchestrator::new(
                sessions.clone(),
                Arc::new(client),
                config.session.history_window,
            )
        });
    if orchestrator.is_some() {
        tracing::info!(model = %config.llm.model, "Completion service configured");
    } else {
        tracing::warn!("No completion API key set; chat endpoint will serve 503s");
    }

    let state = Arc::new(AppState {
        policy,
        limiter: limiter.clone(),
        sessions: sessions.clone(),
        orchestrator,
        max_body_bytes: config.server.max_body_bytes,
    });

    // Periodic cleanup: one interval drives both sweeps
    let sweep_interval = Duration::from_secs(config.session.sweep_interval_secs);
    let sweeper = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await; // first tick completes immediately
        loop {
            interval.tick().await;
            limiter.sweep();
            sessions.sweep();
        }
    });

    let app = router(state, &config.server.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(
        %addr,
        static_dir = %config.server.static_dir.display(),
        rate_limit = config.rate_limit.max_requests,
        "Listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();
    tracing::info!("termfolio-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::error!("Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
