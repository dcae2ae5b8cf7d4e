// ABOUTME: Entry point for the huddle binary.
// ABOUTME: Parses CLI arguments, initializes tracing, seeds agents, and starts the HTTP server.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use huddle_server::{AppState, HuddleConfig, create_router};
use huddle_store::{SqliteStore, load_agents_file, seed_agents};

#[derive(Parser, Debug)]
#[command(name = "huddle", version)]
#[command(about = "Chat server that hands @mentions to specialist agents", long_about = None)]
struct Cli {
    /// Socket address to bind (overrides HUDDLE_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Data directory (overrides HUDDLE_HOME)
    #[arg(long)]
    home: Option<PathBuf>,

    /// YAML file of agents to seed before serving (overrides HUDDLE_AGENTS_FILE)
    #[arg(long)]
    agents_file: Option<PathBuf>,

    /// Seed agents and exit without serving
    #[arg(long, default_value_t = false)]
    seed_only: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(
                    "huddle=info,huddle_server=info,huddle_agent=info,huddle_store=info,tower_http=info",
                )
            }),
        )
        .init();

    let cli = Cli::parse();

    let mut config = HuddleConfig::from_env()?;
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(home) = cli.home {
        config.home = home;
    }
    if let Some(agents_file) = cli.agents_file {
        config.agents_file = Some(agents_file);
    }
    config.validate()?;

    let db_path = config.db_path();
    let store = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("opening store {}", db_path.display()))?,
    );

    if let Some(path) = &config.agents_file {
        let agents = load_agents_file(path)?;
        let seeded = seed_agents(store.as_ref(), &agents).await?;
        tracing::info!(count = seeded, file = %path.display(), "agents seeded");
    }
    if cli.seed_only {
        return Ok(());
    }

    let state = Arc::new(AppState::from_config(&config, store));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        auth = !config.auth_tokens.is_empty(),
        model = %config.default_model,
        "huddle listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("huddle stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
