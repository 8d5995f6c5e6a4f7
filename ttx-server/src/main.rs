//! TTX server - Main entry point
//!
//! Coordination server for facilitated tabletop exercises: exercise
//! authoring, inject release and gating, response scoring, and live
//! event fan-out to connected facilitator and participant sessions.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ttx_server::api::{self, AppContext};
use ttx_server::broadcast::BroadcastGateway;
use ttx_server::config::Config;
use ttx_server::db;
use ttx_server::engine::Engine;
use ttx_server::registry::SessionRegistry;

/// Command-line arguments for ttx-server
#[derive(Parser, Debug)]
#[command(name = "ttx-server")]
#[command(about = "Tabletop exercise coordination server")]
#[command(version)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "TTX_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on (overrides configuration)
    #[arg(short, long, env = "TTX_PORT")]
    port: Option<u16>,

    /// SQLite database file (overrides configuration)
    #[arg(short, long, env = "TTX_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttx_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments and layer them over the config file
    let args = Args::parse();
    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(database) = args.database {
        config.database_path = database;
    }

    info!("Starting TTX server on port {}", config.port);
    info!("Database: {}", config.database_path.display());

    // Open the database and make sure the schema and the bootstrap
    // facilitator account exist
    let pool = db::init::create_pool(&config.database_path)
        .await
        .context("Failed to open database")?;
    db::init::initialize_database(&pool)
        .await
        .context("Failed to initialize database schema")?;
    db::init::seed_default_facilitator(&pool)
        .await
        .context("Failed to seed facilitator account")?;

    // Wire up the engine, broadcast gateway, and session registry
    let gateway = Arc::new(BroadcastGateway::new(config.event_channel_capacity));
    let engine = Arc::new(Engine::new(pool.clone(), gateway.clone()));
    let registry = Arc::new(SessionRegistry::new(engine.clone()));

    let app = api::create_router(AppContext {
        engine,
        gateway,
        registry,
        db: pool,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
