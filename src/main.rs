//! usersvc - User Record Service
//!
//! Serves the `user.User` RPC interface over HTTP/JSON, backed by the
//! storage engine named in the env file (`STORAGE=in-memory|redis|mongo|postgres|elastic`).
//!
//! Startup is all-or-nothing: an invalid configuration or an unreachable
//! medium exits the process.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use usersvc::config::ServiceConfig;
use usersvc::service::{router, UserService};
use usersvc::{APP_NAME, APP_VERSION, CONFIG_PATH_DEFAULT};
use userstore_core::new_storage;

// =============================================================================
// CLI
// =============================================================================

/// User record service
#[derive(Parser, Debug)]
#[command(name = APP_NAME)]
#[command(about = "CRUD service for user records over pluggable storage")]
#[command(version)]
struct Cli {
    /// Path to the env file with PORT, STORAGE and backend keys
    #[arg(long, default_value = CONFIG_PATH_DEFAULT)]
    config_path: PathBuf,

    /// Bind address, overriding PORT
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .init();

    tracing::info!("{} v{}", APP_NAME, APP_VERSION);

    let mut config = ServiceConfig::load(&cli.config_path)?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    let storage = new_storage(&config.storage).await?;
    tracing::info!("Storage is {}", storage.kind());

    let app = router(Arc::new(UserService::new(storage)));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server is running on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
