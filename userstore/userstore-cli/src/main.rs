//! Userstore CLI
//!
//! Run the storage operations directly against the configured backend.
//!
//! # Usage
//!
//! ```bash
//! # List every user
//! STORAGE=redis userstore list
//!
//! # Create, then change a user
//! userstore --config-path configs/.env add Alice alice@example.com 30
//! userstore update 1 Alice alice@example.org 31
//!
//! # Read and delete
//! userstore get 1
//! userstore remove 1
//! ```
//!
//! Results are printed as JSON, one record per line.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use userstore_core::{new_storage, StorageConfig, UserFields, UserId};

#[derive(Parser)]
#[command(name = "userstore")]
#[command(about = "Userstore admin CLI", long_about = None)]
struct Cli {
    /// Env file with STORAGE and backend connection keys
    #[arg(long)]
    config_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every user
    List,
    /// Show one user
    Get {
        /// User id
        id: UserId,
    },
    /// Create a user
    Add {
        /// Display name
        name: String,
        /// Contact address
        email: String,
        /// Age in years
        age: u8,
    },
    /// Replace a user's fields
    Update {
        /// User id
        id: UserId,
        /// Display name
        name: String,
        /// Contact address
        email: String,
        /// Age in years
        age: u8,
    },
    /// Delete a user
    Remove {
        /// User id
        id: UserId,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Some(path) = &cli.config_path {
        dotenvy::from_path(path)?;
    }

    let storage = new_storage(&StorageConfig::from_env()?).await?;
    tracing::info!(backend = %storage.kind(), "using storage");

    match cli.command {
        Commands::List => {
            for user in storage.get_all().await? {
                println!("{}", serde_json::to_string(&user)?);
            }
        }
        Commands::Get { id } => {
            println!("{}", serde_json::to_string(&storage.retrieve(id).await?)?);
        }
        Commands::Add { name, email, age } => {
            let user = storage.add(UserFields::new(name, email, age)).await?;
            println!("{}", serde_json::to_string(&user)?);
        }
        Commands::Update {
            id,
            name,
            email,
            age,
        } => {
            let user = storage.update(id, UserFields::new(name, email, age)).await?;
            println!("{}", serde_json::to_string(&user)?);
        }
        Commands::Remove { id } => {
            let removed = storage.remove(id).await?;
            println!("{}", serde_json::json!({ "id": removed }));
        }
    }

    Ok(())
}
