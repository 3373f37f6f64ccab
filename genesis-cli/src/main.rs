//! Genesis Node CLI
//!
//! Usage:
//!   genesis generate-keys   - Generate a founder key pair
//!   genesis init-database   - Initialize schema and seed data
//!   genesis start           - Start the node API server

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "genesis")]
#[command(about = "Genesis permissioned blockchain node")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "genesis.yml")]
    config: PathBuf,

    /// Database DSN override (mem:// or postgres://...)
    #[arg(long)]
    db_dsn: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a founder key pair
    GenerateKeys {
        /// Directory the private key file is written to
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// Initialize the database schema and seed data
    InitDatabase {
        /// Founder private key file (hex)
        #[arg(short, long, default_value = "PrivateKey")]
        key_file: PathBuf,
    },

    /// Start the node API server
    Start {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("cannot load {}: {}", cli.config.display(), err);
            std::process::exit(1);
        }
    };
    if let Some(dsn) = cli.db_dsn {
        config.db.dsn = dsn;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    let outcome = match cli.command {
        Commands::GenerateKeys { out } => commands::generate_keys(&out),
        Commands::InitDatabase { key_file } => commands::init_database(&config, &key_file).await,
        Commands::Start { host, port } => {
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = port {
                config.api.port = port;
            }
            commands::start(&config).await
        }
    };

    if let Err(err) = outcome {
        tracing::error!(error = %err, "command failed");
        std::process::exit(1);
    }
}
