//! Storefront session CLI.
//!
//! Drives the session client against a live storefront API: log in, inspect
//! the identity, issue authenticated requests and log out. The token is kept
//! in a file so a session carries over between invocations.
//!
//! ```text
//!  session-cli login ──▶ SessionCoordinator ──▶ RequestPipeline ──▶ API
//!  session-cli get   ──────────────────────────▶ RequestPipeline ──▶ API
//!                                                    │
//!                                        expired token? one refresh,
//!                                        then replay every waiter
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use futures_util::future::join_all;
use serde_json::{json, Value};

use storefront_session::config::{load_config, ClientConfig, StoreKind};
use storefront_session::lifecycle::unload_on_ctrl_c;
use storefront_session::observability::{logging, metrics};
use storefront_session::{Credentials, RequestPipeline, SessionCoordinator};

#[derive(Parser)]
#[command(name = "session-cli")]
#[command(about = "Authenticated client for the storefront API", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the API base URL.
    #[arg(short, long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Show the current identity
    Whoami,
    /// GET a path with the current session
    Get {
        path: String,
        /// Fire this many identical requests at once.
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
    },
    /// Renew the session token
    Refresh,
    /// Log out and forget the session token
    Logout,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = cli.url {
        config.api.base_url = url;
    }
    if config.credentials.store == StoreKind::Memory && cli.config.is_none() {
        config.credentials.store = StoreKind::File;
        config.credentials.path = Some(default_token_path().to_string_lossy().into_owned());
    }

    logging::init(&config.observability.log_level);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let pipeline = RequestPipeline::from_config(&config)?;
    unload_on_ctrl_c(pipeline.unload_guard());
    let session = SessionCoordinator::new(pipeline.clone(), &config);

    match cli.command {
        Commands::Login { email, password } => {
            let identity = session.login(&Credentials { email, password }).await?;
            print_json(&json!({ "role": identity.role(), "user": identity.user() }))?;
        }
        Commands::Whoami => match session.restore().await? {
            Some(identity) => {
                print_json(&json!({ "role": identity.role(), "user": identity.user() }))?
            }
            None => eprintln!("Not logged in"),
        },
        Commands::Get { path, concurrency } => {
            let requests = (0..concurrency.max(1)).map(|_| pipeline.get(&path));
            for result in join_all(requests).await {
                match result {
                    Ok(response) => print_json(&response.body)?,
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            tracing::info!(refreshes = pipeline.refresh_count(), "Requests settled");
        }
        Commands::Refresh => {
            session.refresh_session().await?;
            println!("Session refreshed");
        }
        Commands::Logout => {
            if let Err(e) = session.logout().await {
                eprintln!("Server logout failed ({}), local session cleared", e);
            }
        }
    }

    Ok(())
}

fn default_token_path() -> PathBuf {
    std::env::temp_dir().join("storefront-session-token.json")
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
