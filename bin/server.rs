// Herdbook - Web Server
// REST API over the livestock register

use anyhow::{Context, Result};
use clap::Parser;
use herdbook::api::{create_router, AppState};
use herdbook::config::{init_logging, Config};
use herdbook::db::setup_database;
use rusqlite::Connection;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "herdbook-server", version, about = "Herdbook REST API server")]
struct Args {
    /// JSON config file (overrides HERDBOOK_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database path
    #[arg(short = 'D', long)]
    database: Option<PathBuf>,

    /// Address to bind, e.g. 127.0.0.1:3000
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(database) = args.database {
        config.database_path = database;
    }
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }

    init_logging(config.log_format);

    let conn = Connection::open(&config.database_path)
        .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
    setup_database(&conn)?;
    tracing::info!(path = ?config.database_path, "database opened");

    let app = create_router(AppState::new(conn, &config.actor));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;

    tracing::info!(addr = %config.bind_address, "server running");
    println!("🚀 Herdbook API on http://{}/api/livestock", config.bind_address);
    println!("   Press Ctrl+C to stop");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
