//! Bugtrack server CLI
//!
//! Connects to the database, applies pending migrations, and serves the
//! REST API.

use bugtrack_api::{ApiServer, ApiServerConfig};
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "bugtrack",
    about = "Project and ticket tracking REST backend",
    version
)]
struct Cli {
    /// Listen address for the API server
    #[arg(short = 'b', long, default_value = "127.0.0.1:8080", env = "BUGTRACK_BIND")]
    bind: SocketAddr,

    /// Database connection URL (sqlite or postgres)
    #[arg(long, default_value = "sqlite::memory:", env = "BUGTRACK_DATABASE_URL")]
    database_url: String,

    /// Secret used to sign session tokens
    #[arg(long, env = "BUGTRACK_SESSION_SECRET")]
    session_secret: String,

    /// Session validity in hours
    #[arg(long, default_value_t = 24, env = "BUGTRACK_SESSION_HOURS")]
    session_hours: i64,

    /// Dev mode: localhost CORS and unmasked server errors
    #[arg(long, env = "BUGTRACK_DEV")]
    dev: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "bugtrack=debug,bugtrack_api=debug,bugtrack_db=debug".into())
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "bugtrack=info,bugtrack_api=info,bugtrack_db=info".into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Connecting to database");
    let db = bugtrack_db::connect(&cli.database_url).await?;

    info!("Applying migrations");
    bugtrack_db::migrate(&db).await?;

    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr: cli.bind,
            session_secret: cli.session_secret,
            session_hours: cli.session_hours,
            dev: cli.dev,
        },
        db,
    );

    server.start().await
}
