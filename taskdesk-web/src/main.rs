//! Taskdesk Web Server
//!
//! Role-based task assignment API.

use anyhow::Context;
use clap::Parser;
use taskdesk_web::server::TaskdeskServerBuilder;
use taskdesk_web::{init_logging, WebConfig};
use tracing::info;

/// Taskdesk Web Server - role-based task assignment API
#[derive(Parser)]
#[command(name = "taskdesk-web")]
#[command(about = "HTTP API for assigning and reviewing tasks")]
#[command(version)]
struct Args {
    /// Server host to bind to [env: TASKDESK_HOST]
    #[arg(long)]
    host: Option<String>,

    /// Server port to listen on [env: TASKDESK_PORT]
    #[arg(short, long)]
    port: Option<u16>,

    /// Enable development mode
    #[arg(long)]
    dev: bool,

    /// `memory` or a SQLite URL [env: DATABASE_URL]
    #[arg(long)]
    database_url: Option<String>,

    /// Redis URL for the user cache [env: REDIS_URL]
    #[arg(long)]
    redis_url: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format (compact, pretty, json)
    #[arg(long, default_value = "compact")]
    log_format: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load environment variables
    dotenvy::dotenv().ok();
    init_logging(&args.log_level, &args.log_format)?;

    let config = WebConfig::from_env().context("Failed to load configuration")?;
    let mut builder = TaskdeskServerBuilder::new(config).dev_mode(args.dev);
    if let Some(host) = args.host {
        builder = builder.host(host);
    }
    if let Some(port) = args.port {
        builder = builder.port(port);
    }
    if let Some(url) = args.database_url {
        builder = builder.database_url(url);
    }
    if let Some(url) = args.redis_url {
        builder = builder.redis_url(url);
    }

    info!(config = ?builder.config(), "Starting Taskdesk web server");
    let server = builder.build().await.context("Failed to build server")?;
    server.start().await.context("Server failed")?;
    Ok(())
}
