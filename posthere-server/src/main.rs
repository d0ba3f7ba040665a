use std::sync::Arc;

use clap::Parser;
use posthere_core::PostHereConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use posthere_server::subsystems::sessions::run_session_sweeper;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "posthere.toml")]
    config: String,

    /// Check storage connectivity and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match PostHereConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging; RUST_LOG wins over [service] log_level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let ctx = match posthere_server::build_context(config).await {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Failed to start PostHere: {:#}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match &ctx.pool {
            Some(pool) => match posthere_core::db::health_check(pool).await {
                Ok(v) => println!("✅ PostgreSQL connected: {}", v),
                Err(e) => {
                    println!("❌ PostgreSQL connection failed: {}", e);
                    std::process::exit(1);
                }
            },
            None => println!("✅ Storage backend: {}", ctx.storage_name()),
        }
        println!("✅ PostHere health check passed");
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    // Idle session sweeper
    let sweeper_store = ctx.sessions.clone();
    let sweeper_config = ctx.config.bot.clone();
    tokio::spawn(run_session_sweeper(sweeper_store, sweeper_config, tx.subscribe()));

    if !ctx.config.http.enabled {
        tracing::warn!("HTTP disabled, no inbound transport; waiting for shutdown");
        let mut shutdown = tx.subscribe();
        let _ = shutdown.recv().await;
        return Ok(());
    }

    posthere_server::http::start_http_server(ctx, tx.subscribe()).await?;

    Ok(())
}
