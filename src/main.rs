use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use license_server::config::Config;
use license_server::crypto::SiteSecret;
use license_server::db::{self, AppState, DbPool, queries};
use license_server::events::TracingSink;
use license_server::rate_limit::RateLimiter;

#[derive(Parser)]
#[command(name = "license-server", about = "License and activation server for plugin clients")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create the database schema and exit
    InitDb,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let pool = db::create_pool(&config.database_path)
        .with_context(|| format!("opening database at {}", config.database_path))?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::InitDb => {
            tracing::info!(path = %config.database_path, "database initialized");
            Ok(())
        }
        Command::Serve => serve(config, pool).await,
    }
}

async fn serve(config: Config, pool: DbPool) -> anyhow::Result<()> {
    let rate_limiter = RateLimiter::new();
    let state = AppState {
        db: pool.clone(),
        site_secret: SiteSecret::new(config.site_secret.clone()),
        rate_limiter: rate_limiter.clone(),
        events: Arc::new(TracingSink),
        config: config.clone(),
    };

    tokio::spawn(expiry_sweep(
        pool,
        rate_limiter,
        config.expiry_sweep_interval_secs,
    ));

    let app = license_server::app(state);
    let addr = config.addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!("license server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}

/// Advisory background sweep: flips past-expiry licenses to `expired` for
/// reporting and drops dead rate-limit windows. Validity stays computed on
/// read, so nothing here is load-bearing for correctness.
async fn expiry_sweep(pool: DbPool, rate_limiter: RateLimiter, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        interval.tick().await;

        rate_limiter.purge_expired();

        match pool.get() {
            Ok(conn) => match queries::mark_expired_licenses(&conn) {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "licenses marked expired"),
                Err(err) => tracing::error!("expiry sweep failed: {}", err),
            },
            Err(err) => tracing::error!("expiry sweep could not get a connection: {}", err),
        }
    }
}
