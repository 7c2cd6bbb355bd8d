/*
hackngrabber - single-binary main.rs
This binary starts the Rocket HTTP server and runs the front page poller inside the same process.
*/

use anyhow::Result;
use clap::Parser;
use common::Config;
use std::path::PathBuf;
use tokio::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use hackngrabber::app::{log_poller_exit, AppContext};
use hackngrabber::server::launch_rocket;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(20);

#[derive(Parser, Debug)]
#[command(name = "hackngrabber", about = "Front page grabber with a paginated read API")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable background poller (run server only)
    #[arg(long)]
    no_worker: bool,

    /// Run poller only (do not bind HTTP server)
    #[arg(long, conflicts_with = "no_worker")]
    worker_only: bool,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // config.default.toml, then --config or ./config.toml on top
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = args.config {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p)
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = match Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await
    {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    config.validate()?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    info!(db_path = %config.database.path, source = %config.scraper.source_url, "resolved settings");

    let mut ctx = AppContext::start(&config, !args.no_worker).await?;

    if args.worker_only {
        info!("Starting in worker-only mode");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, stopping poller");
            }
            exit = ctx.wait_poller() => {
                log_poller_exit(exit);
            }
        }
        ctx.shutdown(SHUTDOWN_GRACE).await;
        return Ok(());
    }

    info!("Launching Rocket HTTP server");
    if let Err(e) = launch_rocket(ctx.app_state(), config.server.as_ref()).await {
        error!(%e, "Rocket server failed");
    }

    info!("HTTP server stopped; stopping poller");
    ctx.shutdown(SHUTDOWN_GRACE).await;
    Ok(())
}
