use anyhow::{Context, Result};
use common::{init_db_pool, Config, ScraperConfig};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

use crate::error::GrabError;
use crate::poller::Poller;
use crate::server::AppState;
use crate::storage;

pub type PollerExit = Result<Result<(), GrabError>, JoinError>;

/// Process-wide handles: the store and the background poller task.
///
/// Created by `start`, torn down by `shutdown`. Nothing here is global; the
/// HTTP side receives its own `AppState` built from the same pool.
pub struct AppContext {
    pub db: SqlitePool,
    shutdown: Arc<Notify>,
    poller: Option<JoinHandle<Result<(), GrabError>>>,
}

impl AppContext {
    /// Open the database, make sure the `news` table exists and, unless
    /// `with_poller` is false, spawn the poller.
    pub async fn start(config: &Config, with_poller: bool) -> Result<Self> {
        let db = init_db_pool(&config.database.path).await?;
        let mut ctx = Self::from_pool(db).await;

        if with_poller {
            ctx.spawn_poller(&config.scraper)
                .context("failed to set up the poller")?;
        } else {
            info!("Background poller disabled");
        }

        Ok(ctx)
    }

    /// Wrap an already opened pool; ensures the schema.
    pub async fn from_pool(db: SqlitePool) -> Self {
        storage::ensure_schema(&db).await;
        Self {
            db,
            shutdown: Arc::new(Notify::new()),
            poller: None,
        }
    }

    pub fn spawn_poller(&mut self, cfg: &ScraperConfig) -> Result<(), GrabError> {
        let poller = Poller::new(self.db.clone(), cfg)?;
        let shutdown = self.shutdown.clone();
        info!("Spawning background poller task");
        self.poller = Some(tokio::spawn(poller.run(shutdown)));
        Ok(())
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(self.db.clone())
    }

    /// Wait for the poller task to end on its own. Pending forever when no
    /// poller runs. Cancel-safe: if dropped early the task is still owned
    /// here and `shutdown` can stop it.
    pub async fn wait_poller(&mut self) -> PollerExit {
        let exit = match self.poller.as_mut() {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        };
        self.poller = None;
        exit
    }

    /// Ask the poller to stop after its current cycle, wait up to `grace`
    /// for it, then close the pool.
    pub async fn shutdown(mut self, grace: Duration) {
        // notify_one keeps a permit, so a poller that is mid-cycle still
        // sees the request once it reaches its sleep.
        self.shutdown.notify_one();

        if let Some(handle) = self.poller.take() {
            match tokio::time::timeout(grace, handle).await {
                Ok(exit) => log_poller_exit(exit),
                Err(_) => info!("Timed out waiting for poller to exit; continuing shutdown"),
            }
        }

        self.db.close().await;
        info!("Shutdown complete");
    }
}

pub fn log_poller_exit(exit: PollerExit) {
    match exit {
        Ok(Ok(())) => info!("poller exited cleanly"),
        Ok(Err(e)) => error!(%e, "poller task returned an error"),
        Err(join_err) => error!(%join_err, "poller task panicked"),
    }
}
