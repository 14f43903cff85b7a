//! # herbsight-server
//!
//! Hosted backend for HerbSight.
//!
//! This binary provides:
//! - **File upload** for captured plant images, served back under
//!   `/files/<name>`
//! - **Identification gateway** forwarding image + prompt to an
//!   OpenAI-compatible vision model
//! - **Entity collections** for per-user scans and the admin-only plant
//!   knowledge base
//! - **Bearer sessions** issued by `/auth/register`, plus an admin token
//! - **Per-IP rate limiting** on the upload and identification routes

mod api;
mod auth;
mod config;
mod error;
mod file_store;
mod llm;
mod rate_limit;

use std::sync::Arc;

use herbsight_store::Database;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::file_store::FileStore;
use crate::llm::LlmGateway;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,herbsight_server=debug")),
        )
        .init();

    info!("Starting HerbSight server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");
    info!(
        instance = %config.instance_name,
        registration_open = config.registration_open,
        admin_enabled = config.admin_token.is_some(),
        identification_enabled = config.llm_api_url.is_some(),
        "Instance settings"
    );

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = Database::open_at(&config.database_path)?;

    let files = Arc::new(
        FileStore::new(config.file_storage_path.clone(), config.max_upload_size).await?,
    );

    let llm = Arc::new(LlmGateway::new(&config)?);

    let rate_limiter = RateLimiter::from_config(&config);

    let http_addr = config.http_addr;
    let app_state = AppState {
        db: Arc::new(Mutex::new(db)),
        files,
        llm,
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Spawn background tasks
    // -----------------------------------------------------------------------

    // Periodic rate limiter cleanup (every 5 minutes, evict buckets idle >10 min)
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale(600.0).await;
        }
    });

    // -----------------------------------------------------------------------
    // 5. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
