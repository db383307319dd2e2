mod api;
mod config;
mod cors;
mod docs;
mod http;
mod store;

use crate::api::ApiService;
use crate::config::ServerConfig;
use crate::cors::CorsService;
use crate::store::Store;
use reporting::{RecoveryService, ReportContext, ReportingConfig};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to open project store: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("server failed to start: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    reporting::install_panic_hook();
    let report_ctx = Arc::new(ReportContext::new(ReportingConfig::from_env()));

    if let Err(err) = run(report_ctx.clone()).await {
        // Best-effort startup report, bounded by the dispatch timeout; the
        // process is exiting with a non-zero status either way.
        report_ctx.report_startup_failure(err.to_string()).await;
        std::process::exit(1);
    }
}

async fn run(report_ctx: Arc<ReportContext>) -> Result<(), StartupError> {
    let config = ServerConfig::from_env()?;
    let store = Store::open(&config.database_path)?;

    // Recovery outermost so panics anywhere below it, CORS layer included,
    // are absorbed and reported.
    let service = RecoveryService::new(CorsService::new(ApiService::new(store)), report_ctx);

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    tracing::info!(host = %config.host, port = config.port, "server listening");
    http::serve(listener, service).await?;
    Ok(())
}
