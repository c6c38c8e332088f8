mod approvals;
mod bootstrap;
mod health;
mod sweep;

use std::sync::Arc;

use anyhow::Result;
use signoff_core::audit::TracingAuditSink;
use signoff_core::config::{AppConfig, LoadOptions};
use signoff_core::engine::WorkflowEngine;
use signoff_db::SqlRequestRepository;

fn init_logging(config: &AppConfig) {
    use signoff_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    // Now bootstrap using the same config we already loaded
    let app = bootstrap::bootstrap_with_config(config).await?;

    let repository = Arc::new(SqlRequestRepository::new(app.db_pool.clone()));
    let audit = Arc::new(TracingAuditSink);

    let state = approvals::AppState {
        repository: repository.clone(),
        audit: audit.clone(),
        engine: WorkflowEngine::new(),
        warning_window: chrono::Duration::hours(app.config.sla.warning_window_hours as i64),
    };

    let sweeper = sweep::spawn(
        repository,
        audit,
        sweep::SweepPolicy {
            expire_after: chrono::Duration::hours(app.config.sla.expire_after_hours as i64),
        },
        app.config.server.sweep_interval_secs,
    );

    let router = approvals::router(state).merge(health::router(app.db_pool.clone()));

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "signoff-server listening"
    );

    axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await?;

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "signoff-server stopping"
    );
    sweeper.abort();
    app.db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}
