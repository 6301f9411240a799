mod handlers;
mod metrics;
mod routes;

use anyhow::Context;
use axum::Router;
use judge_common::config::Settings;
use judge_engine::Executor;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::info;

pub struct AppState {
    pub executor: Arc<Executor>,
    /// Bounds how many requests execute at once; the rest wait for a permit.
    pub limiter: Arc<Semaphore>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Judge API booting...");

    let settings = Settings::from_env().context("Invalid configuration")?;
    info!(
        backend = ?settings.backend,
        container = %settings.container,
        host_dir = %settings.host_dir.display(),
        timeout_ms = settings.run_timeout.as_millis() as u64,
        policy = ?settings.run_error_policy,
        "Configuration loaded"
    );

    let executor = Executor::from_settings(&settings).await?;

    let state = Arc::new(AppState {
        executor: Arc::new(executor),
        limiter: Arc::new(Semaphore::new(settings.max_concurrent_executions)),
    });

    // Build router
    let app = Router::new().merge(routes::routes()).with_state(state);

    // Start server
    let listener = TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;

    info!("HTTP server listening on {}", settings.bind_addr);
    info!(
        max_concurrent = settings.max_concurrent_executions,
        "Ready to accept executions"
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
