use chrono::Local;
use habit_tracker::{checklist, reconcile_today, router, AppState, Config, FileStore, StreakEngine};
use std::net::SocketAddr;
use tokio::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::from_env()?;
    if let Some(parent) = config.data_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }

    let mut store = FileStore::open(config.data_path.clone()).await;
    let engine = StreakEngine::new(config.badge_thresholds.iter().copied());

    checklist::ensure_initialized(&mut store)?;
    let outcome = reconcile_today(&mut store, &engine, Local::now().date_naive())?;
    info!("startup reconciliation: {outcome:?}");

    info!(
        "using store at {} with badge thresholds {:?}",
        store.path().display(),
        engine.thresholds()
    );
    let app = router(AppState::new(store, engine));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
