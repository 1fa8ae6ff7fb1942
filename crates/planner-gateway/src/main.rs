use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use planner_conferencing::{LogNotifier, LogProvider};
use planner_core::config::PlannerConfig;
use planner_events::EventBus;
use planner_meetings::{
    ActionDispatcher, MeetingOrchestrator, MeetingService, RecoveryBootstrapper,
    SqliteMeetingStore,
};
use planner_scheduler::JobRegistry;
use tracing::{info, warn};

mod app;
mod http;

/// Meeting planner gateway.
#[derive(Debug, Parser)]
#[command(name = "planner-gateway", version, about)]
struct Cli {
    /// Path to planner.toml (default: ~/.planner/planner.toml).
    #[arg(long, env = "PLANNER_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "planner_gateway=info,planner_meetings=info,planner_scheduler=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    let store = Arc::new(SqliteMeetingStore::new(db)?);

    // Bus first: every other component publishes or subscribes through it.
    let bus = Arc::new(EventBus::new());
    let registry = JobRegistry::new();
    let (orchestrator, _) =
        MeetingOrchestrator::attach(registry.clone(), Arc::clone(&bus), config.schedule);

    if config.conferencing.application_id.is_none() {
        info!(host = %config.conferencing.host, "no conferencing account configured, using dry-run provider");
    }
    ActionDispatcher::new(
        store.clone(),
        Arc::new(LogProvider::new(config.conferencing.host.clone())),
        Arc::new(LogNotifier::new(config.mail.default_from.clone())),
    )
    .attach(&bus);

    RecoveryBootstrapper::new(store.clone(), orchestrator).run(chrono::Utc::now())?;

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let service = MeetingService::new(store, Arc::clone(&bus));
    let state = Arc::new(app::AppState::new(config, service, bus, registry.clone()));
    let router = app::build_router(state);

    info!("Planner gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.clear();
    info!("Planner gateway stopped");
    Ok(())
}

/// A missing file yields defaults; a present but invalid one is fatal.
fn load_config(path: Option<&str>) -> anyhow::Result<PlannerConfig> {
    PlannerConfig::load(path).context("invalid planner config")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
