use clap::Parser;
use cronbind_binder::build_scheduler_handle;
use cronbind_core::CronbindConfig;
use cronbind_engine::{EngineOptions, RunOutcome};
use tracing::{info, warn};

mod cli;
mod jobs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cronbind_daemon=info,cronbind_engine=info,cronbind_binder=info".into()
            }),
        )
        .init();

    let args = cli::Cli::parse();

    // config: --config > CRONBIND_CONFIG env > ~/.cronbind/cronbind.toml
    let config_path = args.config.or_else(|| std::env::var("CRONBIND_CONFIG").ok());
    let mut config = CronbindConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        CronbindConfig::default()
    });
    if let Some(db) = args.db {
        config.database.path = db;
    }

    if !config.scheduler.enabled {
        info!("scheduler disabled (scheduler.enabled = false); nothing to do");
        return Ok(());
    }

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite job store");
    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;

    // Finished fires are logged here so workers never wait on the log sink.
    let (outcome_tx, outcome_rx) = tokio::sync::mpsc::channel::<RunOutcome>(256);
    tokio::spawn(log_outcomes(outcome_rx));

    let options = EngineOptions::from_config(&config.scheduler)?.with_outcomes(outcome_tx);
    let engine = build_scheduler_handle(
        db,
        jobs::declarations(),
        jobs::instances()?,
        &config,
        options,
    )?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let runner = tokio::spawn(engine.clone().run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    let _ = shutdown_tx.send(true);
    runner.await?;
    engine.wait_for_running_jobs().await;
    info!("cronbind stopped");
    Ok(())
}

async fn log_outcomes(mut rx: tokio::sync::mpsc::Receiver<RunOutcome>) {
    while let Some(outcome) = rx.recv().await {
        match (&outcome.error, &outcome.result) {
            (Some(error), _) => warn!(
                job = %outcome.job_key,
                fire = %outcome.fire_instance_id,
                duration_ms = outcome.duration_ms,
                "fire failed: {error}"
            ),
            (None, Some(result)) => info!(
                job = %outcome.job_key,
                fire = %outcome.fire_instance_id,
                duration_ms = outcome.duration_ms,
                %result,
                "fire finished"
            ),
            (None, None) => info!(
                job = %outcome.job_key,
                fire = %outcome.fire_instance_id,
                duration_ms = outcome.duration_ms,
                "fire finished"
            ),
        }
    }
}

fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
