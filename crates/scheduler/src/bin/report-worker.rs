//! report-worker — runs the recurring report scheduler and job workers.
//!
//! Wires the orchestrator, delivery engine, and cron schedule together and
//! drives them until ctrl-c. Store backends default to the in-memory
//! implementations; production deployments swap in the telephony
//! platform's stores behind the same traits.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::{Mutex, Notify};
use tracing::info;

use cdrstats_core::{load_dotenv, Config};
use cdrstats_notify::{DeliveryEngine, DeliveryPolicy, MemoryDeliveryAuditStore, SmtpMailTransport};
use cdrstats_report::{
    CsvRenderer, MemoryBreakStore, MemoryCallRecordStore, MemoryDirectoryStore,
    MemoryExecutionLog, MemoryHolidayStore, ReportOrchestrator, Stores,
};
use cdrstats_scheduler::{
    job_queue, scheduler_loop, worker_loop, DirectoryRecipients, JobDefinition, JobRunner,
    JobSchedule, RetryPolicy,
};

// ── CLI ─────────────────────────────────────────────────────────────

/// Call-center report scheduler and delivery worker.
#[derive(Parser, Debug)]
#[command(name = "report-worker", version, about)]
struct Cli {
    /// Number of job worker tasks.
    #[arg(long, env = "REPORT_WORKERS", default_value_t = 2)]
    workers: usize,

    /// Override the scheduler tick interval in seconds.
    #[arg(long, env = "SCHEDULER_TICK_SECS")]
    tick_secs: Option<u64>,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let cli = Cli::parse();
    let config = Config::from_env();
    config.calendar.validate()?;
    config.log_summary();

    let cal = config.calendar.local_calendar();

    let directory = Arc::new(MemoryDirectoryStore::default());
    let stores = Stores {
        calls: Arc::new(MemoryCallRecordStore::default()),
        breaks: Arc::new(MemoryBreakStore::default()),
        holidays: Arc::new(MemoryHolidayStore::default()),
        directory: directory.clone(),
    };

    let orchestrator = Arc::new(ReportOrchestrator::new(
        stores,
        Arc::new(MemoryExecutionLog::new()),
        Arc::new(CsvRenderer),
        cal,
        config.work_hours,
    ));

    let transport = Arc::new(SmtpMailTransport::from_config(&config.smtp)?);
    let delivery = Arc::new(DeliveryEngine::new(
        transport,
        Arc::new(MemoryDeliveryAuditStore::new()),
        DeliveryPolicy::from_config(&config.delivery),
    ));

    let runner = Arc::new(JobRunner::new(
        orchestrator,
        delivery,
        Arc::new(DirectoryRecipients(directory)),
        config.reporting.clone(),
        Duration::from_secs(config.delivery.timeout_minutes * 60),
        RetryPolicy::from_delays_secs(&config.scheduler.retry_delays_secs),
    ));

    let mut schedule = JobSchedule::new(cal);
    schedule.sync_jobs(&JobDefinition::from_config(&config.scheduler));
    let schedule = Arc::new(Mutex::new(schedule));

    let (tx, rx) = job_queue(config.scheduler.queue_capacity);
    let rx = Arc::new(Mutex::new(rx));
    let shutdown = Arc::new(Notify::new());

    let tick = Duration::from_secs(cli.tick_secs.unwrap_or(config.scheduler.tick_secs));
    let scheduler = tokio::spawn(scheduler_loop(
        schedule.clone(),
        tx.clone(),
        tick,
        shutdown.clone(),
    ));

    let mut workers = Vec::new();
    for _ in 0..cli.workers.max(1) {
        workers.push(tokio::spawn(worker_loop(runner.clone(), rx.clone())));
    }

    info!(workers = cli.workers, "report-worker started");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    shutdown.notify_one();
    drop(tx);
    scheduler.await?;
    for worker in workers {
        worker.await?;
    }
    info!("report-worker exited cleanly");

    Ok(())
}
