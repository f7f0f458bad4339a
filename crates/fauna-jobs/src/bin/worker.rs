//! fauna-worker: background worker for the animal detection pipeline.
//!
//! Runs the job worker by default. Subcommands cover one-off operations:
//! queueing a full run, detecting a single asset, and probing the
//! inference endpoints.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use fauna_db::{Database, PoolConfig};
use fauna_inference::MachineLearningClient;
use fauna_jobs::{
    BatchEnqueuer, ConfigProvider, ConfigSource, DetectionWorker, EnqueueConfig,
    EnvConfigProvider, JobType, WorkerBuilder, WorkerConfig,
};

#[derive(Parser)]
#[command(name = "fauna-worker")]
#[command(author, version, about = "Animal detection worker for fauna")]
#[command(propagate_version = true)]
struct Cli {
    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://localhost/fauna")]
    database_url: String,

    /// Skip running pending migrations at startup
    #[arg(long, env = "FAUNA_SKIP_MIGRATIONS")]
    skip_migrations: bool,

    /// Read animal detection settings from the database or from FAUNA_* variables
    #[arg(long, env = "FAUNA_CONFIG_SOURCE", default_value = "database")]
    config_source: ConfigSource,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process jobs until interrupted (default)
    Run,

    /// Enqueue detection work for every eligible asset
    QueueAll {
        /// Include assets that were already processed
        #[arg(short, long)]
        force: bool,

        /// Enumerate in this process instead of queueing a queue-all job
        #[arg(long)]
        inline: bool,
    },

    /// Run detection for a single asset and print the outcome
    Detect {
        /// Asset id
        asset_id: Uuid,
    },

    /// Probe the configured inference endpoints
    Health,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before clap reads `env` defaults
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _file_guard = init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(subsystem = "jobs", component = "worker", error = %e, "fauna-worker failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing with configurable output.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
///   RUST_LOG    - standard env filter (default: fauna crates at info)
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "fauna_worker=info,fauna_jobs=info,fauna_db=info,fauna_inference=info".into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("fauna-worker.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            // no ANSI in files unless asked for
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let db = Database::connect_with_config(&cli.database_url, PoolConfig::from_env()).await?;
    if !cli.skip_migrations {
        db.migrate().await?;
        info!(subsystem = "db", "Migrations applied");
    }

    let config_provider: Arc<dyn ConfigProvider> = match cli.config_source {
        ConfigSource::Database => Arc::new(db.config.clone()),
        ConfigSource::Env => Arc::new(EnvConfigProvider::new()),
    };
    info!(subsystem = "config", config_source = %cli.config_source, "Animal detection config source selected");

    let client = MachineLearningClient::from_env();
    let enqueue_config = EnqueueConfig::from_env();

    let enqueuer = BatchEnqueuer::new(
        Arc::new(db.assets.clone()),
        Arc::new(db.jobs.clone()),
        config_provider.clone(),
    )
    .with_config(enqueue_config.clone());

    let detector = DetectionWorker::new(
        Arc::new(db.assets.clone()),
        Arc::new(db.status.clone()),
        Arc::new(db.tags.clone()),
        Arc::new(client.clone()),
        config_provider.clone(),
    )
    .with_page_size(enqueue_config.page_size)
    .with_inference_timeout(client.timeout());

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_worker(db, config_provider.as_ref(), &client, enqueuer, detector).await,
        Commands::QueueAll { force, inline } => {
            if inline {
                let summary = enqueuer.run(force).await?;
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                let job_id = db
                    .jobs
                    .queue(
                        JobType::AnimalDetectionQueueAll,
                        None,
                        Some(json!({ "force": force })),
                    )
                    .await?;
                println!("Queued {} job {}", JobType::AnimalDetectionQueueAll, job_id);
            }
            Ok(())
        }
        Commands::Detect { asset_id } => {
            let outcome = detector.detect_asset(asset_id).await?;
            println!("{}: {:?}", asset_id, outcome);
            Ok(())
        }
        Commands::Health => {
            let config = config_provider.animal_detection_config().await?;
            let mut healthy = 0;
            for endpoint in &config.inference_endpoints {
                let ok = client.health_check(endpoint).await.unwrap_or(false);
                println!("{} {}", if ok { "ok  " } else { "down" }, endpoint);
                if ok {
                    healthy += 1;
                }
            }
            if healthy == 0 {
                anyhow::bail!("No inference endpoint is reachable");
            }
            Ok(())
        }
    }
}

async fn run_worker(
    db: Database,
    config_provider: &dyn ConfigProvider,
    client: &MachineLearningClient,
    enqueuer: BatchEnqueuer,
    detector: DetectionWorker,
) -> anyhow::Result<()> {
    let config = config_provider.animal_detection_config().await?;
    for endpoint in &config.inference_endpoints {
        match client.health_check(endpoint).await {
            Ok(true) => info!(subsystem = "inference", endpoint = %endpoint, "Inference endpoint reachable"),
            _ => warn!(subsystem = "inference", endpoint = %endpoint, "Inference endpoint unreachable at startup"),
        }
    }

    let handle = WorkerBuilder::new(db)
        .with_config(WorkerConfig::from_env())
        .with_handler(enqueuer)
        .with_handler(detector)
        .build()
        .await
        .start();

    tokio::signal::ctrl_c().await?;
    info!(subsystem = "jobs", component = "worker", "Shutdown signal received");
    handle.shutdown_and_wait().await?;
    Ok(())
}
