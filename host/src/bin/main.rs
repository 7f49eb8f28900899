use std::fs::create_dir_all;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use dbhub_dispatch::Dispatcher;
use dbhub_jobqueue::{JobQueue, MemJobQueue, PgJobQueue, SubmitterInstance};
use dbhub_metadata::{InMemoryMetadataStore, MetadataStore, PgMetadataStore};
use dbhub_responsemux::{run_response_checker, ResponseMultiplexer};
use dbhub_host::{
    error::HostResult,
    server::auth::ApiKeyStore,
    server::logging::{AsyncRequestLogger, RequestLoggingConfig},
    server::serve,
    state::DbHubState,
    Cli,
};
use tokio::sync::watch;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

#[tokio::main]
async fn main() -> HostResult<()> {
    dotenv::dotenv().ok();

    let mut cli = Cli::parse();
    cli.merge_from_file()?;
    let _guard = subscribe_log(&cli.log_path, &cli.log_level, cli.max_log);
    debug!("Start config:\n{:#?}", cli);

    let metadata_store_url = std::env::var("DBHUB_METADATA_URL").ok();
    let job_queue_url = std::env::var("DBHUB_JOBQUEUE_URL").ok();

    let metadata: Arc<dyn MetadataStore> = match metadata_store_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(&url)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            Arc::new(PgMetadataStore::new(pool))
        }
        None => {
            info!("DBHUB_METADATA_URL not set, using an in-memory metadata store");
            Arc::new(InMemoryMetadataStore::new())
        }
    };

    let queue: Arc<dyn JobQueue> = match job_queue_url {
        Some(url) => {
            let pool = sqlx::PgPool::connect(&url)
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
            Arc::new(
                PgJobQueue::connect(pool)
                    .await
                    .map_err(|e| anyhow::anyhow!(e))?,
            )
        }
        None => {
            info!("DBHUB_JOBQUEUE_URL not set, using an in-memory job queue");
            Arc::new(MemJobQueue::new())
        }
    };

    let submitter = SubmitterInstance::generate();
    let mux = ResponseMultiplexer::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(run_response_checker(
        queue.clone(),
        mux.clone(),
        submitter.0.clone(),
        shutdown_rx,
    ));

    let dispatcher = Arc::new(Dispatcher::new(queue, mux, metadata.clone(), submitter));
    let state = DbHubState::new(
        dispatcher,
        metadata,
        cli.default_node.clone(),
        Duration::from_secs(cli.wait_timeout_secs),
    );

    let request_logging_config = RequestLoggingConfig::default();
    let request_logger = Arc::new(AsyncRequestLogger::new(request_logging_config));
    let api_key_store = Arc::new(ApiKeyStore::new(std::env::var("DBHUB_API_KEYS").unwrap_or_default()));

    serve(state, &cli.address, cli.concurrency_limit, api_key_store, request_logger).await?;

    let _ = shutdown_tx.send(true);
    Ok(())
}

pub fn subscribe_log(log_path: &Option<PathBuf>, log_level: &str, _max_log: usize) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_ansi(true).with_filter(env_filter);

    if let Some(dir) = log_path {
        if let Err(e) = create_dir_all(dir) {
            eprintln!("failed to create log dir: {e}");
            return None;
        }
        let now = Utc::now();
        let filename = format!("dbhub-host-{}.log", now.format("%Y-%m-%d"));
        let file_path = dir.join(filename);
        let file = File::create(&file_path)
            .unwrap_or_else(|e| panic!("failed to create log file {file_path:?}: {e}"));
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let file_layer = fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_filter(EnvFilter::new("info"));

        tracing_subscriber::registry().with(stdout_layer).with(file_layer).init();
        Some(guard)
    } else {
        tracing_subscriber::registry().with(stdout_layer).init();
        None
    }
}
