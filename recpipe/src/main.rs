mod cli;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use recpipe::logging::{self, LOG_RETENTION_DAYS};
use recpipe::{
    CleanupJob, InMemoryCatalog, JobManager, PostProcessConfig, Recording, RecordingInfo,
    SegmentCleaner, Worker,
};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::cli::{Args, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let (log_config, _guard) = logging::init_logging(args.log_dir.as_deref())?;
    if let Some(filter) = args.log_filter.as_deref() {
        log_config.set_filter(filter)?;
    }
    debug!(filter = %log_config.get_filter(), "Logging initialized");

    if let Some(dir) = log_config.log_dir() {
        if let Err(e) = logging::cleanup_old_logs(dir, LOG_RETENTION_DAYS).await {
            warn!(error = %e, "Failed to cleanup old logs");
        }
    }

    let config = Arc::new(load_config(args.config.as_deref())?);

    match args.command {
        Commands::Run {
            pipeline,
            recording,
        } => {
            let text = std::fs::read_to_string(&recording)
                .with_context(|| format!("reading {}", recording.display()))?;
            let info: RecordingInfo = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", recording.display()))?;
            let recording = Arc::new(Recording::from(info));

            let manager = JobManager::new();
            let worker = Worker::new(pipeline.as_str(), pipeline, config, manager.clone());
            let handle = worker.work(recording.clone());

            let event = tokio::select! {
                event = handle => event?,
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping");
                    worker.stop();
                    manager.shutdown();
                    anyhow::bail!("interrupted");
                }
            };

            let report = json!({
                "event": event,
                "metadata": recording.metadata(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);

            if !event.success {
                return Ok(ExitCode::FAILURE);
            }
        }

        Commands::Cleanup { catalog, once } => {
            let catalog = Arc::new(InMemoryCatalog::from_file(&catalog)?);

            if once {
                let cleaner =
                    SegmentCleaner::new(catalog, config.segments.clone(), &config.cleanup);
                match cleaner.run_once(chrono::Utc::now()).await {
                    Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                    None => info!("Recorder active, nothing cleaned"),
                }
                return Ok(ExitCode::SUCCESS);
            }

            if !config.cleanup.enabled {
                info!("Cleanup disabled in configuration");
                return Ok(ExitCode::SUCCESS);
            }

            let manager = JobManager::new();
            let (job, _interval) =
                CleanupJob::from_config(catalog, config.segments.clone(), &config.cleanup);
            let container = manager.get_container(job);
            container.start()?;
            info!("Segment cleanup running, press Ctrl-C to stop");

            tokio::signal::ctrl_c().await?;
            manager.shutdown();
            container.join().await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PostProcessConfig> {
    let mut config = match path {
        Some(path) => PostProcessConfig::from_file(path)?,
        None => PostProcessConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
