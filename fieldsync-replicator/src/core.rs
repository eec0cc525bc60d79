use std::process::ExitCode;
use std::time::Duration;

use fieldsync::audit::CompletenessAuditor;
use fieldsync::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use fieldsync::mirror::{CapturingDestination, CollectionTags, MirrorWorker, RetryWorker};
use fieldsync::monitor::{StatusMonitor, mirror_status};
use fieldsync::pipeline::{RunOptions, SyncPipeline};
use fieldsync::report::RunReport;
use fieldsync::store::destination::DestinationStore;
use fieldsync_config::shared::FieldsyncConfig;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

use crate::cli::{Command, MonitorArgs, RetryArgs, SyncArgs, VerifyArgs};
use crate::error::{ReplicatorError, ReplicatorResult};
use crate::output::{print_audit, print_monitor, print_report, print_retry};
use crate::stores::{CheckpointBackend, StagingBackend, Stores};

/// Runs `command` and maps its outcome to the process exit code.
pub async fn run_command(
    config: FieldsyncConfig,
    command: Command,
    json: bool,
) -> ReplicatorResult<ExitCode> {
    info!(pipeline = %config.pipeline.name, source_tag = %config.pipeline.source_tag, "starting");
    fieldsync::metrics::register_metrics();

    let stores = Stores::from_config(&config).await?;

    match command {
        Command::Sync(args) => sync(&config, stores, args, json).await,
        Command::VerifyCompleteness(args) => verify_completeness(&config, stores, args, json).await,
        Command::Monitor(args) => monitor(&config, stores, args, json).await,
        Command::RetryMirror(args) => retry_mirror(&config, stores, args, json).await,
    }
}

async fn sync(
    config: &FieldsyncConfig,
    stores: Stores,
    args: SyncArgs,
    json: bool,
) -> ReplicatorResult<ExitCode> {
    let mut options = RunOptions::from_config(&config.sync);
    if args.max_pages.is_some() {
        options.max_pages = args.max_pages;
    }
    if let Some(secs) = args.max_runtime_secs {
        options.max_runtime = Some(Duration::from_secs(secs));
    }
    options.dry_run = args.dry_run;

    let Stores {
        staging,
        destination,
        checkpoints,
        warehouse,
    } = stores;

    let report = match warehouse {
        Some(warehouse) if !options.dry_run => {
            let (destination, events) =
                CapturingDestination::wrap(destination, CollectionTags::from(&config.pipeline));
            let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
            let mirror = tokio::spawn(MirrorWorker::new(warehouse, events).run(shutdown_rx));

            let report = run_pipeline(config, staging, destination, checkpoints, &options).await;

            // Dropping the pipeline closed the event channel, so the worker drains and exits.
            shutdown_tx.shutdown();
            match mirror.await {
                Ok(summary) => info!(
                    applied = summary.applied,
                    failed = summary.failed,
                    unrecorded = summary.unrecorded,
                    "mirror worker finished"
                ),
                Err(err) => error!(error = %err, "mirror worker task failed"),
            }

            report?
        }
        _ => run_pipeline(config, staging, destination, checkpoints, &options).await?,
    };

    let Some(report) = report else {
        return Ok(ExitCode::FAILURE);
    };

    let report_dir = args.report_dir.unwrap_or_else(|| config.sync.report_dir.clone());
    let paths = report.write_to(&report_dir).await?;
    print_report(&report, &paths, json)?;

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Runs the pipeline until it stops by itself or a termination signal arrives.
///
/// Returns [`None`] when interrupted. Committed batches and completed pages are kept
/// in the checkpoint, so the next run resumes where this one stopped.
async fn run_pipeline<D>(
    config: &FieldsyncConfig,
    staging: StagingBackend,
    destination: D,
    checkpoints: CheckpointBackend,
    options: &RunOptions,
) -> ReplicatorResult<Option<RunReport>>
where
    D: DestinationStore + Clone + Send + Sync,
{
    let pipeline = SyncPipeline::new(config, staging, destination, checkpoints)?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        report = pipeline.run(options) => Ok(Some(report?)),
        _ = tokio::signal::ctrl_c() => {
            warn!("sigint (ctrl+c) received, sync interrupted");
            Ok(None)
        }
        _ = sigterm.recv() => {
            warn!("sigterm received, sync interrupted");
            Ok(None)
        }
    }
}

async fn verify_completeness(
    config: &FieldsyncConfig,
    stores: Stores,
    args: VerifyArgs,
    json: bool,
) -> ReplicatorResult<ExitCode> {
    let sample = args.sample.unwrap_or(config.sync.audit_sample_size);
    let auditor = CompletenessAuditor::new(config, stores.staging, stores.destination);

    let report = auditor.audit(sample).await?;
    print_audit(&report, json)?;

    Ok(if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn monitor(
    config: &FieldsyncConfig,
    stores: Stores,
    args: MonitorArgs,
    json: bool,
) -> ReplicatorResult<ExitCode> {
    let monitor = StatusMonitor::new(
        stores.destination.clone(),
        stores.checkpoints,
        config.pipeline.name.clone(),
        config.pipeline.source_tag.clone(),
    );
    let mut status = monitor.snapshot().await?;
    if let Some(warehouse) = &stores.warehouse {
        status = status.with_mirror(mirror_status(warehouse).await?);
    }

    let estimate = if args.estimate {
        let auditor = CompletenessAuditor::new(config, stores.staging, stores.destination);
        Some(auditor.estimate(config.sync.audit_sample_size).await?)
    } else {
        None
    };

    print_monitor(&status, estimate.as_ref(), json)?;

    Ok(ExitCode::SUCCESS)
}

async fn retry_mirror(
    config: &FieldsyncConfig,
    stores: Stores,
    args: RetryArgs,
    json: bool,
) -> ReplicatorResult<ExitCode> {
    let Some(warehouse) = stores.warehouse else {
        return Err(ReplicatorError::config(std::io::Error::other(
            "retry-mirror needs a `warehouse` store in the configuration",
        )));
    };

    let worker = RetryWorker::new(
        stores.destination,
        warehouse,
        CollectionTags::from(&config.pipeline),
        config.mirror.clone(),
    );

    let summary = if args.watch {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let signals = tokio::spawn(forward_signals(shutdown_tx));
        let summary = worker.run(shutdown_rx).await;
        signals.abort();
        summary?
    } else {
        worker.run_pass().await?
    };

    print_retry(&summary, json)?;

    Ok(ExitCode::SUCCESS)
}

/// Requests shutdown on the first SIGINT or SIGTERM.
async fn forward_signals(shutdown_tx: ShutdownTx) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(err) => {
            warn!(error = %err, "failed to register sigterm handler");
            let _ = tokio::signal::ctrl_c().await;
            shutdown_tx.shutdown();
            return;
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("sigint (ctrl+c) received, shutting down"),
        _ = sigterm.recv() => info!("sigterm received, shutting down"),
    }

    shutdown_tx.shutdown();
}
