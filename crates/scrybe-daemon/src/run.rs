//! Top-level daemon lifecycle (§5 "independent tasks coordinating
//! through bounded queues and an event bus"; teacher's
//! `run_daemon_process` + `run_unified_daemon` shape): acquire the
//! single-instance lock, bootstrap the shared context, spin up one
//! background task per concern under a shared shutdown signal, and wait
//! for either a task to exit or a termination signal.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use scrybe_config::AppConfig;
use scrybe_types::ScrybeError;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::anchor::run_anchor_loop;
use crate::capture_task::run_capture_loop;
use crate::context::RuntimeContext;
use crate::extract_task::run_extract_loop;
use crate::lockfile::InstanceLock;
use crate::query_socket::run_query_socket;
use crate::retention_stream::RetentionEventStream;

/// Installs a rotating daily log file under `log_dir`, the same
/// `tracing-appender` setup the teacher's CLI entry point performs
/// before dispatching into `run_daemon_process`.
fn init_logging(log_dir: &std::path::Path, log_level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "scrybe-daemon.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking).with_ansi(false).init();
    guard
}

#[cfg(unix)]
async fn wait_for_termination() -> Result<(), ScrybeError> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| ScrybeError::RecoveryRequired(format!("installing SIGTERM handler: {e}")))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| ScrybeError::RecoveryRequired(format!("installing SIGINT handler: {e}")))?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_termination() -> Result<(), ScrybeError> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| ScrybeError::RecoveryRequired(format!("waiting for ctrl_c: {e}")))
}

/// Runs the daemon to completion: returns once every background task
/// has observed shutdown and the query socket file has been removed.
pub async fn run_daemon(config: AppConfig, data_root: PathBuf) -> Result<(), ScrybeError> {
    let _guard = init_logging(std::path::Path::new(&config.daemon.log_dir), &config.daemon.log_level);
    let _lock = InstanceLock::acquire(data_root.join("run"))?;

    let ctx = Arc::new(RuntimeContext::bootstrap(config.clone(), data_root.clone()).await?);
    let retention_stream =
        Arc::new(RetentionEventStream::open(data_root.join("retention_events.jsonl")).await?);

    let trace_log = Arc::new(scrybe_query::QueryTraceLog::open(data_root.join("query_trace.jsonl")).await?);
    let orchestrator =
        Arc::new(scrybe_query::QueryOrchestrator::new(ctx.store.clone(), config.query.clone(), trace_log));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let capture_handle = tokio::spawn(run_capture_loop(
        ctx.clone(),
        "primary".to_string(),
        retention_stream.clone(),
        shutdown_rx.clone(),
    ));

    let anchor_handle = tokio::spawn(run_anchor_loop(
        ctx.store.clone(),
        data_root.join("ledger_anchors.jsonl"),
        Duration::from_secs(config.store.anchor_interval_s.max(1)),
        shutdown_rx.clone(),
    ));

    let extract_handle = tokio::spawn(run_extract_loop(ctx.clone(), shutdown_rx.clone()));

    let telemetry_handle = {
        let governor = ctx.governor.clone();
        let interval = Duration::from_secs_f64(config.governor.telemetry_sample_interval_s.max(0.1));
        let mut shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_ok() && *shutdown.borrow() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        governor.sample_telemetry();
                    }
                }
            }
        })
    };

    let socket_path = PathBuf::from(&config.daemon.socket_path);
    let query_handle = tokio::spawn(async move {
        if let Err(e) = run_query_socket(orchestrator, socket_path, shutdown_rx.clone()).await {
            tracing::error!(error = %e, "query socket task exited with an error");
        }
    });

    let daemon_tasks = async {
        tokio::try_join!(
            flatten(capture_handle),
            flatten(anchor_handle),
            flatten(extract_handle),
            flatten(telemetry_handle),
            flatten(query_handle),
        )
    };

    tokio::select! {
        result = daemon_tasks => {
            result?;
        }
        result = wait_for_termination() => {
            result?;
            let _ = shutdown_tx.send(true);
        }
    }

    // Give spawned tasks a moment to observe the shutdown signal and
    // unwind (socket removal, final anchor flush) before returning.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}

async fn flatten<T>(handle: tokio::task::JoinHandle<T>) -> Result<(), ScrybeError>
where
    T: Send + 'static,
{
    handle.await.map_err(|e| ScrybeError::RecoveryRequired(format!("daemon task panicked: {e}")))?;
    Ok(())
}
