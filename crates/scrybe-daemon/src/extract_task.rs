//! Stage-2 drain loop (C6, §4.6): the independent task that actually
//! runs the extractor pipeline the governor admits/denies (§5 "the
//! Stage-2 worker pool ... run as independent tasks"). Scans for
//! Stage-1-complete frames missing a derived record from each
//! registered Stage-2 manifest, submits them to
//! [`scrybe_extract::ExtractWorkerPool`], and feeds observed throughput
//! back into the lag estimator so the pool's parallelism cap can grow
//! under pressure (§4.6 "Throughput guard").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use scrybe_extract::{lag_is_warning, pending_jobs, ExtractOutcome};
use tokio::sync::watch;

use crate::context::RuntimeContext;

/// Runs until `shutdown` fires. Every `config.retention.extract_scan_interval_s`
/// it re-scans each registered Stage-2 manifest for pending work and
/// submits a batch; admission/preemption inside the pool already defers
/// to the governor, so this loop's own job is purely discovery plus the
/// lag feedback.
pub async fn run_extract_loop(ctx: Arc<RuntimeContext>, mut shutdown: watch::Receiver<bool>) {
    let interval = Duration::from_secs(ctx.config.retention.extract_scan_interval_s.max(1));
    let lookback_us = (ctx.config.retention.horizon_hours as i64).saturating_mul(3_600_000_000);

    let processed_total = AtomicU64::new(0);
    let mut last_tick = tokio::time::Instant::now();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_ok() && *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {
                let now_utc = chrono::Utc::now().timestamp_micros();
                let time_range = now_utc.saturating_sub(lookback_us)..now_utc;

                let manifests = ctx.plugin_host.stage2_manifests();
                let mut batch_total = 0usize;
                for manifest in &manifests {
                    let jobs = match pending_jobs(&ctx.store, manifest, time_range.clone()) {
                        Ok(jobs) => jobs,
                        Err(e) => {
                            tracing::warn!(error = %e, plugin_id = %manifest.plugin_id, "stage-2 scan failed");
                            continue;
                        }
                    };
                    if jobs.is_empty() {
                        continue;
                    }
                    batch_total += jobs.len();

                    let outcomes = ctx.extract_pool.submit_batch(jobs, manifest).await;
                    let completed =
                        outcomes.iter().filter(|o| matches!(o, ExtractOutcome::Computed(_) | ExtractOutcome::Reused(_))).count();
                    processed_total.fetch_add(completed as u64, Ordering::Relaxed);

                    for outcome in &outcomes {
                        if let ExtractOutcome::Failed(e) = outcome {
                            tracing::warn!(error = %e, plugin_id = %manifest.plugin_id, "stage-2 job failed terminally");
                        }
                    }
                }

                let elapsed_s = last_tick.elapsed().as_secs_f64().max(0.001);
                last_tick = tokio::time::Instant::now();
                let throughput_per_s = processed_total.swap(0, Ordering::Relaxed) as f64 / elapsed_s;
                if lag_is_warning(batch_total as u64, throughput_per_s, &ctx.config.retention) {
                    ctx.extract_pool.request_more_parallelism();
                }
            }
        }
    }
}
