//! Capture + Stage-1 pipeline task (C2 -> C3, §5 "the capture scheduler
//! ... and the Stage-1 writer ... run as independent tasks"; per-frame
//! ordering: capture -> Stage-1 record writes -> completion marker ->
//! retention marker").

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use scrybe_capture::CaptureScheduler;
use scrybe_ingest::{Stage1Normalizer, UiaInput};
use tokio::sync::watch;

use crate::context::RuntimeContext;
use crate::retention_stream::RetentionEventStream;

/// Drive one capture source's ACTIVE/IDLE cadence until `shutdown`
/// fires. `segment_id` names the logical monitor/window this loop
/// covers; a daemon with multiple segments runs one of these per
/// segment.
pub async fn run_capture_loop(
    ctx: Arc<RuntimeContext>,
    segment_id: String,
    retention_stream: Arc<RetentionEventStream>,
    mut shutdown: watch::Receiver<bool>,
) {
    let scheduler = CaptureScheduler::new(
        ctx.activity_signal.clone(),
        ctx.capture_source.clone(),
        ctx.thumbnailer.clone(),
        ctx.config.capture.clone(),
        segment_id.clone(),
    );
    let normalizer = Stage1Normalizer::new(ctx.store.clone(), ctx.run_id, ctx.config.retention.horizon_hours);
    let frame_ordinal = AtomicU64::new(0);

    loop {
        let interval = scheduler.interval();
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_ok() && *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(interval) => {
                ctx.governor.update_capture_mode(scheduler.mode());

                match scheduler.attempt().await {
                    Ok(Some(candidate)) => {
                        let frame_index = frame_ordinal.fetch_add(1, Ordering::Relaxed);
                        let ts_utc = chrono::Utc::now().timestamp_micros();
                        // No UIA observation or Stage-1 plugin integration ships in
                        // this workspace (§1 Non-goals); every frame is ingested
                        // with an absent UIA ref and zero plugin attempts, which
                        // the completeness gate treats as trivially complete.
                        match normalizer
                            .ingest_frame(candidate, frame_index, ts_utc, 0, UiaInput::absent(), Vec::new())
                            .await
                        {
                            Ok(outcome) if outcome.retention_eligible => {
                                retention_stream
                                    .emit(&outcome.frame_id, "ok", ctx.config.retention.horizon_hours)
                                    .await;
                            }
                            Ok(_) => {}
                            Err(e) => tracing::warn!(error = %e, segment_id = %segment_id, "stage1 ingest failed"),
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, segment_id = %segment_id, "capture attempt failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrybe_config::{AppConfig, StoreConfig};
    use std::time::Duration;

    #[tokio::test]
    async fn capture_loop_stops_on_shutdown_signal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.store = StoreConfig { data_dir: dir.path().join("data").to_string_lossy().to_string(), ..Default::default() };
        config.capture.active_interval_s = 0.001;
        config.capture.idle_interval_s = 0.001;

        let ctx = Arc::new(RuntimeContext::bootstrap(config, dir.path().to_path_buf()).await.unwrap());
        let retention_stream =
            Arc::new(RetentionEventStream::open(dir.path().join("retention_events.jsonl")).await.unwrap());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_capture_loop(ctx, "seg-0".to_string(), retention_stream, rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
