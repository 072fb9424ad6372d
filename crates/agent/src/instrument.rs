//! Per-call instrumentation for agent entry points.

use acontext_core::outcome::Outcome;
use std::future::Future;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// Run `fut` inside a span carrying a fresh `process_id`, logging start,
/// finish and elapsed time. A failed outcome is logged with its kind and
/// returned untouched.
pub async fn track_process<T, F>(name: &'static str, fut: F) -> Outcome<T>
where
    F: Future<Output = Outcome<T>>,
{
    let process_id = Uuid::new_v4();
    let span = info_span!("process", %process_id, name);

    async move {
        let started = Instant::now();
        info!("Process started");
        let outcome = fut.await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome.error() {
            None => info!(elapsed_ms, "Process finished"),
            Some(failure) => warn!(
                elapsed_ms,
                kind = %failure.kind,
                error = %failure.message,
                "Process failed"
            ),
        }
        outcome
    }
    .instrument(span)
    .await
}
