//! Timing helpers.

use std::future::Future;
use std::time::Instant;
use tracing::debug;

/// Run a closure and log how long it took under `label`.
pub fn measure_time<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    debug!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "{label} finished"
    );
    result
}

pub async fn measure_time_async<F, T>(label: &str, f: F) -> T
where
    F: Future<Output = T>,
{
    let start = Instant::now();
    let result = f.await;
    debug!(
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "{label} finished"
    );
    result
}
