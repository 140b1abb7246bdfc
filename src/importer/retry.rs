use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Run `op` until it succeeds or fails permanently.
///
/// A transient error (per `is_transient`) sleeps `delay` and tries
/// again, without an attempt limit: network flakiness against the wiki
/// can go on for a long time, and bounding the run is the operator's
/// job (see the interrupt handling in the batch driver). Any other
/// error is returned immediately.
pub async fn retry<T, E, F, Fut>(
    mut op: F,
    is_transient: impl Fn(&E) -> bool,
    delay: Duration,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) => {
                warn!("Transient error, retrying in {delay:?}: {err}");
                sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}
