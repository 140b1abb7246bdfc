use super::retry::retry;
use crate::vendor::{ParsedIssue, SourceClient, VendorError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tracing::warn;

/// Worker count for issue fetching within one character, a compromise
/// between import time and being a polite wiki citizen.
pub const DEFAULT_WORKERS: usize = 10;

/// Fetch and parse every link, with a bounded worker pool.
///
/// Exactly one result is produced per link. A link whose fetch fails
/// permanently yields a blank sentinel instead of being dropped, so
/// shutdown of the pool stays decoupled from error handling: the
/// caller always gets `links.len()` results back and skips the blanks
/// itself.
pub async fn fetch_all(
    client: Arc<dyn SourceClient>,
    links: Vec<String>,
    workers: usize,
    retry_delay: Duration,
) -> Vec<ParsedIssue> {
    let n = links.len();
    if n == 0 {
        return Vec::new();
    }
    // Both channels are sized to the batch, so neither filling the work
    // queue up front nor a slow caller can wedge a worker.
    let (work_tx, work_rx) = mpsc::channel::<String>(n);
    let (result_tx, mut result_rx) = mpsc::channel::<ParsedIssue>(n);
    for link in links {
        if work_tx.send(link).await.is_err() {
            break;
        }
    }
    drop(work_tx);

    let work_rx = Arc::new(Mutex::new(work_rx));
    for _ in 0..workers.clamp(1, n) {
        let work_rx = Arc::clone(&work_rx);
        let result_tx = result_tx.clone();
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            loop {
                let link = work_rx.lock().await.recv().await;
                let Some(link) = link else { break };
                let parsed = match retry(
                    || client.fetch_issue(&link),
                    VendorError::is_transient,
                    retry_delay,
                )
                .await
                {
                    Ok(issue) => issue,
                    Err(err) => {
                        warn!("Giving up on issue {link}: {err}");
                        ParsedIssue::blank()
                    }
                };
                if result_tx.send(parsed).await.is_err() {
                    break;
                }
            }
        });
    }
    drop(result_tx);

    let mut results = Vec::with_capacity(n);
    while let Some(issue) = result_rx.recv().await {
        results.push(issue);
    }
    results
}
