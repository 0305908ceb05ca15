//! Fetch stage: downloads bytes for each work item and forwards it
//! downstream. One worker pool per track (pages, assets); `N` tasks pull
//! from a single shared `mpsc::Receiver` behind an async mutex. Retries go
//! through [`crate::retry`], classified by [`crate::http_client::FetchError::is_retryable`]
//! so 4xx responses and cancellation fail fast instead of burning every
//! attempt. An item that exhausts its retries is still forwarded, marked
//! `skipped_on = download`, so it reaches the results summary rather than
//! vanishing silently.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::http_client::{FetchError, Fetcher};
use crate::item::{Stage, WorkItem};
use crate::queue::WorkQueue;
use crate::retry::retry;

pub struct FetchStageConfig {
    pub workers: usize,
    pub fetcher: Fetcher,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
    pub cancel: CancellationToken,
}

pub fn spawn(
    config: FetchStageConfig,
    input: mpsc::Receiver<WorkItem>,
    output: mpsc::Sender<WorkItem>,
    queue: Arc<WorkQueue>,
) -> Vec<JoinHandle<()>> {
    let input = Arc::new(Mutex::new(input));
    let mut handles = Vec::with_capacity(config.workers);

    for _ in 0..config.workers {
        let input = input.clone();
        let output = output.clone();
        let queue = queue.clone();
        let fetcher = config.fetcher.clone();
        let cancel = config.cancel.clone();
        let attempts = config.retry_attempts;
        let delay = config.retry_delay;

        handles.push(tokio::spawn(async move {
            loop {
                let next = { input.lock().await.recv().await };
                let Some(mut item) = next else { break };

                if cancel.is_cancelled() {
                    queue.ack();
                    continue;
                }

                let url = item.item_id().to_string();
                let result =
                    retry(attempts, delay, &cancel, FetchError::is_retryable, || fetcher.fetch(&url, &cancel)).await;

                match result {
                    Ok(bytes) => {
                        debug!(item_id = %url, stage = "download", "fetched");
                        item.set_bytes(bytes);
                    }
                    Err(err) => {
                        warn!(item_id = %url, stage = "download", cause = %err, "fetch failed, forwarding as skipped");
                        item.mark_skipped(Stage::Download);
                    }
                }

                if output.send(item).await.is_err() {
                    queue.ack();
                }
            }
        }));
    }

    handles
}
