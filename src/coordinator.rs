//! Builds the pipeline graph, seeds the crawl, and drives it to completion.
//!
//! Wires up buffered channels (`B = 2 * max_concurrent`), starts each
//! stage's worker pool, seeds the start page, then drains the results
//! stream while logging progress. Budget enforcement itself lives in
//! [`crate::queue::WorkQueue`] (admission is rejected once the page budget
//! is reached), so this loop only has to observe and log, not police the
//! count.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::fanin;
use crate::http_client::Fetcher;
use crate::item::{Page, WorkItem};
use crate::pipeline::{fetch, parse, save};
use crate::queue::WorkQueue;

#[derive(Debug, Default)]
pub struct Summary {
    pub pages_completed: usize,
    pub assets_completed: usize,
}

/// Installs a `CancellationToken` that fires on SIGINT/SIGTERM.
fn install_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate.recv() => {}
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        cancel.cancel();
    });
}

pub async fn run(config: Config) -> anyhow::Result<Summary> {
    let cancel = CancellationToken::new();
    install_signal_handler(cancel.clone());

    let buffer = config.max_concurrent * 2;

    let (page_queue_tx, page_queue_rx) = mpsc::channel(buffer);
    let (asset_queue_tx, asset_queue_rx) = mpsc::channel(buffer);
    let (downloaded_pages_tx, downloaded_pages_rx) = mpsc::channel(buffer);
    let (downloaded_assets_tx, downloaded_assets_rx) = mpsc::channel(buffer);
    let (parsed_pages_tx, parsed_pages_rx) = mpsc::channel(buffer);
    let (results_tx, mut results_rx) = mpsc::channel(buffer);

    let queue = Arc::new(WorkQueue::new(config.max_count, page_queue_tx, asset_queue_tx));

    let fetcher = Fetcher::new(config.timeout).context("failed to build HTTP client")?;

    let mut handles = Vec::new();
    handles.extend(fetch::spawn(
        fetch::FetchStageConfig {
            workers: config.max_concurrent,
            fetcher: fetcher.clone(),
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
            cancel: cancel.clone(),
        },
        page_queue_rx,
        downloaded_pages_tx,
        queue.clone(),
    ));
    handles.extend(fetch::spawn(
        fetch::FetchStageConfig {
            workers: config.max_concurrent,
            fetcher,
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay,
            cancel: cancel.clone(),
        },
        asset_queue_rx,
        downloaded_assets_tx,
        queue.clone(),
    ));
    handles.extend(parse::spawn(
        parse::ParseStageConfig { workers: config.max_concurrent, cancel: cancel.clone() },
        downloaded_pages_rx,
        parsed_pages_tx,
        queue.clone(),
    ));

    let save_input = fanin::merge(vec![parsed_pages_rx, downloaded_assets_rx], buffer);
    handles.extend(save::spawn(
        save::SaveStageConfig {
            workers: config.max_concurrent,
            output_dir: config.output_dir.clone(),
            cancel: cancel.clone(),
        },
        save_input,
        results_tx,
        queue.clone(),
    ));

    queue.push(WorkItem::Page(Page::new(config.start_url.clone())), &cancel).await;

    let started_at = Instant::now();
    let mut summary = Summary::default();

    while let Some(item) = results_rx.recv().await {
        let skipped_on = item.skipped_on();
        match item {
            WorkItem::Page(_) => {
                summary.pages_completed += 1;
                match skipped_on {
                    None => info!(
                        pages = summary.pages_completed,
                        budget = config.max_count,
                        "page saved"
                    ),
                    Some(stage) => warn!(
                        pages = summary.pages_completed,
                        budget = config.max_count,
                        skipped_on = %stage,
                        "page skipped"
                    ),
                }
            }
            WorkItem::Asset(_) => {
                summary.assets_completed += 1;
                if let Some(stage) = skipped_on {
                    warn!(assets = summary.assets_completed, skipped_on = %stage, "asset skipped");
                }
            }
        }
    }

    for handle in handles {
        let _ = handle.await;
    }

    info!(
        elapsed = ?started_at.elapsed(),
        pages = summary.pages_completed,
        assets = summary.assets_completed,
        "crawl complete"
    );

    Ok(summary)
}
