//! Save stage: writes pages and assets to disk under the output directory.
//! Link rewriting already happened in the parse stage, so this stage only
//! ever deals with plain bytes. The final `queue.ack()` for every item lives
//! here — this is the end of a work item's journey through the pipeline,
//! successful or not. An item that was already marked skipped by an earlier
//! stage is forwarded untouched, without attempting to write it; an item
//! that fails to write here is marked `skipped_on = save` and still
//! forwarded, so it still reaches the results summary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::item::{Stage, WorkItem};
use crate::queue::WorkQueue;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir { path: PathBuf, #[source] source: std::io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, #[source] source: std::io::Error },
}

pub struct SaveStageConfig {
    pub workers: usize,
    pub output_dir: PathBuf,
    pub cancel: CancellationToken,
}

/// Joins a virtual, URL-derived path (always rooted at `/`) onto the real
/// output directory.
fn on_disk_path(output_dir: &Path, virtual_path: &Path) -> PathBuf {
    let relative = virtual_path.strip_prefix("/").unwrap_or(virtual_path);
    output_dir.join(relative)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), SaveError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| SaveError::CreateDir { path: parent.to_path_buf(), source })?;
    }
    fs::write(path, bytes).await.map_err(|source| SaveError::Write { path: path.to_path_buf(), source })
}

async fn save_item(output_dir: &Path, item: &WorkItem) -> Result<(), SaveError> {
    match item {
        WorkItem::Page(page) => {
            let disk_path = on_disk_path(output_dir, &page.save_path());
            write_file(&disk_path, page.bytes.as_deref().unwrap_or(&[])).await
        }
        WorkItem::Asset(asset) => {
            let disk_path = on_disk_path(output_dir, &asset.save_path());
            write_file(&disk_path, asset.bytes.as_deref().unwrap_or(&[])).await
        }
    }
}

pub fn spawn(
    config: SaveStageConfig,
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
        let output_dir = config.output_dir.clone();
        let cancel = config.cancel.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let next = { input.lock().await.recv().await };
                let Some(mut item) = next else { break };

                if cancel.is_cancelled() {
                    queue.ack();
                    continue;
                }

                let item_id = item.item_id().to_string();

                if item.skipped_on().is_none() {
                    match save_item(&output_dir, &item).await {
                        Ok(()) => debug!(item_id = %item_id, stage = "save", "saved"),
                        Err(err) => {
                            warn!(item_id = %item_id, stage = "save", cause = %err, "save failed, forwarding as skipped");
                            item.mark_skipped(Stage::Save);
                        }
                    }
                }

                let _ = output.send(item).await;
                queue.ack();
            }
        }));
    }

    handles
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::item::{Asset, AssetKind, Page};

    #[tokio::test]
    async fn saves_an_asset_under_its_url_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut asset = Asset::new(Url::parse("https://example.com/img/logo.png").unwrap(), AssetKind::Image);
        asset.bytes = Some(b"PNGDATA".to_vec());
        let item = WorkItem::Asset(asset);

        save_item(dir.path(), &item).await.unwrap();

        let content = tokio::fs::read(dir.path().join("img/logo.png")).await.unwrap();
        assert_eq!(content, b"PNGDATA");
    }

    #[tokio::test]
    async fn saves_a_page_using_its_already_rewritten_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = Page::new(Url::parse("https://example.com/index.html").unwrap());
        page.bytes = Some(br#"<a href="./child.html">child</a>"#.to_vec());
        let item = WorkItem::Page(page);

        save_item(dir.path(), &item).await.unwrap();

        let saved = tokio::fs::read_to_string(dir.path().join("index.html")).await.unwrap();
        assert!(saved.contains(r#"href="./child.html""#));
    }

    #[tokio::test]
    async fn a_save_failure_still_forwards_the_item_marked_skipped() {
        // A regular file used as the output dir makes `create_dir_all`
        // fail reliably across platforms.
        let bogus_dir = tempfile::NamedTempFile::new().unwrap();
        let output_dir = bogus_dir.path().join("nested");

        let mut page = Page::new(Url::parse("https://example.com/index.html").unwrap());
        page.bytes = Some(b"<html></html>".to_vec());
        let mut item = WorkItem::Page(page);

        let result = save_item(&output_dir, &item).await;
        assert!(result.is_err());

        item.mark_skipped(Stage::Save);
        assert_eq!(item.skipped_on(), Some(Stage::Save));
    }

    #[tokio::test]
    async fn an_already_skipped_item_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = Page::new(Url::parse("https://example.com/gone.html").unwrap());
        page.skipped_on = Some(Stage::Download);
        let item = WorkItem::Page(page);

        assert!(item.skipped_on().is_some());
        assert!(!dir.path().join("gone.html").exists());
    }
}
