//! Parse stage: parses the DOM, rewrites in-scope links to their eventual
//! relative save paths, and re-serializes — all inside one synchronous call
//! per page. Only the resulting bytes and the list of in-scope child URLs
//! ever leave that call; the DOM itself (`markup5ever_rcdom`'s `Rc`-based
//! tree, never `Send`) is parsed, mutated, and dropped without an `.await`
//! in between, so it never has to survive being captured across one. That's
//! what keeps the worker's generated future `Send`, which `tokio::spawn`
//! and `fanin::merge`'s `T: Send + 'static` bound both require.
//!
//! Only pages reach this stage — assets bypass it entirely, wired that way
//! by the coordinator.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::dom::{DomError, HtmlDocument, ResourceKind};
use crate::item::{self, Page, Stage, WorkItem};
use crate::paths::relative_url;
use crate::queue::WorkQueue;
use crate::url_util;

pub struct ParseStageConfig {
    pub workers: usize,
    pub cancel: CancellationToken,
}

/// Parses `page`'s bytes, rewrites every in-scope resource reference to the
/// relative path it'll be saved at, and replaces `page.bytes` with the
/// rewritten document. Returns the in-scope children discovered, so the
/// caller can push them onto the queue once this function (and the DOM it
/// built internally) has already returned.
///
/// On a parse or serialize failure, `page` is marked `skipped_on = Parse`
/// and its bytes are left untouched; no children are returned, matching the
/// "forwarded without children, rewrite is a no-op" failure mode.
fn rewrite_page(page: &mut Page) -> Vec<(Url, ResourceKind)> {
    let bytes = page.bytes.clone().unwrap_or_default();

    let result: Result<(Vec<u8>, Vec<(Url, ResourceKind)>), DomError> = (|| {
        let doc = HtmlDocument::parse(&bytes)?;
        let base = page.url.clone();
        let own_virtual_path = page.save_path();
        let mut children = Vec::new();

        for resource in doc.enumerate_resources() {
            let Some(resolved) = url_util::normalize(&base, &resource.raw_url) else {
                continue;
            };
            if !url_util::in_scope(&resolved, &base) {
                continue;
            }

            let target_virtual_path = item::save_path_for_resource(&resolved, resource.kind);
            let rel = relative_url(&own_virtual_path, &target_virtual_path);
            doc.set_url(&resource.handle, &rel);

            children.push((resolved, resource.kind));
        }

        let rewritten = doc.serialize()?;
        Ok((rewritten, children))
    })();

    match result {
        Ok((rewritten, children)) => {
            page.bytes = Some(rewritten);
            children
        }
        Err(err) => {
            warn!(item_id = %page.url, stage = "parse", cause = %err, "parse failed, saving raw bytes");
            page.skipped_on = Some(Stage::Parse);
            Vec::new()
        }
    }
}

pub fn spawn(
    config: ParseStageConfig,
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
        let cancel = config.cancel.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let next = { input.lock().await.recv().await };
                let Some(WorkItem::Page(mut page)) = next else {
                    if next.is_some() {
                        unreachable!("only pages are routed into the parse stage");
                    }
                    break;
                };

                if cancel.is_cancelled() {
                    queue.ack();
                    continue;
                }

                let children = rewrite_page(&mut page);
                debug!(item_id = %page.url, stage = "parse", children = children.len(), "parsed");

                for (resolved, kind) in children {
                    let child = item::child_from_resource(resolved, kind);
                    queue.push(child, &cancel).await;
                }

                if output.send(WorkItem::Page(page)).await.is_err() {
                    queue.ack();
                }
            }
        }));
    }

    handles
}
