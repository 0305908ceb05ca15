//! Property-based checks for the queue's dedup/budget invariants and the
//! purity of the save-path mapping, generating many small inputs rather
//! than hand-picking cases.

use proptest::prelude::*;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;
use webmirror::item::{Page, WorkItem};
use webmirror::paths::resolve_save_path;
use webmirror::queue::{PushOutcome, WorkQueue};

fn urls_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,6}", 1..40)
}

proptest! {
    /// However many times a URL is pushed, it's admitted exactly once.
    #[test]
    fn duplicate_urls_are_admitted_exactly_once(segments in urls_strategy(), repeats in 1usize..5) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let (pages_tx, mut pages_rx) = mpsc::channel(1024);
            let (assets_tx, _assets_rx) = mpsc::channel(1024);
            let queue = WorkQueue::new(usize::MAX, pages_tx, assets_tx);
            let cancel = CancellationToken::new();

            let mut admitted = 0;
            for segment in &segments {
                let url = Url::parse(&format!("https://example.com/{segment}")).unwrap();
                for _ in 0..repeats {
                    let outcome = queue.push(WorkItem::Page(Page::new(url.clone())), &cancel).await;
                    if outcome == PushOutcome::Admitted {
                        admitted += 1;
                    }
                }
            }

            let distinct: std::collections::HashSet<_> = segments.iter().collect();
            prop_assert_eq!(admitted, distinct.len());

            let mut received = 0;
            while pages_rx.try_recv().is_ok() {
                received += 1;
            }
            prop_assert_eq!(received, distinct.len());
            Ok(())
        })?;
    }

    /// Never more than `max_pages` pages are admitted, regardless of
    /// how many distinct URLs are offered.
    #[test]
    fn page_admissions_never_exceed_the_budget(segments in urls_strategy(), max_pages in 1usize..10) {
        tokio::runtime::Runtime::new().unwrap().block_on(async {
            let (pages_tx, mut pages_rx) = mpsc::channel(1024);
            let (assets_tx, _assets_rx) = mpsc::channel(1024);
            let queue = WorkQueue::new(max_pages, pages_tx, assets_tx);
            let cancel = CancellationToken::new();

            let distinct: std::collections::HashSet<_> = segments.iter().collect();
            for segment in &distinct {
                let url = Url::parse(&format!("https://example.com/{segment}")).unwrap();
                queue.push(WorkItem::Page(Page::new(url)), &cancel).await;
            }

            prop_assert!(queue.pages_admitted() <= max_pages);

            let mut received = 0;
            while pages_rx.try_recv().is_ok() {
                received += 1;
            }
            prop_assert_eq!(received, queue.pages_admitted());
            Ok(())
        })?;
    }

    /// The save-path mapping is a pure function of the URL.
    #[test]
    fn save_path_mapping_is_pure(path_segment in "[a-z0-9/_-]{0,40}") {
        let url = Url::parse(&format!("https://example.com/{path_segment}")).unwrap();
        let a = resolve_save_path(&url, "index", "html");
        let b = resolve_save_path(&url, "index", "html");
        prop_assert_eq!(a, b);
    }
}
