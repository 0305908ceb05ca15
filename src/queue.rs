//! The central Work Queue: deduplicates by URL, enforces the page budget,
//! fans admitted items onto two output streams, and closes both exactly
//! once all outstanding work has drained. Separate output channels for
//! pages and assets let each have its own concurrency pool downstream; an
//! explicit `outstanding` counter makes sure assets alone, with no pages in
//! flight, don't leave the queue live forever.
//!
//! The one rule this module is built around: **the internal mutex is never
//! held across a channel send.** `std::sync::Mutex` guards only the
//! dedup/budget bookkeeping; sends happen after the guard is dropped. Without
//! that discipline, a full channel could block a `Push` call while a parse
//! worker that needs to drain that same channel waits on the queue's lock —
//! a deadlock in the parse → queue → fetch → parse feedback cycle.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::item::WorkItem;

struct State {
    seen: HashSet<String>,
    pages_admitted: usize,
}

/// Outcome of a [`WorkQueue::push`] call, used for logging and tests.
#[derive(Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Admitted,
    AlreadySeen,
    BudgetExhausted,
    Cancelled,
}

pub struct WorkQueue {
    state: Mutex<State>,
    max_pages: usize,
    outstanding: AtomicUsize,
    closed: AtomicBool,
    pages_tx: Mutex<Option<mpsc::Sender<WorkItem>>>,
    assets_tx: Mutex<Option<mpsc::Sender<WorkItem>>>,
}

impl WorkQueue {
    pub fn new(max_pages: usize, pages_tx: mpsc::Sender<WorkItem>, assets_tx: mpsc::Sender<WorkItem>) -> Self {
        Self {
            state: Mutex::new(State { seen: HashSet::new(), pages_admitted: 0 }),
            max_pages,
            outstanding: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            pages_tx: Mutex::new(Some(pages_tx)),
            assets_tx: Mutex::new(Some(assets_tx)),
        }
    }

    /// Registers `item` as outstanding and dispatches it onto the
    /// appropriate stream, unless it's a duplicate or (for pages) the budget
    /// is already exhausted. Asset pushes are never budget-limited: only
    /// page count is bounded.
    ///
    /// The send itself races against `cancel`: a full channel would
    /// otherwise block this call indefinitely, and cancellation must be
    /// respected even while blocked on backpressure. A cancelled push acks
    /// its own outstanding slot and returns [`PushOutcome::Cancelled`]
    /// rather than delivering the item.
    pub async fn push(&self, item: WorkItem, cancel: &CancellationToken) -> PushOutcome {
        let id = item.item_id().to_string();
        let is_page = item.is_page();

        let decision = {
            let mut state = self.state.lock().expect("queue mutex poisoned");
            if state.seen.contains(&id) {
                PushOutcome::AlreadySeen
            } else if is_page && state.pages_admitted >= self.max_pages {
                PushOutcome::BudgetExhausted
            } else {
                state.seen.insert(id);
                if is_page {
                    state.pages_admitted += 1;
                }
                PushOutcome::Admitted
            }
        };

        if decision != PushOutcome::Admitted {
            return decision;
        }

        self.outstanding.fetch_add(1, Ordering::SeqCst);

        // Clone the sender out and drop the lock before awaiting the send:
        // holding a std::sync::Mutex guard across an await point is both a
        // lint violation and, for this queue specifically, the exact
        // deadlock the module's built around avoiding.
        let sender = {
            let guard = if is_page { self.pages_tx.lock() } else { self.assets_tx.lock() };
            guard.expect("queue mutex poisoned").clone()
        };

        let Some(tx) = sender else {
            // Channel already closed (shutdown in progress): undo the
            // outstanding bump so close-on-drain still fires correctly.
            self.ack();
            return PushOutcome::Admitted;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                self.ack();
                PushOutcome::Cancelled
            }
            result = tx.send(item) => {
                if result.is_err() {
                    self.ack();
                }
                PushOutcome::Admitted
            }
        }
    }

    /// Marks one outstanding item as finished. When this drops the
    /// outstanding count to zero, closes both output channels exactly once
    /// (guarded by `closed`) by dropping their last `Sender` handle —
    /// pipeline stages then see `recv() -> None` and wind down.
    pub fn ack(&self) {
        let remaining = self.outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && !self.closed.swap(true, Ordering::SeqCst) {
            self.pages_tx.lock().expect("queue mutex poisoned").take();
            self.assets_tx.lock().expect("queue mutex poisoned").take();
        }
    }

    pub fn pages_admitted(&self) -> usize {
        self.state.lock().expect("queue mutex poisoned").pages_admitted
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::item::Page;

    fn page(url: &str) -> WorkItem {
        WorkItem::Page(Page::new(Url::parse(url).unwrap()))
    }

    #[tokio::test]
    async fn admits_each_distinct_url_once() {
        let (pages_tx, mut pages_rx) = mpsc::channel(8);
        let (assets_tx, _assets_rx) = mpsc::channel(8);
        let queue = WorkQueue::new(10, pages_tx, assets_tx);
        let cancel = CancellationToken::new();

        assert_eq!(queue.push(page("https://example.com/a"), &cancel).await, PushOutcome::Admitted);
        assert_eq!(queue.push(page("https://example.com/a"), &cancel).await, PushOutcome::AlreadySeen);
        assert!(pages_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn rejects_pages_once_the_budget_is_exhausted() {
        let (pages_tx, mut pages_rx) = mpsc::channel(8);
        let (assets_tx, _assets_rx) = mpsc::channel(8);
        let queue = WorkQueue::new(1, pages_tx, assets_tx);
        let cancel = CancellationToken::new();

        assert_eq!(queue.push(page("https://example.com/a"), &cancel).await, PushOutcome::Admitted);
        assert_eq!(queue.push(page("https://example.com/b"), &cancel).await, PushOutcome::BudgetExhausted);
        assert_eq!(queue.pages_admitted(), 1);
        pages_rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn ack_balance_closes_exactly_once_at_zero_outstanding() {
        let (pages_tx, mut pages_rx) = mpsc::channel(8);
        let (assets_tx, _assets_rx) = mpsc::channel(8);
        let queue = WorkQueue::new(10, pages_tx, assets_tx);
        let cancel = CancellationToken::new();

        queue.push(page("https://example.com/a"), &cancel).await;
        queue.push(page("https://example.com/b"), &cancel).await;
        assert!(!queue.is_closed());

        queue.ack();
        assert!(!queue.is_closed());
        queue.ack();
        assert!(queue.is_closed());

        pages_rx.recv().await.unwrap();
        pages_rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn a_cancelled_push_acks_its_own_slot_and_does_not_deliver() {
        // Channel of capacity 1, already full, so the second push would
        // otherwise block forever on backpressure.
        let (pages_tx, mut pages_rx) = mpsc::channel(1);
        let (assets_tx, _assets_rx) = mpsc::channel(8);
        let queue = WorkQueue::new(10, pages_tx, assets_tx);
        let cancel = CancellationToken::new();

        assert_eq!(queue.push(page("https://example.com/a"), &cancel).await, PushOutcome::Admitted);

        cancel.cancel();
        assert_eq!(queue.push(page("https://example.com/b"), &cancel).await, PushOutcome::Cancelled);
        assert!(!queue.is_closed());

        queue.ack();
        assert!(queue.is_closed());

        pages_rx.recv().await.unwrap();
    }
}
