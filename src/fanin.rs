//! Fan-in: merge multiple streams into one.
//!
//! One task per input forwards into a shared output sender; the merged
//! channel closes itself once every forwarding task's sender clone has
//! been dropped, with no separate completion signal needed.

use tokio::sync::mpsc;

/// Spawns one forwarding task per input receiver and returns a single
/// receiver carrying everything sent to any of them, in arrival order
/// across the merged stream (not a global ordering across inputs).
pub fn merge<T: Send + 'static>(inputs: Vec<mpsc::Receiver<T>>, buffer: usize) -> mpsc::Receiver<T> {
    let (out_tx, out_rx) = mpsc::channel(buffer);

    for mut input in inputs {
        let out_tx = out_tx.clone();
        tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                if out_tx.send(item).await.is_err() {
                    break;
                }
            }
        });
    }

    out_rx
}
