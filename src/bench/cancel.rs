//! Cooperative cancellation flag
//!
//! Set from the signal handling task, polled by the scheduler between
//! iterations. Never interrupts an engine call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

/// Shared stop flag; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    flag: Arc<AtomicBool>,
}

impl CancellationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Returns `true` only for the call that set the flag.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Cancel `signal` for every interrupt received on `interrupts`.
///
/// Runs until the sending side is dropped. Interrupts after the first are
/// accepted and ignored. Returns how many interrupts arrived.
pub async fn forward_interrupts(signal: CancellationSignal, mut interrupts: mpsc::Receiver<()>) -> usize {
    let mut received = 0;
    while interrupts.recv().await.is_some() {
        received += 1;
        if signal.cancel() {
            info!("Interrupt received, stopping test gracefully...");
        } else {
            debug!(received, "interrupt received while already stopping");
        }
    }
    received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_idempotent() {
        let signal = CancellationSignal::new();
        assert!(!signal.is_cancelled());
        assert!(signal.cancel());
        assert!(!signal.cancel());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = CancellationSignal::new();
        let handler_side = signal.clone();
        let handle = std::thread::spawn(move || handler_side.cancel());
        assert!(handle.join().unwrap());
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_forward_interrupts_is_idempotent() {
        let signal = CancellationSignal::new();
        let (tx, rx) = mpsc::channel(4);
        let forwarder = tokio::spawn(forward_interrupts(signal.clone(), rx));

        tx.send(()).await.unwrap();
        tx.send(()).await.unwrap();
        tx.send(()).await.unwrap();
        drop(tx);

        assert_eq!(forwarder.await.unwrap(), 3);
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_forward_without_interrupts_leaves_flag_clear() {
        let signal = CancellationSignal::new();
        let (tx, rx) = mpsc::channel::<()>(1);
        drop(tx);
        assert_eq!(forward_interrupts(signal.clone(), rx).await, 0);
        assert!(!signal.is_cancelled());
    }
}
