//! Request-in-flight indicator for a progress UI.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::watch;

/// Counts requests in flight and publishes whether any are active.
///
/// Every [`ProgressGuard`] settles exactly once, when it is dropped.
#[derive(Debug, Clone)]
pub struct ProgressIndicator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    in_flight: AtomicUsize,
    settled: AtomicU64,
    active: watch::Sender<bool>,
}

impl Default for ProgressIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressIndicator {
    pub fn new() -> Self {
        let (active, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                in_flight: AtomicUsize::new(0),
                settled: AtomicU64::new(0),
                active,
            }),
        }
    }

    pub fn start(&self) -> ProgressGuard {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        self.inner.publish();
        ProgressGuard {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn is_active(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Total number of requests that have settled.
    pub fn settled_count(&self) -> u64 {
        self.inner.settled.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.active.subscribe()
    }
}

impl Inner {
    fn publish(&self) {
        // Recompute inside the closure so concurrent start/settle calls can't
        // publish a stale value.
        self.active.send_if_modified(|active| {
            let now = self.in_flight.load(Ordering::SeqCst) > 0;
            if *active == now {
                false
            } else {
                *active = now;
                true
            }
        });
    }
}

#[must_use = "the request settles when the guard is dropped"]
#[derive(Debug)]
pub struct ProgressGuard {
    inner: Arc<Inner>,
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.settled.fetch_add(1, Ordering::SeqCst);
        self.inner.publish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_once_per_guard() {
        let progress = ProgressIndicator::new();
        let rx = progress.subscribe();

        let a = progress.start();
        let b = progress.start();
        assert!(progress.is_active());
        assert!(*rx.borrow());

        drop(a);
        assert_eq!(progress.in_flight(), 1);
        assert!(*rx.borrow());

        drop(b);
        assert!(!progress.is_active());
        assert!(!*rx.borrow());
        assert_eq!(progress.settled_count(), 2);
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let progress = ProgressIndicator::new();
        let mut rx = progress.subscribe();

        let guard = progress.start();
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());

        drop(guard);
        rx.changed().await.unwrap();
        assert!(!*rx.borrow_and_update());
    }
}
