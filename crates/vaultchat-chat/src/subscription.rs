//! Live subscription handles.
//!
//! Every subscription is a background pump task feeding a `watch`
//! channel with full snapshots. The service owns the pump through a
//! [`SubscriptionGuard`] (dropping the guard aborts the task); callers
//! hold the receiving [`Subscription`] end.

use futures_util::Stream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Owns a pump task; aborts it on drop. Replacing a guard in the
/// service's registry is how stale listeners are disposed.
#[derive(Debug)]
pub struct SubscriptionGuard {
    handle: JoinHandle<()>,
}

impl SubscriptionGuard {
    pub(crate) fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A live, restartable view of some resource: the latest full snapshot
/// plus notification of the next one.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: watch::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> Subscription<T> {
    pub(crate) fn new(rx: watch::Receiver<T>) -> Self {
        Self { rx }
    }

    /// The latest snapshot.
    pub fn current(&self) -> T {
        self.rx.borrow().clone()
    }

    /// Wait for the next snapshot. Returns `false` once the subscription
    /// has been disposed and no further updates will arrive. Intermediate
    /// snapshots may coalesce; only the latest is observable.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Consume the handle as a stream of snapshots, starting with the
    /// current one.
    pub fn into_stream(mut self) -> impl Stream<Item = T> {
        async_stream::stream! {
            yield self.rx.borrow_and_update().clone();
            while self.rx.changed().await.is_ok() {
                yield self.rx.borrow_and_update().clone();
            }
        }
    }
}
