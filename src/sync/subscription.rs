// Live-query subscriptions over the store's change feed.
// A subscription delivers a full current snapshot immediately, then a fresh
// full snapshot after every relevant store change — never deltas. Bursts are
// coalesced so a slow consumer only ever sees the latest state.

use std::future::Future;

use log::{debug, warn};
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::Stream;

use crate::error::{SyncError, SyncResult};
use crate::store::Collection;

/// One delivery on a live subscription.
#[derive(Debug, Clone)]
pub enum SubscriptionEvent<T> {
    /// The complete current ordered result set of the query.
    Snapshot(Vec<T>),
    /// Terminal: the underlying watch failed. No further events follow and
    /// the subscription has already released its watch resources.
    Error(SyncError),
}

/// A cancellable live query handle.
///
/// Dropping the subscription cancels it. `cancel` is idempotent and
/// guarantees that no event is delivered after it returns.
pub struct Subscription<T> {
    rx: mpsc::Receiver<SubscriptionEvent<T>>,
    abort: Option<AbortHandle>,
    cancelled: bool,
}

impl<T> Subscription<T> {
    /// Wait for the next snapshot or terminal error. Returns `None` once the
    /// subscription has ended (cancelled, or after a terminal error was
    /// consumed).
    pub async fn recv(&mut self) -> Option<SubscriptionEvent<T>> {
        if self.cancelled {
            return None;
        }
        self.rx.recv().await
    }

    /// Stop delivery and release the underlying watch. Safe to call more
    /// than once; only the first call does anything.
    pub fn cancel(&mut self) {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if let Some(abort) = &self.abort {
            abort.abort();
        }
        self.rx.close();
        debug!("subscription cancelled");
    }

    /// Consume the subscription as a `Stream` of events. Cancellation then
    /// happens by dropping the stream.
    pub fn into_stream(mut self) -> impl Stream<Item = SubscriptionEvent<T>> {
        // Hand the pump task over to the stream guard so dropping `self`
        // at the end of this call leaves it running.
        let abort = self.abort.take();
        let rx = std::mem::replace(&mut self.rx, mpsc::channel(1).1);
        StreamGuard {
            inner: ReceiverStream::new(rx),
            abort,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

struct StreamGuard<T> {
    inner: ReceiverStream<SubscriptionEvent<T>>,
    abort: Option<AbortHandle>,
}

impl<T> Stream for StreamGuard<T> {
    type Item = SubscriptionEvent<T>;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        std::pin::Pin::new(&mut self.get_mut().inner).poll_next(cx)
    }
}

impl<T> Drop for StreamGuard<T> {
    fn drop(&mut self) {
        if let Some(abort) = &self.abort {
            abort.abort();
        }
    }
}

/// Spawn the pump task for a live query.
///
/// `query` computes the full ordered result set; it is re-run after every
/// change event whose collection tag is in `watched`. The delivery channel
/// has capacity one and queued change events are drained before each re-run,
/// which together give the coalescing guarantee: while the consumer is busy,
/// intermediate snapshots are skipped, never queued.
pub(crate) fn subscribe_query<T, F, Fut>(
    changes: broadcast::Receiver<Collection>,
    watched: Vec<Collection>,
    query: F,
) -> Subscription<T>
where
    T: Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = SyncResult<Vec<T>>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);

    let task = tokio::spawn(pump(changes, watched, query, tx));

    Subscription {
        rx,
        abort: Some(task.abort_handle()),
        cancelled: false,
    }
}

async fn pump<T, F, Fut>(
    mut changes: broadcast::Receiver<Collection>,
    watched: Vec<Collection>,
    query: F,
    tx: mpsc::Sender<SubscriptionEvent<T>>,
) where
    F: Fn() -> Fut,
    Fut: Future<Output = SyncResult<Vec<T>>>,
{
    // Full current snapshot immediately on subscribe.
    if !run_and_send(&query, &tx).await {
        return;
    }

    loop {
        match changes.recv().await {
            Ok(collection) => {
                if !watched.contains(&collection) {
                    continue;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Fell behind the change feed; the full re-query below
                // covers whatever was missed.
                debug!("change feed lagged by {} events, re-querying", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("store change feed closed, ending subscription");
                let _ = tx
                    .send(SubscriptionEvent::Error(SyncError::Transient(
                        "store change feed closed".to_string(),
                    )))
                    .await;
                return;
            }
        }

        // Coalesce: drain everything already queued, then query once.
        loop {
            match changes.try_recv() {
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }

        if !run_and_send(&query, &tx).await {
            return;
        }
    }
}

/// Run the query once and deliver the result. Returns false when the
/// subscription should end (consumer gone, or terminal query error).
async fn run_and_send<T, F, Fut>(query: &F, tx: &mpsc::Sender<SubscriptionEvent<T>>) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = SyncResult<Vec<T>>>,
{
    match query().await {
        Ok(snapshot) => tx.send(SubscriptionEvent::Snapshot(snapshot)).await.is_ok(),
        Err(e) => {
            warn!("live query failed, ending subscription: {}", e);
            let _ = tx.send(SubscriptionEvent::Error(e)).await;
            false
        }
    }
}
