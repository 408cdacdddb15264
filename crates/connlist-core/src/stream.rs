// ── Projection snapshot streams ──
//
// Subscription type for consumers that want the whole ordered list after
// each refresh instead of individual edits.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Service;

/// Attributes of a projection's services, in projection order, frozen at
/// the moment the refresh finished.
pub type ProjectionSnapshot = Arc<Vec<Arc<Service>>>;

/// A subscription to one projection's ordered list.
///
/// Provides both point-in-time snapshot access and change notification
/// via [`changed`](Self::changed) or by converting to a `Stream`.
pub struct ProjectionStream {
    current: ProjectionSnapshot,
    receiver: watch::Receiver<ProjectionSnapshot>,
}

impl ProjectionStream {
    pub(crate) fn new(receiver: watch::Receiver<ProjectionSnapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// The snapshot captured at creation or at the last `changed()`.
    pub fn current(&self) -> &ProjectionSnapshot {
        &self.current
    }

    /// The latest published snapshot.
    pub fn latest(&self) -> ProjectionSnapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next refresh, returning its snapshot.
    /// Returns `None` once the projection has been dropped.
    pub async fn changed(&mut self) -> Option<ProjectionSnapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Convert into a `Stream` yielding each published snapshot.
    pub fn into_stream(self) -> ProjectionWatchStream {
        ProjectionWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct ProjectionWatchStream {
    inner: WatchStream<ProjectionSnapshot>,
}

impl Stream for ProjectionWatchStream {
    type Item = ProjectionSnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
