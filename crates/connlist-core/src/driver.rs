// ── Projection driver ──
//
// Background task that owns a projection and applies backend events to
// it one at a time, so every edit script is complete before the next
// event is looked at.

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::projection::Projection;
use crate::sink::ChangeSink;
use crate::source::{BackendEvent, EntitySource};

/// Feeds backend events into a [`Projection`] until cancelled.
pub struct ProjectionDriver<S: EntitySource + ?Sized, K: ChangeSink> {
    projection: Projection<S, K>,
    events: broadcast::Receiver<BackendEvent>,
    cancel: CancellationToken,
}

impl<S, K> ProjectionDriver<S, K>
where
    S: EntitySource + ?Sized + 'static,
    K: ChangeSink + Send + 'static,
{
    /// Subscribe to the projection's source. Events fired after this call
    /// are not missed, even if the task starts later.
    pub fn new(projection: Projection<S, K>, cancel: CancellationToken) -> Self {
        let events = projection.source().subscribe();
        Self {
            projection,
            events,
            cancel,
        }
    }

    /// Refresh once, then apply events until cancelled or the source
    /// closes its channel. Returns the projection for inspection.
    pub async fn run(mut self) -> Projection<S, K> {
        self.projection.refresh();
        info!(scope = %self.projection.config().scope(), "projection driver started");

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                result = self.events.recv() => {
                    match result {
                        Ok(event) => {
                            debug!(?event, "backend event");
                            self.projection.handle_event(&event);
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            // Missed events are all "something changed"; one refresh covers them.
                            warn!(skipped, "event receiver lagged, refreshing");
                            self.projection.refresh();
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }

        info!("projection driver stopped");
        self.projection
    }

    pub fn spawn(self) -> JoinHandle<Projection<S, K>> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::ProjectionConfig;
    use crate::model::{Service, Technology};
    use crate::sink::RecordingSink;
    use crate::store::ServiceRegistry;

    fn wifi(name: &str) -> Service {
        Service::new(format!("/net/connman/service/wifi_{name}"), name, "wifi")
    }

    #[tokio::test]
    async fn applies_events_until_cancelled() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.set_technologies(vec![Technology::new("wifi")]);
        registry.apply_snapshot(vec![wifi("b")]);

        let projection = Projection::new(
            Arc::clone(&registry),
            ProjectionConfig::technology("wifi").with_sort(true),
            RecordingSink::new(),
        );
        let mut snapshots = projection.subscribe();
        let cancel = CancellationToken::new();
        let handle = ProjectionDriver::new(projection, cancel.clone()).spawn();

        // Initial refresh.
        let snap = tokio::time::timeout(Duration::from_secs(5), snapshots.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snap.len(), 1);

        registry.upsert_service(wifi("a"));
        let snap = tokio::time::timeout(Duration::from_secs(5), snapshots.changed())
            .await
            .unwrap()
            .unwrap();
        let names: Vec<&str> = snap.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        cancel.cancel();
        let projection = handle.await.unwrap();
        assert_eq!(projection.count(), 2);
        assert!(projection.sink().violations().is_empty());
    }

    #[tokio::test]
    async fn cancelled_driver_still_refreshes_once() {
        let registry = Arc::new(ServiceRegistry::new());
        registry.apply_snapshot(vec![wifi("a").with_saved(true), wifi("b")]);
        let projection = Projection::unobserved(Arc::clone(&registry), ProjectionConfig::saved(""));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let projection = ProjectionDriver::new(projection, cancel).run().await;
        assert_eq!(projection.count(), 1);
    }
}
