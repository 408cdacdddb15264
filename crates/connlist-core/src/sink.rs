// ── Change sink ──
//
// The observer side of a projection. A view, counter or filter that
// mirrors the list implements `ChangeSink` and receives every structural
// edit as a begin/end pair, one region at a time.

use serde::Serialize;

/// Receiver of structural change notifications.
///
/// Every method defaults to a no-op so observers implement only what
/// they render. Between a `begin_*` and its `end_*` the list is being
/// mutated; another region never opens before the current one closes.
/// `begin_move` reports the final index of the moved run in `to`.
pub trait ChangeSink {
    fn begin_insert(&mut self, _index: usize, _count: usize) {}
    fn end_insert(&mut self) {}

    fn begin_move(&mut self, _from: usize, _count: usize, _to: usize) {}
    fn end_move(&mut self) {}

    fn begin_remove(&mut self, _index: usize, _count: usize) {}
    fn end_remove(&mut self) {}

    /// Attributes at `index` may have changed; its position did not.
    fn touched(&mut self, _index: usize) {}

    fn count_changed(&mut self, _count: usize) {}
}

impl<S: ChangeSink + ?Sized> ChangeSink for &mut S {
    fn begin_insert(&mut self, index: usize, count: usize) {
        (**self).begin_insert(index, count);
    }
    fn end_insert(&mut self) {
        (**self).end_insert();
    }
    fn begin_move(&mut self, from: usize, count: usize, to: usize) {
        (**self).begin_move(from, count, to);
    }
    fn end_move(&mut self) {
        (**self).end_move();
    }
    fn begin_remove(&mut self, index: usize, count: usize) {
        (**self).begin_remove(index, count);
    }
    fn end_remove(&mut self) {
        (**self).end_remove();
    }
    fn touched(&mut self, index: usize) {
        (**self).touched(index);
    }
    fn count_changed(&mut self, count: usize) {
        (**self).count_changed(count);
    }
}

impl<S: ChangeSink + ?Sized> ChangeSink for Box<S> {
    fn begin_insert(&mut self, index: usize, count: usize) {
        (**self).begin_insert(index, count);
    }
    fn end_insert(&mut self) {
        (**self).end_insert();
    }
    fn begin_move(&mut self, from: usize, count: usize, to: usize) {
        (**self).begin_move(from, count, to);
    }
    fn end_move(&mut self) {
        (**self).end_move();
    }
    fn begin_remove(&mut self, index: usize, count: usize) {
        (**self).begin_remove(index, count);
    }
    fn end_remove(&mut self) {
        (**self).end_remove();
    }
    fn touched(&mut self, index: usize) {
        (**self).touched(index);
    }
    fn count_changed(&mut self, count: usize) {
        (**self).count_changed(count);
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ChangeSink for NullSink {}

// ── Recording sink ──────────────────────────────────────────────────

/// A completed notification as seen by a [`RecordingSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SinkEvent {
    Inserted { index: usize, count: usize },
    Moved { from: usize, count: usize, to: usize },
    Removed { index: usize, count: usize },
    Touched { index: usize },
    CountChanged { count: usize },
}

/// Records notifications and checks the single-writer discipline.
///
/// Regions are recorded when they close. A `begin_*` while another region
/// is open, an `end_*` that does not match the open region, or a touch
/// inside a region is logged as a violation instead of panicking.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<SinkEvent>,
    in_flight: Option<SinkEvent>,
    violations: Vec<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SinkEvent] {
        &self.events
    }

    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Number of insert/move/remove regions recorded.
    pub fn structural_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    SinkEvent::Inserted { .. } | SinkEvent::Moved { .. } | SinkEvent::Removed { .. }
                )
            })
            .count()
    }

    /// Drain recorded events, keeping violations.
    pub fn take_events(&mut self) -> Vec<SinkEvent> {
        std::mem::take(&mut self.events)
    }

    fn open(&mut self, event: SinkEvent) {
        if let Some(current) = self.in_flight.replace(event) {
            self.violations
                .push(format!("{event:?} opened while {current:?} in flight"));
        }
    }

    fn close(&mut self, expected: fn(&SinkEvent) -> bool, what: &str) {
        match self.in_flight.take() {
            Some(event) if expected(&event) => self.events.push(event),
            Some(event) => self
                .violations
                .push(format!("end_{what} closed mismatched {event:?}")),
            None => self.violations.push(format!("end_{what} without begin")),
        }
    }

    fn outside_region(&mut self, what: &str) {
        if let Some(current) = self.in_flight {
            self.violations
                .push(format!("{what} emitted inside {current:?}"));
        }
    }
}

impl ChangeSink for RecordingSink {
    fn begin_insert(&mut self, index: usize, count: usize) {
        self.open(SinkEvent::Inserted { index, count });
    }

    fn end_insert(&mut self) {
        self.close(|e| matches!(e, SinkEvent::Inserted { .. }), "insert");
    }

    fn begin_move(&mut self, from: usize, count: usize, to: usize) {
        self.open(SinkEvent::Moved { from, count, to });
    }

    fn end_move(&mut self) {
        self.close(|e| matches!(e, SinkEvent::Moved { .. }), "move");
    }

    fn begin_remove(&mut self, index: usize, count: usize) {
        self.open(SinkEvent::Removed { index, count });
    }

    fn end_remove(&mut self) {
        self.close(|e| matches!(e, SinkEvent::Removed { .. }), "remove");
    }

    fn touched(&mut self, index: usize) {
        self.outside_region("touch");
        self.events.push(SinkEvent::Touched { index });
    }

    fn count_changed(&mut self, count: usize) {
        self.outside_region("count change");
        self.events.push(SinkEvent::CountChanged { count });
    }
}
