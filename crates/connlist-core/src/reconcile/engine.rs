// ── Reconciliation engine ──
//
// Transforms the held ordered sequence into a fresh snapshot in a single
// forward pass, announcing every positional change to a `ChangeSink`.

use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};

use tracing::{debug, trace, warn};

use super::Identified;
use super::edit::StructuralEdit;
use crate::ordering::{OrderingPolicy, stable_sort_by};
use crate::sink::ChangeSink;

/// Owns one projection's ordered sequence of handles.
///
/// The engine never touches entity attributes; it only decides where each
/// handle sits. Calls are serialized by `&mut self`, so an observer never
/// sees two edits in flight.
#[derive(Debug)]
pub struct Reconciler<T: Identified> {
    items: Vec<T>,
}

impl<T: Identified> Default for Reconciler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Identified> Reconciler<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Position of `key`, by linear scan.
    pub fn position(&self, key: &T::Key) -> Option<usize> {
        self.items.iter().position(|item| item.key() == key)
    }

    /// Bring the held sequence in line with `snapshot`.
    ///
    /// With a policy the snapshot is stably sorted first; without one its
    /// arrival order is the target and entities that disappeared are
    /// pruned up front. Duplicate identities keep their first occurrence.
    /// Returns the applied edit script.
    pub fn reconcile<P, S>(
        &mut self,
        snapshot: Vec<T>,
        policy: Option<&P>,
        sink: &mut S,
    ) -> Vec<StructuralEdit<T::Key>>
    where
        P: OrderingPolicy + ?Sized,
        T::View: Borrow<P::Item>,
        S: ChangeSink + ?Sized,
    {
        let old_len = self.items.len();
        let target = self.prepare(snapshot, policy);
        let mut edits = Vec::new();

        if policy.is_none() {
            let wanted: HashSet<&T::Key> = target.iter().map(|item| item.key()).collect();
            self.prune_absent(&wanted, sink, &mut edits);
        }

        let new_len = target.len();
        for (i, item) in target.into_iter().enumerate() {
            // Everything before `i` is settled, so only the tail can match.
            let found = self.items[i..]
                .iter()
                .position(|held| held.key() == item.key())
                .map(|offset| offset + i);

            match found {
                None => {
                    let key = item.key().clone();
                    sink.begin_insert(i, 1);
                    self.items.insert(i, item);
                    sink.end_insert();
                    trace!(index = i, ?key, "inserted");
                    edits.push(StructuralEdit::Insert { at: i, key });
                }
                Some(j) if j != i => {
                    sink.begin_move(j, 1, i);
                    self.items.remove(j);
                    self.items.insert(i, item);
                    sink.end_move();
                    trace!(from = j, to = i, "moved");
                    edits.push(StructuralEdit::Move { from: j, to: i });
                }
                Some(_) => {
                    // Same identity, same slot: adopt the fresh handle.
                    self.items[i] = item;
                    sink.touched(i);
                    edits.push(StructuralEdit::Touch { index: i });
                }
            }
        }

        let len = self.items.len();
        if len > new_len {
            let count = len - new_len;
            sink.begin_remove(new_len, count);
            self.items.truncate(new_len);
            sink.end_remove();
            trace!(from = new_len, count, "removed trailing");
            edits.push(StructuralEdit::Remove {
                from: new_len,
                count,
            });
        }

        if self.items.len() != old_len {
            sink.count_changed(self.items.len());
        }

        debug!(
            old_len,
            new_len,
            structural = edits.iter().filter(|e| e.is_structural()).count(),
            touched = edits.iter().filter(|e| !e.is_structural()).count(),
            "reconciled"
        );
        edits
    }

    /// Remove everything, announcing a single removal.
    pub fn clear<S: ChangeSink + ?Sized>(&mut self, sink: &mut S) -> Vec<StructuralEdit<T::Key>> {
        let count = self.items.len();
        if count == 0 {
            return Vec::new();
        }
        sink.begin_remove(0, count);
        self.items.clear();
        sink.end_remove();
        sink.count_changed(0);
        vec![StructuralEdit::Remove { from: 0, count }]
    }

    /// Drop duplicate identities and apply the ordering policy.
    ///
    /// Before sorting, entities already held are laid out in held order
    /// and newcomers follow in arrival order, so equivalent elements keep
    /// their previous relative order whatever order the source reports.
    fn prepare<P>(&self, snapshot: Vec<T>, policy: Option<&P>) -> Vec<T>
    where
        P: OrderingPolicy + ?Sized,
        T::View: Borrow<P::Item>,
    {
        let mut seen = HashSet::with_capacity(snapshot.len());
        let mut unique = Vec::with_capacity(snapshot.len());
        for item in snapshot {
            if seen.insert(item.key().clone()) {
                unique.push(item);
            } else {
                warn!(key = ?item.key(), "duplicate identity in snapshot, keeping first");
            }
        }

        let Some(policy) = policy else {
            return unique;
        };

        let held: HashMap<&T::Key, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| (item.key(), index))
            .collect();
        let (mut known, fresh): (Vec<T>, Vec<T>) = unique
            .into_iter()
            .partition(|item| held.contains_key(item.key()));
        known.sort_by_key(|item| held.get(item.key()).copied().unwrap_or(usize::MAX));
        known.extend(fresh);

        // Freeze attributes so the order cannot shift under the sort.
        let staged: Vec<(T, T::View)> = known
            .into_iter()
            .map(|item| {
                let view = item.view();
                (item, view)
            })
            .collect();
        stable_sort_by(staged, |(_, a), (_, b)| {
            policy.compare(Borrow::<P::Item>::borrow(a), Borrow::<P::Item>::borrow(b))
        })
        .into_iter()
        .map(|(item, _)| item)
        .collect()
    }

    /// Remove held items absent from the target, one run at a time from
    /// the back so earlier indices stay valid.
    fn prune_absent<S: ChangeSink + ?Sized>(
        &mut self,
        wanted: &HashSet<&T::Key>,
        sink: &mut S,
        edits: &mut Vec<StructuralEdit<T::Key>>,
    ) {
        let mut end = self.items.len();
        while end > 0 {
            if wanted.contains(self.items[end - 1].key()) {
                end -= 1;
                continue;
            }
            let mut start = end - 1;
            while start > 0 && !wanted.contains(self.items[start - 1].key()) {
                start -= 1;
            }
            let count = end - start;
            sink.begin_remove(start, count);
            self.items.drain(start..end);
            sink.end_remove();
            trace!(from = start, count, "pruned");
            edits.push(StructuralEdit::Remove { from: start, count });
            end = start;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cmp::Ordering;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Service, ServiceRef, ServiceState};
    use crate::ordering::{GroupedOrder, PlainOrder};
    use crate::reconcile::replay;
    use crate::sink::{RecordingSink, SinkEvent};

    // ── Test doubles ─────────────────────────────────────────────────

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Row {
        key: &'static str,
        rank: u32,
    }

    fn row(key: &'static str, rank: u32) -> Row {
        Row { key, rank }
    }

    impl Identified for Row {
        type Key = &'static str;
        type View = Row;

        fn key(&self) -> &&'static str {
            &self.key
        }

        fn view(&self) -> Row {
            self.clone()
        }
    }

    struct ByRank;

    impl OrderingPolicy for ByRank {
        type Item = Row;

        fn compare(&self, a: &Row, b: &Row) -> Ordering {
            a.rank.cmp(&b.rank)
        }
    }

    const UNSORTED: Option<&ByRank> = None;

    fn keys<T: Identified>(engine: &Reconciler<T>) -> Vec<T::Key> {
        engine.items().iter().map(|i| i.key().clone()).collect()
    }

    fn svc(name: &str, available: bool, strength: u8) -> ServiceRef {
        ServiceRef::new(
            0,
            Service::new(format!("/s/{name}"), name, "wifi")
                .with_available(available)
                .with_strength(strength),
        )
    }

    /// Reconcile and check the script replays onto the old keys.
    fn step<T, P>(
        engine: &mut Reconciler<T>,
        snapshot: Vec<T>,
        policy: Option<&P>,
        sink: &mut RecordingSink,
    ) -> Vec<StructuralEdit<T::Key>>
    where
        T: Identified,
        P: OrderingPolicy,
        T::View: Borrow<P::Item>,
    {
        let mut shadow = keys(engine);
        let edits = engine.reconcile(snapshot, policy, sink);
        replay(&edits, &mut shadow).unwrap();
        assert_eq!(shadow, keys(engine));
        assert!(sink.violations().is_empty(), "{:?}", sink.violations());
        edits
    }

    fn paths(engine: &Reconciler<ServiceRef>) -> Vec<String> {
        engine
            .items()
            .iter()
            .map(|s| s.path().as_str().to_owned())
            .collect()
    }

    // ── Scenarios ────────────────────────────────────────────────────

    #[test]
    fn stronger_service_moves_to_front() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let a = svc("A", true, 80);
        let b = svc("B", true, 50);
        step(&mut engine, vec![a.clone(), b.clone()], Some(&PlainOrder), &mut sink);
        assert_eq!(paths(&engine), vec!["/s/A", "/s/B"]);

        b.store(Service::new("/s/B", "B", "wifi").with_strength(90));
        let edits = step(&mut engine, vec![b, a], Some(&PlainOrder), &mut sink);

        assert_eq!(
            edits,
            vec![
                StructuralEdit::Move { from: 1, to: 0 },
                StructuralEdit::Touch { index: 1 },
            ]
        );
        assert_eq!(paths(&engine), vec!["/s/B", "/s/A"]);
    }

    #[test]
    fn vanished_middle_entity_is_removed_from_tail() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let (a, b, c) = (svc("A", true, 0), svc("B", true, 0), svc("C", true, 0));
        step(&mut engine, vec![a.clone(), b, c.clone()], Some(&PlainOrder), &mut sink);

        let edits = step(&mut engine, vec![a, c], Some(&PlainOrder), &mut sink);
        assert_eq!(
            edits,
            vec![
                StructuralEdit::Touch { index: 0 },
                StructuralEdit::Move { from: 2, to: 1 },
                StructuralEdit::Remove { from: 2, count: 1 },
            ]
        );
        assert_eq!(paths(&engine), vec!["/s/A", "/s/C"]);
    }

    #[test]
    fn empty_list_receives_inserts_in_order() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let edits = step(
            &mut engine,
            vec![svc("Y", true, 0), svc("X", true, 0)],
            Some(&PlainOrder),
            &mut sink,
        );
        assert_eq!(
            edits,
            vec![
                StructuralEdit::Insert {
                    at: 0,
                    key: "/s/X".into()
                },
                StructuralEdit::Insert {
                    at: 1,
                    key: "/s/Y".into()
                },
            ]
        );
        assert_eq!(
            sink.events(),
            &[
                SinkEvent::Inserted { index: 0, count: 1 },
                SinkEvent::Inserted { index: 1, count: 1 },
                SinkEvent::CountChanged { count: 2 },
            ]
        );
    }

    #[test]
    fn grouped_order_moves_newly_managed_ahead() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let a = svc("A", true, 0);
        let b = svc("B", true, 0);
        b.store(Service::new("/s/B", "B", "wifi").with_managed(true));
        step(&mut engine, vec![a.clone(), b.clone()], Some(&GroupedOrder), &mut sink);
        assert_eq!(paths(&engine), vec!["/s/B", "/s/A"]);

        a.store(Service::new("/s/A", "A", "wifi").with_managed(true));
        b.store(Service::new("/s/B", "B", "wifi").with_managed(false));
        let edits = step(&mut engine, vec![a, b], Some(&GroupedOrder), &mut sink);
        assert!(edits.contains(&StructuralEdit::Move { from: 1, to: 0 }));
        assert_eq!(paths(&engine), vec!["/s/A", "/s/B"]);
    }

    // ── Properties ───────────────────────────────────────────────────

    #[test]
    fn second_pass_with_same_snapshot_only_touches() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let snapshot = vec![row("c", 3), row("a", 1), row("b", 2)];
        step(&mut engine, snapshot.clone(), Some(&ByRank), &mut sink);
        sink.take_events();

        let edits = step(&mut engine, snapshot, Some(&ByRank), &mut sink);
        assert!(edits.iter().all(|e| !e.is_structural()));
        assert_eq!(sink.structural_count(), 0);
        assert!(
            !sink
                .events()
                .iter()
                .any(|e| matches!(e, SinkEvent::CountChanged { .. }))
        );
    }

    #[test]
    fn empty_snapshot_is_one_removal() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        step(&mut engine, vec![row("a", 1), row("b", 2)], Some(&ByRank), &mut sink);
        sink.take_events();

        let edits = step(&mut engine, Vec::new(), Some(&ByRank), &mut sink);
        assert_eq!(edits, vec![StructuralEdit::Remove { from: 0, count: 2 }]);
        assert_eq!(
            sink.events(),
            &[
                SinkEvent::Removed { index: 0, count: 2 },
                SinkEvent::CountChanged { count: 0 },
            ]
        );

        let edits = step(&mut engine, Vec::new(), Some(&ByRank), &mut sink);
        assert!(edits.is_empty());
    }

    #[test]
    fn unchanged_positions_are_only_touched() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        step(&mut engine, vec![row("a", 1), row("b", 2)], Some(&ByRank), &mut sink);

        let edits = step(
            &mut engine,
            vec![row("a", 1), row("b", 2), row("c", 3)],
            Some(&ByRank),
            &mut sink,
        );
        assert_eq!(
            edits,
            vec![
                StructuralEdit::Touch { index: 0 },
                StructuralEdit::Touch { index: 1 },
                StructuralEdit::Insert { at: 2, key: "c" },
            ]
        );
    }

    #[test]
    fn attribute_change_keeps_identity() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let a = svc("A", true, 0);
        let b = svc("B", true, 0);
        step(&mut engine, vec![a.clone(), b.clone()], Some(&PlainOrder), &mut sink);

        b.store(
            Service::new("/s/B", "B", "wifi")
                .with_strength(0)
                .with_state(ServiceState::Online),
        );
        let edits = step(&mut engine, vec![b, a], Some(&PlainOrder), &mut sink);
        assert_eq!(
            edits,
            vec![
                StructuralEdit::Touch { index: 0 },
                StructuralEdit::Touch { index: 1 },
            ]
        );
        assert_eq!(paths(&engine), vec!["/s/A", "/s/B"]);
    }

    #[test]
    fn fresh_handle_replaces_held_one() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        step(&mut engine, vec![svc("A", true, 0)], Some(&PlainOrder), &mut sink);

        let replacement = svc("A", false, 0);
        step(&mut engine, vec![replacement.clone()], Some(&PlainOrder), &mut sink);
        assert!(engine.get(0).unwrap().same_entry(&replacement));
    }

    #[test]
    fn duplicate_identity_keeps_first() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let edits = step(
            &mut engine,
            vec![row("a", 5), row("b", 2), row("a", 1)],
            Some(&ByRank),
            &mut sink,
        );
        assert_eq!(keys(&engine), vec!["b", "a"]);
        assert_eq!(edits.len(), 2);
        assert_eq!(engine.get(1).unwrap().rank, 5);
    }

    #[test]
    fn unsorted_removal_prunes_without_moves() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        step(
            &mut engine,
            vec![row("a", 0), row("b", 0), row("c", 0), row("d", 0)],
            UNSORTED,
            &mut sink,
        );

        let edits = step(
            &mut engine,
            vec![row("a", 0), row("d", 0), row("e", 0)],
            UNSORTED,
            &mut sink,
        );
        assert_eq!(
            edits,
            vec![
                StructuralEdit::Remove { from: 1, count: 2 },
                StructuralEdit::Touch { index: 0 },
                StructuralEdit::Touch { index: 1 },
                StructuralEdit::Insert { at: 2, key: "e" },
            ]
        );
    }

    #[test]
    fn unsorted_prune_handles_separate_runs() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        step(
            &mut engine,
            vec![row("a", 0), row("b", 0), row("c", 0), row("d", 0), row("e", 0)],
            UNSORTED,
            &mut sink,
        );

        let edits = step(&mut engine, vec![row("b", 0), row("d", 0)], UNSORTED, &mut sink);
        assert_eq!(
            edits,
            vec![
                StructuralEdit::Remove { from: 4, count: 1 },
                StructuralEdit::Remove { from: 2, count: 1 },
                StructuralEdit::Remove { from: 0, count: 1 },
                StructuralEdit::Touch { index: 0 },
                StructuralEdit::Touch { index: 1 },
            ]
        );
    }

    #[test]
    fn unsorted_follows_source_reorder() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        step(&mut engine, vec![row("a", 0), row("b", 0)], UNSORTED, &mut sink);
        step(&mut engine, vec![row("b", 0), row("a", 0)], UNSORTED, &mut sink);
        assert_eq!(keys(&engine), vec!["b", "a"]);
    }

    #[test]
    fn equivalent_zero_strength_services_stay_in_name_order() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let a = svc("A", true, 0);
        let b = svc("B", true, 0);
        step(&mut engine, vec![b.clone(), a.clone()], Some(&PlainOrder), &mut sink);
        assert_eq!(paths(&engine), vec!["/s/A", "/s/B"]);

        b.store(Service::new("/s/B", "B", "wifi").with_saved(true));
        step(&mut engine, vec![b, a], Some(&PlainOrder), &mut sink);
        assert_eq!(paths(&engine), vec!["/s/A", "/s/B"]);
    }

    #[test]
    fn equivalent_services_keep_held_order_when_arrival_flips() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let p = ServiceRef::new(0, Service::new("/s/p", "Guest", "wifi"));
        let q = ServiceRef::new(1, Service::new("/s/q", "Guest", "wifi"));
        step(&mut engine, vec![p.clone(), q.clone()], Some(&PlainOrder), &mut sink);
        assert_eq!(paths(&engine), vec!["/s/p", "/s/q"]);

        let edits = step(&mut engine, vec![q, p], Some(&PlainOrder), &mut sink);
        assert_eq!(
            edits,
            vec![
                StructuralEdit::Touch { index: 0 },
                StructuralEdit::Touch { index: 1 },
            ]
        );
        assert_eq!(paths(&engine), vec!["/s/p", "/s/q"]);
    }

    #[test]
    fn newcomer_ties_follow_held_equivalents() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        step(&mut engine, vec![row("a", 1), row("b", 1)], Some(&ByRank), &mut sink);

        let edits = step(
            &mut engine,
            vec![row("c", 1), row("b", 1), row("a", 1)],
            Some(&ByRank),
            &mut sink,
        );
        assert_eq!(keys(&engine), vec!["a", "b", "c"]);
        assert!(edits.iter().all(|e| !matches!(e, StructuralEdit::Move { .. })));
    }

    #[test]
    fn clear_announces_single_removal() {
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        step(&mut engine, vec![row("a", 0), row("b", 1)], Some(&ByRank), &mut sink);
        sink.take_events();

        let edits = engine.clear(&mut sink);
        assert_eq!(edits, vec![StructuralEdit::Remove { from: 0, count: 2 }]);
        assert!(engine.is_empty());
        assert!(engine.clear(&mut sink).is_empty());
        assert_eq!(sink.structural_count(), 1);
    }

    /// Deterministic generator so the sweep below is reproducible.
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, bound: u64) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (self.0 >> 33) % bound
        }
    }

    #[test]
    fn random_snapshots_keep_order_and_membership() {
        const NAMES: [&str; 8] = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let mut rng = Lcg(7);
        let mut engine = Reconciler::new();
        let mut sink = RecordingSink::new();
        let mut unsorted = Reconciler::new();

        for _ in 0..200 {
            let mut snapshot = Vec::new();
            for key in NAMES {
                if rng.below(3) > 0 {
                    snapshot.push(row(key, u32::try_from(rng.below(4)).unwrap()));
                }
            }
            // Arrival order varies too.
            if rng.below(2) == 0 {
                snapshot.reverse();
            }

            step(&mut engine, snapshot.clone(), Some(&ByRank), &mut sink);
            for pair in engine.items().windows(2) {
                assert_ne!(ByRank.compare(&pair[0], &pair[1]), Ordering::Greater);
            }
            let mut held = keys(&engine);
            let mut wanted: Vec<&str> = snapshot.iter().map(|r| r.key).collect();
            held.sort_unstable();
            wanted.sort_unstable();
            assert_eq!(held, wanted);

            step(&mut unsorted, snapshot.clone(), UNSORTED, &mut sink);
            let arrival: Vec<&str> = snapshot.iter().map(|r| r.key).collect();
            assert_eq!(keys(&unsorted), arrival);
        }
    }
}
