// ── Backend-owned service table ──
//
// Concurrent storage with O(1) lookups by path. Entries keep their
// identity across updates: an upsert of a known path swaps the
// attributes inside the existing entry, so every handle sees it.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::{ObjectPath, Service, ServiceRef};

pub(crate) struct ServiceTable {
    by_path: DashMap<ObjectPath, ServiceRef>,

    /// Arrival counter; fetches return entries in first-seen order.
    next_seq: AtomicU64,
}

impl ServiceTable {
    pub(crate) fn new() -> Self {
        Self {
            by_path: DashMap::new(),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Insert or update a service. Returns the handle and whether it was new.
    pub(crate) fn upsert(&self, service: Service) -> (ServiceRef, bool) {
        match self.by_path.entry(service.path.clone()) {
            Entry::Occupied(entry) => {
                entry.get().store(service);
                (entry.get().clone(), false)
            }
            Entry::Vacant(entry) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                let handle = ServiceRef::new(seq, service);
                entry.insert(handle.clone());
                (handle, true)
            }
        }
    }

    /// Apply `f` to a copy of the current attributes and store the result.
    pub(crate) fn update(&self, path: &ObjectPath, f: impl FnOnce(&mut Service)) -> bool {
        let Some(handle) = self.get(path) else {
            return false;
        };
        let mut next = (*handle.attrs()).clone();
        f(&mut next);
        handle.store(next);
        true
    }

    pub(crate) fn remove(&self, path: &ObjectPath) -> Option<ServiceRef> {
        self.by_path.remove(path).map(|(_, v)| v)
    }

    pub(crate) fn get(&self, path: &ObjectPath) -> Option<ServiceRef> {
        self.by_path.get(path).map(|r| r.value().clone())
    }

    /// All entries in arrival order.
    pub(crate) fn ordered(&self) -> Vec<ServiceRef> {
        let mut all: Vec<ServiceRef> = self.by_path.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(ServiceRef::seq);
        all
    }

    pub(crate) fn paths(&self) -> Vec<ObjectPath> {
        self.by_path.iter().map(|r| r.key().clone()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_path.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn svc(path: &str, name: &str) -> Service {
        Service::new(path, name, "wifi")
    }

    #[test]
    fn upsert_reports_new_keys() {
        let table = ServiceTable::new();
        assert!(table.upsert(svc("/s/a", "A")).1);
        assert!(!table.upsert(svc("/s/a", "A2")).1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn upsert_updates_existing_entry_in_place() {
        let table = ServiceTable::new();
        let (first, _) = table.upsert(svc("/s/a", "A"));
        let (second, _) = table.upsert(svc("/s/a", "Renamed"));
        assert!(first.same_entry(&second));
        assert_eq!(first.name(), "Renamed");
    }

    #[test]
    fn ordered_follows_arrival() {
        let table = ServiceTable::new();
        for name in ["c", "a", "b"] {
            table.upsert(svc(&format!("/s/{name}"), name));
        }
        table.upsert(svc("/s/c", "c again"));
        let names: Vec<String> = table.ordered().iter().map(ServiceRef::name).collect();
        assert_eq!(names, vec!["c again", "a", "b"]);
    }

    #[test]
    fn update_and_remove() {
        let table = ServiceTable::new();
        let (handle, _) = table.upsert(svc("/s/a", "A"));
        assert!(table.update(&"/s/a".into(), |s| s.strength = Some(42)));
        assert_eq!(handle.attrs().strength, Some(42));
        assert!(!table.update(&"/s/missing".into(), |_| {}));

        assert!(table.remove(&"/s/a".into()).is_some());
        assert!(table.get(&"/s/a".into()).is_none());
        assert!(table.remove(&"/s/a".into()).is_none());
    }
}
