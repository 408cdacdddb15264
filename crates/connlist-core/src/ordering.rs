// ── Ordering policies ──
//
// Pure comparators that define the order of a projection. No backend
// calls, no side effects: they only look at attribute snapshots.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::Service;

/// A comparator defining the required order of a projection.
pub trait OrderingPolicy {
    /// The attribute view being compared.
    type Item: ?Sized;

    fn compare(&self, a: &Self::Item, b: &Self::Item) -> Ordering;
}

/// Available first, then strongest signal, then name.
///
/// Strength only ranks two services when both are available and both
/// report a reading above zero; otherwise the name decides.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainOrder;

impl OrderingPolicy for PlainOrder {
    type Item = Service;

    fn compare(&self, a: &Service, b: &Service) -> Ordering {
        // `true` must sort first, hence the reversed operands.
        b.available
            .cmp(&a.available)
            .then_with(|| {
                let (sa, sb) = (a.strength_or_zero(), b.strength_or_zero());
                if a.available && b.available && sa > 0 && sb > 0 {
                    sb.cmp(&sa)
                } else {
                    Ordering::Equal
                }
            })
            .then_with(|| a.name.cmp(&b.name))
    }
}

/// Managed services first, then [`PlainOrder`] within each group.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupedOrder;

impl OrderingPolicy for GroupedOrder {
    type Item = Service;

    fn compare(&self, a: &Service, b: &Service) -> Ordering {
        b.managed
            .cmp(&a.managed)
            .then_with(|| PlainOrder.compare(a, b))
    }
}

/// The policy a projection is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortPolicy {
    Plain,
    Grouped,
}

impl OrderingPolicy for SortPolicy {
    type Item = Service;

    fn compare(&self, a: &Service, b: &Service) -> Ordering {
        match self {
            Self::Plain => PlainOrder.compare(a, b),
            Self::Grouped => GroupedOrder.compare(a, b),
        }
    }
}

/// Stable sort that tolerates comparators which are not transitive.
///
/// The plain chain is not transitive once zero and non-zero strengths
/// mix, and `slice::sort_by` may panic on such comparators. Insertion
/// from the back keeps every adjacent pair in order and keeps equivalent
/// elements in their input order.
pub fn stable_sort_by<T>(items: Vec<T>, mut compare: impl FnMut(&T, &T) -> Ordering) -> Vec<T> {
    let mut sorted: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        let mut at = sorted.len();
        while at > 0 && compare(&sorted[at - 1], &item) == Ordering::Greater {
            at -= 1;
        }
        sorted.insert(at, item);
    }
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc(name: &str, available: bool, strength: u8) -> Service {
        Service::new(format!("/s/{name}"), name, "wifi")
            .with_available(available)
            .with_strength(strength)
    }

    #[test]
    fn available_sorts_first() {
        let a = svc("zed", true, 0);
        let b = svc("alpha", false, 90);
        assert_eq!(PlainOrder.compare(&a, &b), Ordering::Less);
        assert_eq!(PlainOrder.compare(&b, &a), Ordering::Greater);
    }

    #[test]
    fn stronger_sorts_first_when_both_report() {
        let a = svc("alpha", true, 40);
        let b = svc("beta", true, 80);
        assert_eq!(PlainOrder.compare(&b, &a), Ordering::Less);
    }

    #[test]
    fn zero_strength_falls_back_to_name() {
        let a = svc("alpha", true, 0);
        let b = svc("beta", true, 80);
        assert_eq!(PlainOrder.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn unavailable_pair_ignores_strength() {
        let a = svc("alpha", false, 10);
        let b = svc("beta", false, 90);
        assert_eq!(PlainOrder.compare(&a, &b), Ordering::Less);
    }

    #[test]
    fn same_name_is_equivalent() {
        let a = svc("same", true, 0);
        let b = Service::new("/s/other", "same", "wifi");
        assert_eq!(PlainOrder.compare(&a, &b), Ordering::Equal);
    }

    #[test]
    fn grouped_puts_managed_first() {
        let managed = svc("zed", false, 0).with_managed(true);
        let plain = svc("alpha", true, 99);
        assert_eq!(GroupedOrder.compare(&managed, &plain), Ordering::Less);
        assert_eq!(GroupedOrder.compare(&plain, &plain), Ordering::Equal);
    }

    #[test]
    fn sort_policy_delegates() {
        let managed = svc("zed", true, 0).with_managed(true);
        let plain = svc("alpha", true, 0);
        assert_eq!(SortPolicy::Plain.compare(&managed, &plain), Ordering::Greater);
        assert_eq!(SortPolicy::Grouped.compare(&managed, &plain), Ordering::Less);
    }

    #[test]
    fn stable_sort_keeps_equivalent_input_order() {
        let items = vec![(1, 'a'), (0, 'b'), (1, 'c'), (0, 'd')];
        let sorted = stable_sort_by(items, |x, y| x.0.cmp(&y.0));
        assert_eq!(sorted, vec![(0, 'b'), (0, 'd'), (1, 'a'), (1, 'c')]);
    }

    #[test]
    fn stable_sort_survives_cyclic_comparator() {
        // a < b by name, b < c by name, c < a by strength.
        let items = vec![svc("c", true, 80), svc("a", true, 50), svc("b", true, 0)];
        let sorted = stable_sort_by(items, |x, y| PlainOrder.compare(x, y));
        assert_eq!(sorted.len(), 3);
        for pair in sorted.windows(2) {
            assert_ne!(PlainOrder.compare(&pair[0], &pair[1]), Ordering::Greater);
        }
    }
}
