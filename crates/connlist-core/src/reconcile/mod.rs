// ── List reconciliation ──
//
// One generic engine shared by every projection. What differs between
// projections is only the ordering policy and the backend scope.

mod edit;
mod engine;

use std::fmt;
use std::hash::Hash;

pub use edit::{StructuralEdit, replay};
pub use engine::Reconciler;

/// An element the engine can place: a stable identity plus a view of the
/// attributes its ordering policy reads.
pub trait Identified {
    type Key: Clone + Eq + Hash + fmt::Debug;
    type View;

    fn key(&self) -> &Self::Key;

    /// Point-in-time attributes, taken once per reconcile before sorting.
    fn view(&self) -> Self::View;
}
