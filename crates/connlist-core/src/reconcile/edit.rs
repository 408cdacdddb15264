// ── Structural edits ──

use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

/// One positional change applied by the reconciler.
///
/// A script of edits is valid to apply in order against the list it was
/// computed from; every index refers to the list as left by the
/// previous edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StructuralEdit<K> {
    Insert { at: usize, key: K },
    /// Relocate one element; `to` is its index after the move.
    Move { from: usize, to: usize },
    Remove { from: usize, count: usize },
    /// Same element, same position, attributes possibly refreshed.
    Touch { index: usize },
}

impl<K> StructuralEdit<K> {
    pub fn is_structural(&self) -> bool {
        !matches!(self, Self::Touch { .. })
    }
}

impl<K: Clone + fmt::Debug> StructuralEdit<K> {
    /// Apply this edit to a shadow list of keys.
    pub fn apply_to(&self, list: &mut Vec<K>) -> Result<(), CoreError> {
        let len = list.len();
        let invalid = || CoreError::InvalidEdit {
            edit: format!("{self:?}"),
            len,
        };
        match self {
            Self::Insert { at, key } => {
                if *at > len {
                    return Err(invalid());
                }
                list.insert(*at, key.clone());
            }
            Self::Move { from, to } => {
                if *from >= len || *to >= len {
                    return Err(invalid());
                }
                let moved = list.remove(*from);
                list.insert(*to, moved);
            }
            Self::Remove { from, count } => {
                let end = from.checked_add(*count).ok_or_else(invalid)?;
                if end > len {
                    return Err(invalid());
                }
                list.drain(*from..end);
            }
            Self::Touch { index } => {
                if *index >= len {
                    return Err(invalid());
                }
            }
        }
        Ok(())
    }
}

/// Replay a whole script against `list`, stopping at the first invalid edit.
pub fn replay<K: Clone + fmt::Debug>(
    edits: &[StructuralEdit<K>],
    list: &mut Vec<K>,
) -> Result<(), CoreError> {
    edits.iter().try_for_each(|edit| edit.apply_to(list))
}

impl<K: fmt::Display> fmt::Display for StructuralEdit<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert { at, key } => write!(f, "insert {key} at {at}"),
            Self::Move { from, to } => write!(f, "move {from} -> {to}"),
            Self::Remove { from, count } => write!(f, "remove {count} at {from}"),
            Self::Touch { index } => write!(f, "touch {index}"),
        }
    }
}
