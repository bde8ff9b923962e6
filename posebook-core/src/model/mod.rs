//! Pose library data model
//!
//! Library → books → poses → bone entries, all exclusively owned. Poses and
//! books carry a stable id separate from their editable, sibling-unique name.
//! Active indices are `Option<usize>` and every mutator keeps them in range.

mod book;
mod library;
mod pose;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::transform::Transform;

pub use book::{CleanOptions, CleanReason, CleanReport, CleanedBone, PoseBook};
pub use library::PoseLibrary;
pub use pose::Pose;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Stable identity of a pose, unaffected by renames
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoseId(u64);

impl PoseId {
    pub(crate) fn next() -> Self {
        PoseId(next_id())
    }
}

/// Stable identity of a book, unaffected by renames
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookId(u64);

impl BookId {
    pub(crate) fn next() -> Self {
        BookId(next_id())
    }
}

/// Per-bone entry of a pose
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoneEntry {
    pub name: String,
    #[serde(flatten)]
    pub transform: Transform,
}

impl BoneEntry {
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
        }
    }
}

/// Where a newly captured pose goes in its book
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Placement {
    /// Right after the active pose
    Insert,
    #[default]
    Append,
    Prepend,
}

/// Reordering step for poses and books
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveDirection {
    Up,
    Down,
    Top,
    Bottom,
}

/// Clamp an active index after the list changed length
pub(crate) fn clamp_index(index: Option<usize>, len: usize) -> Option<usize> {
    if len == 0 {
        None
    } else {
        Some(index.unwrap_or(0).min(len - 1))
    }
}

/// Active index after removing `removed` from a list now `len` long
pub(crate) fn index_after_removal(active: Option<usize>, removed: usize, len: usize) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let active = match active {
        Some(a) if removed <= a => a.saturating_sub(1),
        Some(a) => a,
        None => 0,
    };
    Some(active.min(len - 1))
}

/// Apply a [`MoveDirection`] to `items[index]`; returns the new index
pub(crate) fn move_item<T>(items: &mut Vec<T>, index: usize, direction: MoveDirection) -> usize {
    let last = items.len().saturating_sub(1);
    let target = match direction {
        MoveDirection::Up => index.saturating_sub(1),
        MoveDirection::Down => (index + 1).min(last),
        MoveDirection::Top => 0,
        MoveDirection::Bottom => last,
    };
    if target != index {
        let item = items.remove(index);
        items.insert(target, item);
    }
    target
}
