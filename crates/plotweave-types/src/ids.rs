//! Identifier types.
//!
//! Event nodes use a plain integer id handed out by the event graph that
//! owns them, so ids are dense, ordered, and stable within one search. Runs
//! of the evaluation harness use UUID v7 (time-ordered) so their output can
//! be correlated across files and logs.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an event node inside one event graph.
///
/// Ids are assigned by the graph starting at 1 and are never reused, even
/// after a node is removed. Two graphs may hand out the same id; an
/// [`EventId`] is only meaningful together with the graph that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// The first id a fresh graph hands out.
    pub const FIRST: Self = Self(1);

    /// Return the raw integer value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The id that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<EventId> for u64 {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Unique identifier for one harness run (one stub, one strategy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
