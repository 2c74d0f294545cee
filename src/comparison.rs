//! Bounded, insertion-ordered set of properties under side-by-side review.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::Property;

/// Maximum number of properties compared at once.
pub const COMPARISON_CAPACITY: usize = 4;

/// Identity of a compared property: the backing-store record key when the
/// catalog exposed one, otherwise the numeric catalog id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Record(String),
    Catalog(u64),
}

impl EntryId {
    pub fn of(property: &Property) -> Self {
        match &property.record_id {
            Some(key) if !key.is_empty() => EntryId::Record(key.clone()),
            _ => EntryId::Catalog(property.id),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Record(key) => write!(f, "{key}"),
            EntryId::Catalog(id) => write!(f, "{id}"),
        }
    }
}

/// A compared property: identity plus the snapshot shown in the table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparedEntry {
    pub id: EntryId,
    pub snapshot: Property,
}

impl From<Property> for ComparedEntry {
    fn from(property: Property) -> Self {
        Self {
            id: EntryId::of(&property),
            snapshot: property,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggled {
    Added,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("comparison set is full")]
pub struct CapacityExceeded;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonSet {
    entries: Vec<ComparedEntry>,
}

impl ComparisonSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the entry if its identity is present, otherwise append it.
    /// Appending to a full set is rejected and leaves the set untouched.
    pub fn toggle(&mut self, entry: ComparedEntry) -> Result<Toggled, CapacityExceeded> {
        if self.remove(&entry.id) {
            return Ok(Toggled::Removed);
        }
        if self.entries.len() >= COMPARISON_CAPACITY {
            return Err(CapacityExceeded);
        }
        self.entries.push(entry);
        Ok(Toggled::Added)
    }

    /// Remove at most one entry with this identity. Returns whether one was
    /// removed.
    pub fn remove(&mut self, id: &EntryId) -> bool {
        match self.entries.iter().position(|e| &e.id == id) {
            Some(index) => {
                self.entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, id: &EntryId) -> bool {
        self.entries.iter().any(|e| &e.id == id)
    }

    pub fn entries(&self) -> &[ComparedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= COMPARISON_CAPACITY
    }
}
