//! Write-once title → distance map shared by one import run

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Distance of a title from the import root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Distance {
    /// Admitted at this many hops from the root
    Hops(u32),

    /// Seen and permanently excluded (failed lookup, out of radius, category mismatch)
    Invalid,
}

impl Distance {
    /// Returns the hop count for admitted titles
    pub fn hops(&self) -> Option<u32> {
        match self {
            Self::Hops(d) => Some(*d),
            Self::Invalid => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hops(d) => write!(f, "{}", d),
            Self::Invalid => write!(f, "INVALID"),
        }
    }
}

/// Visited-distance map for one BFS import
///
/// Titles are compared exactly (case and whitespace sensitive). Every entry is
/// written at most once: [`TraversalState::try_insert`] is an atomic
/// insert-if-absent, so two tasks resolving the same title race for a single
/// slot and exactly one of them wins.
#[derive(Debug, Default)]
pub struct TraversalState {
    entries: Mutex<HashMap<String, Distance>>,
}

impl TraversalState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Distance>> {
        // Inserts never leave the map half-written, so a poisoned lock is still consistent
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records `distance` for `title` unless the title already has an entry
    ///
    /// Returns `true` if this call wrote the entry.
    pub fn try_insert(&self, title: &str, distance: Distance) -> bool {
        let mut entries = self.lock();
        if entries.contains_key(title) {
            return false;
        }
        entries.insert(title.to_string(), distance);
        true
    }

    /// Shorthand for `try_insert(title, Distance::Invalid)`
    pub fn mark_invalid(&self, title: &str) -> bool {
        self.try_insert(title, Distance::Invalid)
    }

    pub fn get(&self, title: &str) -> Option<Distance> {
        self.lock().get(title).copied()
    }

    pub fn contains(&self, title: &str) -> bool {
        self.lock().contains_key(title)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of titles recorded as [`Distance::Invalid`]
    pub fn invalid_count(&self) -> usize {
        self.lock().values().filter(|d| d.is_invalid()).count()
    }

    /// Number of admitted titles
    pub fn admitted_count(&self) -> usize {
        self.lock().values().filter(|d| !d.is_invalid()).count()
    }

    /// Copies the current map, for reporting and assertions
    pub fn snapshot(&self) -> HashMap<String, Distance> {
        self.lock().clone()
    }
}
