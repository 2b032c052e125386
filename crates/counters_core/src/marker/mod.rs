//! Client-held markers gating once-per-client mutations.
//!
//! # Responsibility
//! - Define the marker contract (`has`, `set`) a host adapts its cookie jar to.
//! - Provide an in-memory store for tests and console use.
//!
//! # Invariants
//! - A marker is trusted as reported by the client; clearing it re-enables
//!   the gated mutation.

use std::collections::HashMap;
use std::time::Duration;

/// Per-client marker store, typically a request/response cookie pair.
pub trait MarkerStore {
    fn has(&self, name: &str) -> bool;

    /// Queues a marker that the client keeps for `max_age`.
    fn set(&mut self, name: &str, value: &str, max_age: Duration);
}

/// A marker recorded by `MemoryMarkerStore`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    pub value: String,
    pub max_age: Duration,
}

/// Marker store for a single simulated client.
#[derive(Debug, Clone, Default)]
pub struct MemoryMarkerStore {
    markers: HashMap<String, Marker>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Marker> {
        self.markers.get(name)
    }

    /// Drops a marker, as a client clearing its cookie would.
    pub fn clear(&mut self, name: &str) -> bool {
        self.markers.remove(name).is_some()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn has(&self, name: &str) -> bool {
        self.markers.contains_key(name)
    }

    fn set(&mut self, name: &str, value: &str, max_age: Duration) {
        self.markers.insert(
            name.to_string(),
            Marker {
                value: value.to_string(),
                max_age,
            },
        );
    }
}
