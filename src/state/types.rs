//! Aggregate sync state
//!
//! Serialized as a plain JSON object `{stream_name: cursor_state}` so it can be
//! fed straight back into the next run.

use crate::error::{Error, Result};
use crate::types::JsonObject;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cursor state for every stream synced so far
///
/// Keys are kept sorted so that snapshots serialize deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncState {
    streams: BTreeMap<String, JsonObject>,
}

impl SyncState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse state from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))
    }

    /// Get the stored state for a stream
    pub fn get(&self, stream: &str) -> Option<&JsonObject> {
        self.streams.get(stream)
    }

    /// Get the stored state for a stream, ignoring empty entries
    pub fn cursor_for(&self, stream: &str) -> Option<&JsonObject> {
        self.get(stream).filter(|state| !state.is_empty())
    }

    /// Merge a stream's cursor state into the aggregate.
    ///
    /// Empty state never replaces what is already stored, so a stream that has
    /// published a cursor keeps it in every later snapshot. Returns whether the
    /// aggregate changed.
    pub fn merge(&mut self, stream: &str, state: JsonObject) -> bool {
        if state.is_empty() {
            return false;
        }
        if self.streams.get(stream) == Some(&state) {
            return false;
        }
        self.streams.insert(stream.to_string(), state);
        true
    }

    /// Number of streams with stored state
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Whether no stream has stored state
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Stream names with stored state, in sorted order
    pub fn stream_names(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    /// Export as a compact JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::state(format!("Failed to serialize state: {e}")))
    }
}

impl FromIterator<(String, JsonObject)> for SyncState {
    fn from_iter<I: IntoIterator<Item = (String, JsonObject)>>(iter: I) -> Self {
        Self {
            streams: iter.into_iter().collect(),
        }
    }
}
