//! Engine types
//!
//! Configuration and results for the sync engine.

use crate::state::{CheckpointPolicy, SyncState};

/// Configuration for sync operation
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncConfig {
    /// When intermediate STATE messages are emitted
    pub checkpoint: CheckpointPolicy,
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of records between intermediate checkpoints (0 disables them)
    #[must_use]
    pub fn with_checkpoint_interval(mut self, interval: u64) -> Self {
        self.checkpoint = CheckpointPolicy::new(interval);
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Total records emitted
    pub records_synced: u64,
    /// STATE messages emitted, intermediate and final
    pub state_messages: u64,
    /// Streams read to completion
    pub streams_synced: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one record
    pub fn add_record(&mut self) {
        self.records_synced += 1;
    }

    /// Count one STATE message
    pub fn add_state_message(&mut self) {
        self.state_messages += 1;
    }

    /// Count a completed stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// Result of a completed read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOutcome {
    /// Aggregate state after the last stream
    pub state: SyncState,
    /// Run statistics
    pub stats: SyncStats,
}
