//! Checkpoint policy
//!
//! Decides when accumulated cursor state is flushed as an intermediate STATE
//! message while a stream is still being read.

/// Records between intermediate checkpoints unless configured otherwise
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 100;

/// Record-count checkpoint rule
///
/// Streams that opt in with `continuously_save_state` get a checkpoint after
/// every `interval` records, which bounds the work lost on abrupt termination
/// to `interval - 1` records. Other streams only checkpoint at completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointPolicy {
    interval: u64,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT_INTERVAL)
    }
}

impl CheckpointPolicy {
    /// Create a policy; an interval of 0 disables intermediate checkpoints
    pub fn new(interval: u64) -> Self {
        Self { interval }
    }

    /// Create a policy that never checkpoints mid-stream
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Records between checkpoints
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Whether state should be emitted after the `records_read`-th record
    pub fn should_checkpoint(&self, continuously_save_state: bool, records_read: u64) -> bool {
        continuously_save_state
            && self.interval > 0
            && records_read > 0
            && records_read % self.interval == 0
    }
}
