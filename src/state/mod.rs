//! State management module
//!
//! Tracks incremental cursor state across the streams of one sync run and
//! decides when that state is checkpointed.
//!
//! # Overview
//!
//! The state module provides:
//! - `SyncState` - Aggregate per-stream cursor state handed back to the caller
//! - `CheckpointPolicy` - Record-count rule for intermediate STATE messages
//!
//! Persisting state between runs is the caller's job: state is passed into a
//! read and recovered from the STATE messages it emits.

mod checkpoint;
mod types;

pub use checkpoint::{CheckpointPolicy, DEFAULT_CHECKPOINT_INTERVAL};
pub use types::SyncState;
