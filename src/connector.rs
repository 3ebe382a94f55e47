//! Source trait
//!
//! Defines the connector-level contract the sync engine drives: a connection
//! check and the set of streams a configuration resolves to.

use crate::error::Result;
use crate::stream::SourceStream;
use crate::types::JsonValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Check Result
// ============================================================================

/// Result of a connection check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Whether the check succeeded
    pub success: bool,

    /// Error detail if failed
    pub message: Option<String>,
}

impl CheckResult {
    /// Create a successful check result
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// Create a failed check result
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

// ============================================================================
// Source Trait
// ============================================================================

/// A data source the sync engine can discover, check and read
#[async_trait]
pub trait Source: Send + Sync {
    /// Source name, used in the run's start and finish logs
    fn name(&self) -> &str;

    /// Check connectivity with the given configuration.
    ///
    /// A negative outcome is a `CheckResult::failure`, not an `Err`; errors are
    /// reserved for faults the check itself could not handle.
    async fn check_connection(&self, config: &JsonValue) -> Result<CheckResult>;

    /// Streams available under `config`, in declaration order
    fn streams(&self, config: &JsonValue) -> Result<Vec<SourceStream>>;
}
