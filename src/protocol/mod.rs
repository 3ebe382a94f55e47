//! Output protocol module
//!
//! Wire messages shared by every command, plus the sinks they are written to.
//!
//! # Overview
//!
//! The protocol module provides:
//! - `Message` - Tagged union of RECORD, STATE, LOG, CATALOG and CONNECTION_STATUS
//! - `Catalog` / `ConfiguredCatalog` - Discovered and selected streams
//! - `MessageSink` - Ordered destination for messages (memory, JSON lines, channel)

mod sink;
mod types;

pub use sink::{ChannelSink, JsonLinesSink, MessageSink, MessageStream, VecSink};
pub use types::{
    Catalog, CatalogStream, ConfiguredCatalog, ConfiguredStream, ConnectionStatus, LogMessage,
    Message, RecordMessage, StateMessage, Status,
};
