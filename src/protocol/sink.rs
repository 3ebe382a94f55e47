//! Message sinks
//!
//! A sink receives messages one at a time, in emission order. The engine never
//! writes output any other way.

use super::types::Message;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::Stream;
use std::io::Write;
use std::pin::Pin;
use tokio::sync::mpsc;

/// Type alias for the lazy message stream returned by `SyncEngine::read_stream`
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Message>> + Send>>;

/// Ordered destination for output messages
#[async_trait]
pub trait MessageSink: Send {
    /// Deliver one message
    async fn emit(&mut self, message: Message) -> Result<()>;
}

// ============================================================================
// In-memory sink
// ============================================================================

/// Collects messages in memory
#[derive(Debug, Default)]
pub struct VecSink {
    messages: Vec<Message>,
}

impl VecSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Take the collected messages
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[async_trait]
impl MessageSink for VecSink {
    async fn emit(&mut self, message: Message) -> Result<()> {
        self.messages.push(message);
        Ok(())
    }
}

// ============================================================================
// JSON lines sink
// ============================================================================

/// Writes each message as one JSON document per line
pub struct JsonLinesSink<W> {
    writer: W,
    pretty: bool,
}

impl JsonLinesSink<std::io::Stdout> {
    /// Sink writing to stdout
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Create a sink over any writer
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            pretty: false,
        }
    }

    /// Pretty-print messages (no longer one per line)
    #[must_use]
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Get the underlying writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[async_trait]
impl<W: Write + Send> MessageSink for JsonLinesSink<W> {
    async fn emit(&mut self, message: Message) -> Result<()> {
        let line = if self.pretty {
            serde_json::to_string_pretty(&message)?
        } else {
            serde_json::to_string(&message)?
        };
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// Channel sink
// ============================================================================

/// Forwards messages into a bounded channel.
///
/// With a capacity of one the producer only advances once the consumer has
/// taken the previous message.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Result<Message>>,
}

impl ChannelSink {
    /// Wrap a channel sender
    pub fn new(tx: mpsc::Sender<Result<Message>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl MessageSink for ChannelSink {
    async fn emit(&mut self, message: Message) -> Result<()> {
        self.tx
            .send(Ok(message))
            .await
            .map_err(|_| Error::sink_closed("message stream dropped by consumer"))
    }
}
