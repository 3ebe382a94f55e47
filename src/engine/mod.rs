//! Execution engine module
//!
//! Catalog discovery, connection checks and the read loop.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Drives a `Source` through discover, check and read
//! - `SyncConfig` - Checkpoint configuration for reads
//! - `ReadOutcome` / `SyncStats` - Final aggregate state and run statistics
//!
//! Streams are read one after another. Every RECORD, STATE and LOG message
//! goes to a single sink, in the order it was produced.

mod types;

pub use types::{ReadOutcome, SyncConfig, SyncStats};

use crate::connector::Source;
use crate::error::{Error, Result};
use crate::logger::RedactingFormatter;
use crate::protocol::{
    Catalog, ChannelSink, ConfiguredCatalog, ConfiguredStream, ConnectionStatus, Message,
    MessageSink, MessageStream,
};
use crate::state::SyncState;
use crate::stream::{IncrementalStream, SourceStream};
use crate::types::{JsonObject, JsonValue, SyncMode};
use futures::{FutureExt, TryStreamExt};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Sync engine for a single source
pub struct SyncEngine<S: Source> {
    /// The source being synced
    source: S,
    /// Formatter for LOG messages
    formatter: RedactingFormatter,
    /// Sync configuration
    config: SyncConfig,
}

impl<S: Source> SyncEngine<S> {
    /// Create a new sync engine
    pub fn new(source: S, formatter: RedactingFormatter) -> Self {
        Self {
            source,
            formatter,
            config: SyncConfig::default(),
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get the LOG formatter
    pub fn formatter(&self) -> &RedactingFormatter {
        &self.formatter
    }

    /// Get the sync configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Build the catalog of every stream the source exposes under `config`
    pub fn discover(&self, config: &JsonValue) -> Result<Catalog> {
        let streams = self.source.streams(config)?;
        Ok(Catalog {
            streams: streams.iter().map(SourceStream::descriptor).collect(),
        })
    }

    /// Check connectivity.
    ///
    /// A failed check is reported as a FAILED status. Only a fault inside the
    /// check itself is returned as an error. Registered secrets are masked in
    /// both messages.
    pub async fn check(&self, config: &JsonValue) -> Result<ConnectionStatus> {
        let secrets = self.formatter.secrets();
        match self.source.check_connection(config).await {
            Ok(result) if result.success => Ok(ConnectionStatus::succeeded()),
            Ok(result) => Ok(ConnectionStatus::failed(
                secrets.redact(&result.message.unwrap_or_default()),
            )),
            Err(e) => Err(Error::ConnectionCheck {
                message: secrets.redact(&e.trace()),
            }),
        }
    }

    /// Read the configured streams in catalog order.
    ///
    /// `state` seeds incremental streams and is not modified; the updated
    /// aggregate is returned in the outcome and published in every STATE
    /// message. The first fault is logged at ERROR and aborts the run.
    pub async fn read<K: MessageSink + ?Sized>(
        &self,
        config: &JsonValue,
        catalog: &ConfiguredCatalog,
        state: Option<&SyncState>,
        sink: &mut K,
    ) -> Result<ReadOutcome> {
        let start = Instant::now();
        let source_name = self.source.name();
        let mut aggregate = state.cloned().unwrap_or_default();
        let mut stats = SyncStats::new();

        sink.emit(self.formatter.info(format!("Starting syncing {source_name}")))
            .await?;

        let streams = match self.source.streams(config) {
            Ok(streams) => streams,
            Err(e) => {
                let message = format!("Failed to resolve the streams of {source_name}");
                return Err(self.report_failure(&message, e, sink).await);
            }
        };

        for configured in &catalog.streams {
            let name = configured.name();
            let result = match streams.iter().find(|s| s.name() == name) {
                Some(stream) => {
                    self.sync_stream(stream, configured, &mut aggregate, &mut stats, sink)
                        .await
                }
                None => Err(Error::stream_not_found(name)),
            };

            if let Err(e) = result {
                let message = format!("Encountered an error while reading stream {name}");
                return Err(self.report_failure(&message, e, sink).await);
            }
        }

        stats.set_duration(start.elapsed().as_millis() as u64);
        info!(
            "Synced {} records from {} streams in {}ms",
            stats.records_synced, stats.streams_synced, stats.duration_ms
        );
        sink.emit(self.formatter.info(format!("Finished syncing {source_name}")))
            .await?;

        Ok(ReadOutcome {
            state: aggregate,
            stats,
        })
    }

    /// Read one stream to exhaustion
    async fn sync_stream<K: MessageSink + ?Sized>(
        &self,
        stream: &SourceStream,
        configured: &ConfiguredStream,
        aggregate: &mut SyncState,
        stats: &mut SyncStats,
        sink: &mut K,
    ) -> Result<()> {
        let name = stream.name();
        let incremental: Option<&dyn IncrementalStream> = match configured.sync_mode {
            SyncMode::Incremental => {
                let capability = stream.as_incremental();
                if capability.is_none() {
                    warn!("Stream {name} does not support incremental sync, reading it in full");
                }
                capability
            }
            SyncMode::FullRefresh => None,
        };

        sink.emit(self.formatter.info(format!("Syncing stream: {name}")))
            .await?;

        let mut stream_state = JsonObject::new();
        if incremental.is_some() {
            if let Some(saved) = aggregate.cursor_for(name) {
                sink.emit(self.formatter.info(format!(
                    "Setting state of {name} stream to {}",
                    JsonValue::Object(saved.clone())
                )))
                .await?;
                stream_state = saved.clone();
            }
        }

        let mut records = stream.read_records(stream_state.clone());
        let mut records_read: u64 = 0;

        while let Some(record) = records.try_next().await? {
            records_read += 1;
            sink.emit(Message::record(name, record.clone())).await?;
            stats.add_record();

            if let Some(capability) = incremental {
                stream_state =
                    capability.get_updated_state(std::mem::take(&mut stream_state), &record)?;
                if self
                    .config
                    .checkpoint
                    .should_checkpoint(capability.continuously_save_state(), records_read)
                {
                    debug!("Checkpointing {name} after {records_read} records");
                    checkpoint(name, &stream_state, aggregate, stats, sink).await?;
                }
            }
        }

        if incremental.is_some() && !stream_state.is_empty() {
            checkpoint(name, &stream_state, aggregate, stats, sink).await?;
        }

        stats.add_stream();
        sink.emit(
            self.formatter
                .info(format!("Read {records_read} records from {name} stream")),
        )
        .await?;

        Ok(())
    }

    /// Log a fault at ERROR with its full chain, then hand it back
    async fn report_failure<K: MessageSink + ?Sized>(
        &self,
        context: &str,
        error: Error,
        sink: &mut K,
    ) -> Error {
        if matches!(error, Error::SinkClosed { .. }) {
            return error;
        }

        let message = self
            .formatter
            .error(format!("{context}\n{}", error.trace()));
        match sink.emit(message).await {
            Ok(()) => error,
            Err(sink_error) => {
                warn!("Could not report sync failure: {sink_error}");
                error
            }
        }
    }
}

impl<S: Source + 'static> SyncEngine<S> {
    /// Lazy form of [`read`](Self::read).
    ///
    /// The run is spawned onto the runtime and feeds a channel of capacity
    /// one, so it only advances as fast as the stream is polled. A fault, or a
    /// panic inside a stream, is yielded as the final `Err` item. Dropping the
    /// stream stops the run at its next emission.
    pub fn read_stream(
        self: Arc<Self>,
        config: JsonValue,
        catalog: ConfiguredCatalog,
        state: Option<SyncState>,
    ) -> MessageStream {
        let (tx, rx) = mpsc::channel(1);

        tokio::spawn(async move {
            let mut sink = ChannelSink::new(tx.clone());
            let run = self.read(&config, &catalog, state.as_ref(), &mut sink);
            let failure = match AssertUnwindSafe(run).catch_unwind().await {
                Ok(Ok(_)) => None,
                Ok(Err(Error::SinkClosed { .. })) => {
                    debug!("Message stream dropped, read cancelled");
                    None
                }
                Ok(Err(e)) => Some(e),
                Err(panic) => {
                    let message = panic_message(&*panic);
                    error!("Sync task panicked: {message}");
                    Some(Error::Other(format!("Sync task panicked: {message}")))
                }
            };
            if let Some(e) = failure {
                // The consumer may already be gone
                let _ = tx.send(Err(e)).await;
            }
        });

        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }
}

/// Text of a panic payload, when it carries one
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Merge a stream's cursor into the aggregate and publish a full snapshot
async fn checkpoint<K: MessageSink + ?Sized>(
    stream: &str,
    stream_state: &JsonObject,
    aggregate: &mut SyncState,
    stats: &mut SyncStats,
    sink: &mut K,
) -> Result<()> {
    aggregate.merge(stream, stream_state.clone());
    sink.emit(Message::state(aggregate.clone())).await?;
    stats.add_state_message();
    Ok(())
}

#[cfg(test)]
mod tests;
