//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat};
use crate::engine::{SyncConfig, SyncEngine};
use crate::error::{Error, Result, ResultExt};
use crate::loader::{load_connector, DeclarativeSource};
use crate::logger::{RedactingFormatter, Secrets};
use crate::protocol::{ConfiguredCatalog, JsonLinesSink, Message, MessageSink};
use crate::state::SyncState;
use crate::types::JsonValue;
use serde_json::json;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info};

/// CLI runner
pub struct Runner {
    cli: Cli,
    formatter: RedactingFormatter,
}

impl Runner {
    /// Create a new runner; `secrets` is shared with the diagnostics writer
    pub fn new(cli: Cli, secrets: Secrets) -> Self {
        Self {
            cli,
            formatter: RedactingFormatter::new(secrets),
        }
    }

    /// Run the CLI command, writing protocol messages to stdout
    pub async fn run(&self) -> Result<()> {
        let mut sink = JsonLinesSink::stdout().pretty(self.cli.format == OutputFormat::Pretty);
        self.run_with_sink(&mut sink).await
    }

    /// Run the CLI command against an arbitrary sink.
    ///
    /// Any fault is reported as a FATAL LOG before being returned.
    pub async fn run_with_sink<K: MessageSink + ?Sized>(&self, sink: &mut K) -> Result<()> {
        let result = self.execute(sink).await;
        if let Err(e) = &result {
            if let Err(emit_err) = sink.emit(self.formatter.fatal(e.trace())).await {
                error!("Could not report fatal error: {emit_err}");
            }
        }
        result
    }

    async fn execute<K: MessageSink + ?Sized>(&self, sink: &mut K) -> Result<()> {
        match &self.cli.command {
            Commands::Check => {
                let (engine, config) = self.engine()?;
                let status = engine.check(&config).await?;
                sink.emit(Message::connection_status(status)).await
            }
            Commands::Discover => {
                let (engine, config) = self.engine()?;
                let catalog = engine.discover(&config)?;
                sink.emit(Message::catalog(catalog)).await
            }
            Commands::Read {
                catalog,
                streams,
                checkpoint_interval,
            } => {
                let (engine, config) = self.engine()?;
                let catalog = match catalog {
                    Some(path) => load_catalog(path)?,
                    None => {
                        let discovered = engine.discover(&config)?;
                        if let Some(missing) =
                            streams.iter().find(|name| discovered.get(name).is_none())
                        {
                            return Err(Error::stream_not_found(missing));
                        }
                        discovered.configure(streams)
                    }
                };
                let state = self.load_state()?;

                let engine = engine
                    .with_config(SyncConfig::new().with_checkpoint_interval(*checkpoint_interval));
                let outcome = engine.read(&config, &catalog, state.as_ref(), sink).await?;
                info!(
                    "Read {} records from {} streams with {} state messages in {}ms",
                    outcome.stats.records_synced,
                    outcome.stats.streams_synced,
                    outcome.stats.state_messages,
                    outcome.stats.duration_ms
                );
                Ok(())
            }
            Commands::Validate => self.validate(sink).await,
        }
    }

    /// Build the engine for the connector and register the config's secrets
    fn engine(&self) -> Result<(SyncEngine<DeclarativeSource>, JsonValue)> {
        let source = self.load_source()?;
        let config = self.load_config()?;
        let resolved = source.resolve_config(&config).unwrap_or_else(|e| {
            debug!("Registering secrets from the unresolved config: {e}");
            config.clone()
        });
        self.formatter.update_secrets(source.secrets(&resolved));

        Ok((SyncEngine::new(source, self.formatter.clone()), config))
    }

    /// Load the declarative source named by `-c`
    fn load_source(&self) -> Result<DeclarativeSource> {
        let path = self.connector_path()?;
        DeclarativeSource::from_file(path)
    }

    fn connector_path(&self) -> Result<&Path> {
        self.cli
            .connector
            .as_deref()
            .ok_or_else(|| Error::config("Connector file not specified (use -c flag)"))
    }

    /// Load configuration
    fn load_config(&self) -> Result<JsonValue> {
        // Inline config takes precedence
        if let Some(json_str) = &self.cli.config_json {
            return serde_json::from_str(json_str).context("Invalid config JSON");
        }

        if let Some(path) = &self.cli.config {
            let content = read_file(path, "config")?;
            return serde_json::from_str(&content)
                .with_context(|| format!("Invalid config JSON in '{}'", path.display()));
        }

        Ok(json!({}))
    }

    /// Load prior state, if any was given
    fn load_state(&self) -> Result<Option<SyncState>> {
        if let Some(state_json) = &self.cli.state_json {
            return SyncState::from_json(state_json).map(Some);
        }

        match &self.cli.state {
            Some(path) => SyncState::from_json(&read_file(path, "state")?).map(Some),
            None => Ok(None),
        }
    }

    /// Validate connector definition
    async fn validate<K: MessageSink + ?Sized>(&self, sink: &mut K) -> Result<()> {
        let connector = load_connector(self.connector_path()?)?;

        sink.emit(self.formatter.info(format!(
            "Connector '{}' v{} is valid with {} streams",
            connector.name,
            connector.version,
            connector.streams.len()
        )))
        .await
    }
}

fn load_catalog(path: &Path) -> Result<ConfiguredCatalog> {
    serde_json::from_str(&read_file(path, "catalog")?)
        .with_context(|| format!("Invalid catalog JSON in '{}'", path.display()))
}

fn read_file(path: &Path, kind: &str) -> Result<String> {
    fs::read_to_string(path)
        .with_context(|| format!("Failed to read {kind} file '{}'", path.display()))
}
