//! Declarative source
//!
//! Turns a [`ConnectorDefinition`] plus a user configuration into HTTP
//! streams the sync engine can read.

use super::types::{AuthDefinition, ConnectorDefinition};
use crate::connector::{CheckResult, Source};
use crate::error::{Error, Result};
use crate::http::{ApiRequest, Authenticator, ClientSettings, HttpClient, RetryPolicy};
use crate::stream::{HttpStream, IncrementalHttpStream, SourceStream};
use crate::template::{render, render_params, TemplateContext};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A source defined in YAML
#[derive(Debug, Clone)]
pub struct DeclarativeSource {
    definition: ConnectorDefinition,
}

impl DeclarativeSource {
    /// Create a source from a validated definition
    pub fn new(definition: ConnectorDefinition) -> Self {
        Self { definition }
    }

    /// Load and validate a connector file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(super::load_connector(path)?))
    }

    /// The connector definition
    pub fn definition(&self) -> &ConnectorDefinition {
        &self.definition
    }

    /// Apply property defaults and check required properties
    pub fn resolve_config(&self, config: &JsonValue) -> Result<JsonValue> {
        let mut resolved: JsonObject = match config {
            JsonValue::Object(map) => map.clone(),
            JsonValue::Null => JsonObject::new(),
            _ => return Err(Error::config("Connector config must be a JSON object")),
        };

        for (name, property) in &self.definition.spec.properties {
            let present = resolved.get(name).is_some_and(|v| !v.is_null());
            if present {
                continue;
            }
            match &property.default {
                Some(default) => {
                    resolved.insert(name.clone(), default.clone());
                }
                None if property.required => return Err(Error::missing_field(name)),
                None => {}
            }
        }

        Ok(JsonValue::Object(resolved))
    }

    /// Values that must be masked in output: `secret` properties and rendered
    /// credentials
    pub fn secrets(&self, config: &JsonValue) -> Vec<String> {
        let mut secrets: Vec<String> = self
            .definition
            .spec
            .properties
            .iter()
            .filter(|(_, property)| property.secret)
            .filter_map(|(name, _)| match config.get(name)? {
                JsonValue::String(s) => Some(s.clone()),
                JsonValue::Null => None,
                other => Some(other.to_string()),
            })
            .collect();

        let ctx = TemplateContext::with_config(config.clone());
        match self.authenticator(&ctx) {
            Ok(auth) => secrets.extend(auth.credentials()),
            Err(e) => debug!("Credentials not renderable yet: {e}"),
        }

        secrets.retain(|s| !s.is_empty());
        secrets.sort();
        secrets.dedup();
        secrets
    }

    /// Render the authenticator for a configuration
    fn authenticator(&self, ctx: &TemplateContext) -> Result<Authenticator> {
        Ok(match &self.definition.auth {
            AuthDefinition::None => Authenticator::None,
            AuthDefinition::Bearer { token } => Authenticator::Bearer {
                token: render(token, ctx)?,
            },
            AuthDefinition::ApiKey {
                name,
                value,
                location,
            } => Authenticator::ApiKey {
                name: render(name, ctx)?,
                value: render(value, ctx)?,
                location: *location,
            },
            AuthDefinition::Basic { username, password } => Authenticator::Basic {
                username: render(username, ctx)?,
                password: render(password, ctx)?,
            },
        })
    }

    /// Build the shared HTTP client for a resolved configuration
    fn client(&self, ctx: &TemplateContext) -> Result<Arc<HttpClient>> {
        let http = &self.definition.http;
        let mut settings = ClientSettings::new(render(&self.definition.base_url, ctx)?);
        settings.timeout = Duration::from_secs(http.timeout_secs);
        settings.retry = RetryPolicy {
            max_retries: http.max_retries,
            base_delay: Duration::from_millis(http.backoff_ms),
            max_delay: Duration::from_secs(http.max_backoff_secs),
        };
        settings.user_agent = http.user_agent.clone();
        for (key, value) in &self.definition.headers {
            settings.headers.insert(key.clone(), render(value, ctx)?);
        }

        let client = HttpClient::new(settings, self.authenticator(ctx)?)?;
        Ok(Arc::new(client))
    }

    /// Request sent by `check`: the check endpoint, or the first stream's
    fn check_request(&self, ctx: &TemplateContext) -> Result<ApiRequest> {
        let (path, params) = match &self.definition.check {
            Some(check) => (&check.path, &check.params),
            None => {
                let first = self
                    .definition
                    .streams
                    .first()
                    .ok_or_else(|| Error::config("Connector has no streams to check"))?;
                (&first.path, &first.params)
            }
        };

        let mut request = ApiRequest::get(render(path, ctx)?);
        for (key, value) in render_params(params, ctx)? {
            request = request.query(key, value);
        }
        Ok(request)
    }
}

#[async_trait]
impl Source for DeclarativeSource {
    fn name(&self) -> &str {
        &self.definition.name
    }

    async fn check_connection(&self, config: &JsonValue) -> Result<CheckResult> {
        let config = match self.resolve_config(config) {
            Ok(config) => config,
            Err(e) => return Ok(CheckResult::failure(e.to_string())),
        };
        let ctx = TemplateContext::with_config(config);

        let prepared = self
            .client(&ctx)
            .and_then(|client| Ok((client, self.check_request(&ctx)?)));
        let (client, request) = match prepared {
            Ok(parts) => parts,
            Err(e) => return Ok(CheckResult::failure(e.to_string())),
        };

        debug!("Checking connection with GET {}", request.path);
        match client.send(&request).await {
            Ok(_) => Ok(CheckResult::success()),
            Err(e) => {
                warn!("Connection check failed: {e}");
                Ok(CheckResult::failure(e.to_string()))
            }
        }
    }

    fn streams(&self, config: &JsonValue) -> Result<Vec<SourceStream>> {
        let config = self.resolve_config(config)?;
        let ctx = TemplateContext::with_config(config.clone());
        let client = self.client(&ctx)?;

        Ok(self
            .definition
            .streams
            .iter()
            .map(|definition| {
                let stream = HttpStream::new(client.clone(), definition.clone(), config.clone());
                match &definition.incremental {
                    Some(incremental) => SourceStream::incremental(IncrementalHttpStream::new(
                        stream,
                        incremental.clone(),
                    )),
                    None => SourceStream::plain(stream),
                }
            })
            .collect())
    }
}
