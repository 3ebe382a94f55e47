//! HTTP streams
//!
//! Streams backed by a paginated JSON endpoint. Each page is requested lazily,
//! only once the consumer has drained the records of the previous one.

use super::cursor::{max_cursor_state, CursorField};
use super::types::{DataStream, IncrementalStream, RecordStream};
use crate::error::{Error, Result};
use crate::http::{ApiRequest, HttpClient};
use crate::loader::{IncrementalDefinition, StreamDefinition};
use crate::template::{render, render_params, TemplateContext};
use crate::types::{lookup_path, JsonObject, JsonValue};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

/// Position in the page sequence
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageCursor {
    First,
    Next(String),
    Done,
}

/// Full-refresh stream over an HTTP endpoint
#[derive(Debug)]
pub struct HttpStream {
    client: Arc<HttpClient>,
    definition: StreamDefinition,
    context: TemplateContext,
}

impl HttpStream {
    /// Create a stream; `config` is what `{{ config.* }}` templates read
    pub fn new(client: Arc<HttpClient>, definition: StreamDefinition, config: JsonValue) -> Self {
        Self {
            client,
            definition,
            context: TemplateContext::with_config(config),
        }
    }

    /// The stream's definition
    pub fn definition(&self) -> &StreamDefinition {
        &self.definition
    }

    /// Build the request for one page
    fn request_for(&self, ctx: &TemplateContext, token: Option<&str>) -> Result<ApiRequest> {
        let mut request = ApiRequest::get(render(&self.definition.path, ctx)?);
        for (key, value) in render_params(&self.definition.params, ctx)? {
            request = request.query(key, value);
        }
        for (key, value) in &self.definition.headers {
            request = request.header(key, render(value, ctx)?);
        }
        if let (Some(pagination), Some(token)) = (&self.definition.pagination, token) {
            request = request.query(&pagination.page_param, token);
        }

        Ok(request)
    }

    /// Fetch one page and work out where the next one starts
    async fn next_page(
        &self,
        ctx: &TemplateContext,
        cursor: PageCursor,
    ) -> Result<Option<(Vec<JsonObject>, PageCursor)>> {
        let token = match cursor {
            PageCursor::Done => return Ok(None),
            PageCursor::First => None,
            PageCursor::Next(token) => Some(token),
        };

        let request = self.request_for(ctx, token.as_deref())?;
        debug!(
            "Fetching page for stream '{}' from {} (token: {:?})",
            self.definition.name, request.path, token
        );
        let body = self.client.fetch_json(&request).await?;
        let records = extract_records(&body, &self.definition.record_path)?;

        let next = self
            .definition
            .pagination
            .as_ref()
            .and_then(|p| next_page_token(&body, &p.next_page_path));

        // A repeated token would loop forever
        let following = match next {
            Some(next) if token.as_deref() != Some(next.as_str()) => PageCursor::Next(next),
            _ => PageCursor::Done,
        };

        Ok(Some((records, following)))
    }
}

impl DataStream for HttpStream {
    fn name(&self) -> &str {
        &self.definition.name
    }

    fn json_schema(&self) -> JsonValue {
        self.definition
            .schema
            .clone()
            .unwrap_or_else(super::types::default_json_schema)
    }

    fn read_records(&self, state: JsonObject) -> RecordStream<'_> {
        let ctx = self.context.with_state(&state);

        stream::try_unfold(PageCursor::First, move |cursor| {
            let ctx = ctx.clone();
            async move { self.next_page(&ctx, cursor).await }
        })
        .map_ok(|records| stream::iter(records.into_iter().map(Ok::<JsonObject, Error>)))
        .try_flatten()
        .boxed()
    }
}

/// HTTP stream that resumes from a cursor
#[derive(Debug)]
pub struct IncrementalHttpStream {
    inner: HttpStream,
    incremental: IncrementalDefinition,
}

impl IncrementalHttpStream {
    /// Wrap a stream with its incremental settings
    pub fn new(inner: HttpStream, incremental: IncrementalDefinition) -> Self {
        Self { inner, incremental }
    }
}

impl DataStream for IncrementalHttpStream {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn json_schema(&self) -> JsonValue {
        self.inner.json_schema()
    }

    fn read_records(&self, state: JsonObject) -> RecordStream<'_> {
        self.inner.read_records(state)
    }
}

impl IncrementalStream for IncrementalHttpStream {
    fn cursor_field(&self) -> CursorField {
        self.incremental.cursor_field.clone()
    }

    fn source_defined_cursor(&self) -> bool {
        self.incremental.source_defined_cursor
    }

    fn continuously_save_state(&self) -> bool {
        self.incremental.continuously_save_state
    }

    fn get_updated_state(&self, current: JsonObject, latest_record: &JsonObject) -> Result<JsonObject> {
        Ok(max_cursor_state(
            &self.incremental.cursor_field,
            current,
            latest_record,
        ))
    }
}

/// Pull the records out of a response body.
///
/// The value at `record_path` may be an array of objects, a single object
/// (one record) or null (no records).
pub fn extract_records(body: &JsonValue, record_path: &str) -> Result<Vec<JsonObject>> {
    let value = lookup_path(body, record_path)
        .ok_or_else(|| Error::extraction(record_path, "path not found in response"))?;

    match value {
        JsonValue::Array(items) => items
            .iter()
            .map(|item| match item {
                JsonValue::Object(record) => Ok(record.clone()),
                other => Err(Error::extraction(
                    record_path,
                    format!("expected an object, found {}", json_type(other)),
                )),
            })
            .collect(),
        JsonValue::Object(record) => Ok(vec![record.clone()]),
        JsonValue::Null => Ok(Vec::new()),
        other => Err(Error::extraction(
            record_path,
            format!("expected an array of objects, found {}", json_type(other)),
        )),
    }
}

/// Read the next page token; empty strings and nulls end pagination
pub fn next_page_token(body: &JsonValue, path: &str) -> Option<String> {
    match lookup_path(body, path)? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
