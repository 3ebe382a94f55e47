//! Template interpolation for connector definitions
//!
//! Handles `{{ variable }}` interpolation in declarative connectors.
//! Two roots are available: `{{ config.api_key }}` reads the connector
//! configuration and `{{ state.updated_at }}` reads the stream's cursor state.

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Values visible to templates
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Connector configuration values
    pub config: JsonValue,
    /// Cursor state of the stream being read
    pub state: JsonValue,
}

impl TemplateContext {
    /// Create context with config values
    pub fn with_config(config: JsonValue) -> Self {
        Self {
            config,
            state: JsonValue::Object(JsonObject::new()),
        }
    }

    /// Copy of this context carrying a stream's cursor state
    #[must_use]
    pub fn with_state(&self, state: &JsonObject) -> Self {
        Self {
            config: self.config.clone(),
            state: JsonValue::Object(state.clone()),
        }
    }

    /// Get a value by path (e.g., "config.api_key")
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        let mut parts = path.split('.');
        let root = match parts.next()? {
            "config" => &self.config,
            "state" => &self.state,
            _ => return None,
        };

        parts.try_fold(root, |current, part| match current {
            JsonValue::Object(map) => map.get(part),
            _ => None,
        })
    }
}

/// Render a template string, failing on any undefined variable
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut missing = Vec::new();
    let rendered = TEMPLATE_REGEX.replace_all(template, |cap: &regex::Captures<'_>| {
        let var_path = &cap[1];
        match ctx.get(var_path) {
            Some(value) => value_to_string(value),
            None => {
                missing.push(var_path.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(Error::undefined_var(missing.join(", ")))
    }
}

/// Render request parameters in key order.
///
/// A parameter whose template reads a `state.*` value that does not exist yet,
/// or whose rendered value is empty, is left out of the request. Undefined
/// `config.*` values are still an error.
pub fn render_params(
    params: &BTreeMap<String, String>,
    ctx: &TemplateContext,
) -> Result<Vec<(String, String)>> {
    let mut rendered = Vec::with_capacity(params.len());

    for (key, template) in params {
        let waits_on_state = extract_variables(template)
            .iter()
            .any(|var| var.starts_with("state.") && ctx.get(var).is_none());
        if waits_on_state {
            continue;
        }

        let value = render(template, ctx)?;
        if !value.is_empty() {
            rendered.push((key.clone(), value));
        }
    }

    Ok(rendered)
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Null => String::new(),
        _ => value.to_string(),
    }
}
