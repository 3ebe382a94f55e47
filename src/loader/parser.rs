//! YAML parser for connector definitions
//!
//! Parses and validates connector YAML files.

use crate::error::{Error, Result, ResultExt};
use crate::loader::types::{AuthDefinition, ConnectorDefinition, StreamDefinition};
use crate::template::{extract_variables, has_templates};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load a connector definition from a YAML file
pub fn load_connector(path: impl AsRef<Path>) -> Result<ConnectorDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read connector file '{}'", path.display()))?;
    load_connector_from_str(&content)
}

/// Load a connector definition from a YAML string
pub fn load_connector_from_str(yaml: &str) -> Result<ConnectorDefinition> {
    let def: ConnectorDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse connector YAML: {e}")))?;

    validate_connector(&def)?;
    Ok(def)
}

/// Validate a connector definition
pub fn validate_connector(def: &ConnectorDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Connector name cannot be empty"));
    }

    if def.base_url.is_empty() {
        return Err(Error::config("Connector base_url cannot be empty"));
    }
    if !has_templates(&def.base_url) {
        url::Url::parse(&def.base_url)?;
    }

    if def.streams.is_empty() {
        return Err(Error::config("Connector must have at least one stream"));
    }

    let mut seen = HashSet::new();
    for stream in &def.streams {
        if !seen.insert(stream.name.as_str()) {
            return Err(Error::config(format!(
                "Duplicate stream name: {}",
                stream.name
            )));
        }
        validate_stream(stream)?;
    }

    if let Some(check) = &def.check {
        if check.path.is_empty() {
            return Err(Error::config("Check path cannot be empty"));
        }
    }

    validate_template_roots(def)
}

/// Validate a stream definition
fn validate_stream(stream: &StreamDefinition) -> Result<()> {
    if stream.name.trim().is_empty() {
        return Err(Error::config("Stream name cannot be empty"));
    }

    if stream.path.is_empty() {
        return Err(Error::config(format!(
            "Stream '{}' path cannot be empty",
            stream.name
        )));
    }

    if let Some(pagination) = &stream.pagination {
        if pagination.next_page_path.is_empty() || pagination.page_param.is_empty() {
            return Err(Error::config(format!(
                "Stream '{}' pagination needs both next_page_path and page_param",
                stream.name
            )));
        }
    }

    if let Some(incremental) = &stream.incremental {
        let path = incremental.cursor_field.path();
        if path.is_empty() || path.iter().any(String::is_empty) {
            return Err(Error::config(format!(
                "Stream '{}' has an empty cursor_field",
                stream.name
            )));
        }
    }

    Ok(())
}

/// Templates may only read declared config properties; `state.*` is only
/// available in stream params.
fn validate_template_roots(def: &ConnectorDefinition) -> Result<()> {
    // (location, template, may read state)
    let mut templates: Vec<(&str, &str, bool)> = vec![("base_url", def.base_url.as_str(), false)];
    templates.extend(def.headers.values().map(|v| ("headers", v.as_str(), false)));
    templates.extend(auth_templates(def).into_iter().map(|v| ("auth", v, false)));
    if let Some(check) = &def.check {
        templates.extend(check.params.values().map(|v| ("check", v.as_str(), false)));
    }
    for stream in &def.streams {
        let name = stream.name.as_str();
        templates.push((name, stream.path.as_str(), false));
        templates.extend(stream.headers.values().map(|v| (name, v.as_str(), false)));
        templates.extend(stream.params.values().map(|v| (name, v.as_str(), true)));
    }

    let declared = &def.spec.properties;
    for (location, template, allows_state) in templates {
        for var in extract_variables(template) {
            if var.starts_with("state.") && !allows_state {
                return Err(Error::config(format!(
                    "'{var}' in {location} can only be used in stream params"
                )));
            }
            if let Some(property) = var.strip_prefix("config.") {
                let root = property.split('.').next().unwrap_or(property);
                if !declared.is_empty() && !declared.contains_key(root) {
                    return Err(Error::config(format!(
                        "Template in {location} references undeclared config property '{root}'"
                    )));
                }
            }
        }
    }

    Ok(())
}

fn auth_templates(def: &ConnectorDefinition) -> Vec<&str> {
    match &def.auth {
        AuthDefinition::None => Vec::new(),
        AuthDefinition::Bearer { token } => vec![token.as_str()],
        AuthDefinition::ApiKey { name, value, .. } => vec![name.as_str(), value.as_str()],
        AuthDefinition::Basic { username, password } => vec![username.as_str(), password.as_str()],
    }
}
