//! Request authentication
//!
//! Credentials are rendered from the connector configuration before the
//! authenticator is built, so applying them never fails.

use base64::Engine as _;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

/// Where an API key is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

/// Authentication applied to every request
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Authenticator {
    /// No credentials
    #[default]
    None,
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
    /// Key sent as a header or query parameter
    ApiKey {
        name: String,
        value: String,
        location: ApiKeyLocation,
    },
    /// `Authorization: Basic <base64(username:password)>`
    Basic { username: String, password: String },
}

impl Authenticator {
    /// Header carrying the credentials, if any
    pub fn header(&self) -> Option<(String, String)> {
        match self {
            Authenticator::None => None,
            Authenticator::Bearer { token } => {
                Some(("Authorization".to_string(), format!("Bearer {token}")))
            }
            Authenticator::ApiKey {
                name,
                value,
                location: ApiKeyLocation::Header,
            } => Some((name.clone(), value.clone())),
            Authenticator::ApiKey { .. } => None,
            Authenticator::Basic { username, password } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{username}:{password}"));
                Some(("Authorization".to_string(), format!("Basic {encoded}")))
            }
        }
    }

    /// Query parameter carrying the credentials, if any
    pub fn query_param(&self) -> Option<(String, String)> {
        match self {
            Authenticator::ApiKey {
                name,
                value,
                location: ApiKeyLocation::Query,
            } => Some((name.clone(), value.clone())),
            _ => None,
        }
    }

    /// Apply the credentials to a request
    pub fn apply(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some((name, value)) = self.header() {
            req = req.header(name, value);
        }
        if let Some((name, value)) = self.query_param() {
            req = req.query(&[(name, value)]);
        }
        req
    }

    /// Raw credential values, for registering as secrets
    pub fn credentials(&self) -> Vec<String> {
        match self {
            Authenticator::None => Vec::new(),
            Authenticator::Bearer { token } => vec![token.clone()],
            Authenticator::ApiKey { value, .. } => vec![value.clone()],
            Authenticator::Basic { password, .. } => {
                let mut values = vec![password.clone()];
                if let Some((_, header)) = self.header() {
                    values.push(header.trim_start_matches("Basic ").to_string());
                }
                values
            }
        }
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Authenticator::None => "none",
            Authenticator::Bearer { .. } => "bearer",
            Authenticator::ApiKey { .. } => "api_key",
            Authenticator::Basic { .. } => "basic",
        };
        f.debug_struct("Authenticator")
            .field("kind", &kind)
            .finish_non_exhaustive()
    }
}
