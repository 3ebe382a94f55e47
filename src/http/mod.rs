//! HTTP client module
//!
//! The client behind declarative streams and connection checks.
//!
//! # Features
//!
//! - **Retries**: Doubling delays for timeouts, connect failures and 5xx
//! - **Retry-After**: 429 responses wait as long as the server asks, capped
//! - **Authentication**: Bearer, API key and basic credentials

mod auth;
mod client;

pub use auth::{ApiKeyLocation, Authenticator};
pub use client::{ApiRequest, ClientSettings, HttpClient, RetryPolicy};
