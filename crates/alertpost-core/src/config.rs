//! Endpoint and handler configuration records.
//!
//! An [`EndpointConfig`] corresponds to one `[[alertpost]]` entry of the
//! service configuration: a named POST destination plus the static headers
//! sent with every request to it. A [`HandlerConfig`] is attached to a single
//! alerting rule and selects either a literal URL or one of those endpoints.

use std::collections::HashMap;

use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const REDACTED: &str = "***";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("must specify endpoint name")]
    MissingEndpoint,
    #[error("must specify url for endpoint {endpoint:?}")]
    MissingUrl { endpoint: String },
    #[error("invalid URL {url:?} for endpoint {endpoint:?}: {reason}")]
    InvalidUrl {
        endpoint: String,
        url: String,
        reason: String,
    },
}

/// A named HTTP POST destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Unique name handlers refer to.
    pub endpoint: String,

    pub url: String,

    /// Static headers added to every request. Values are treated as secrets.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl EndpointConfig {
    pub fn new(endpoint: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Both the endpoint name and the URL must be set, and the URL must parse
    /// as an absolute URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingEndpoint);
        }
        if self.url.is_empty() {
            return Err(ConfigError::MissingUrl {
                endpoint: self.endpoint.clone(),
            });
        }
        url::Url::parse(&self.url).map_err(|e| ConfigError::InvalidUrl {
            endpoint: self.endpoint.clone(),
            url: self.url.clone(),
            reason: e.to_string(),
        })?;
        Ok(())
    }

    /// Starts a POST to this endpoint with its static headers attached.
    pub fn new_request(&self, client: &Client, body: Vec<u8>) -> RequestBuilder {
        self.headers
            .iter()
            .fold(client.post(&self.url).body(body), |req, (name, value)| {
                req.header(name.as_str(), value.as_str())
            })
    }

    /// Copy of this config that is safe to display: header values are masked.
    pub fn redacted(&self) -> Self {
        Self {
            endpoint: self.endpoint.clone(),
            url: self.url.clone(),
            headers: self
                .headers
                .keys()
                .map(|k| (k.clone(), REDACTED.to_string()))
                .collect(),
        }
    }
}

/// Validates every config, stopping at the first failure.
pub fn validate_all(configs: &[EndpointConfig]) -> Result<(), ConfigError> {
    configs.iter().try_for_each(EndpointConfig::validate)
}

/// Per-rule handler options. A non-empty `url` wins over `endpoint`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub endpoint: String,
}

impl HandlerConfig {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            endpoint: String::new(),
        }
    }

    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            url: String::new(),
            endpoint: endpoint.into(),
        }
    }
}
