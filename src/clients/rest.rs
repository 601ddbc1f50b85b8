//! Authenticated REST clients for the Confluent Cloud API destinations.

use crate::config::ApiCredentials;
use anyhow::Context;
use reqwest::{Method, RequestBuilder, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// The closed set of REST destinations the gateway talks to.
///
/// Each kind is backed by its own memo cell in the client manager, so adding
/// a destination is an exhaustive-match change rather than a string lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RestClientKind {
    Cloud,
    Flink,
    SchemaRegistry,
    KafkaRest,
    Telemetry,
}

impl RestClientKind {
    pub const ALL: [RestClientKind; 5] = [
        RestClientKind::Cloud,
        RestClientKind::Flink,
        RestClientKind::SchemaRegistry,
        RestClientKind::KafkaRest,
        RestClientKind::Telemetry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RestClientKind::Cloud => "cloud",
            RestClientKind::Flink => "flink",
            RestClientKind::SchemaRegistry => "schema-registry",
            RestClientKind::KafkaRest => "kafka-rest",
            RestClientKind::Telemetry => "telemetry",
        }
    }
}

impl fmt::Display for RestClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP client bound to one base address and one credential pair.
///
/// Every request carries basic auth for the destination the client was built
/// for. The base address is fixed at construction; rebinding an endpoint
/// builds a new client rather than mutating an existing one.
pub struct RestClient {
    base_url: String,
    credentials: ApiCredentials,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(base_url: &str, credentials: ApiCredentials) -> anyhow::Result<Self> {
        // Validate eagerly so a bad endpoint fails at construction, not on
        // the first request.
        Url::parse(base_url).with_context(|| format!("Invalid REST base URL '{}'", base_url))?;

        let http = reqwest::Client::builder()
            .user_agent(format!("{}/{}", *crate::APP_NAME, *crate::APP_VERSION))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http,
        })
    }

    /// The base address this client was constructed against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Starts a request against `path`, with the destination's basic auth
    /// already applied.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.http
            .request(method, url)
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_secret))
    }

    /// GETs `path` and deserializes the JSON response body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let response = self
            .request(Method::GET, path)
            .send()
            .await
            .with_context(|| format!("GET {}/{} failed", self.base_url, path))?
            .error_for_status()
            .with_context(|| format!("GET {}/{} returned an error status", self.base_url, path))?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to decode response body from {}", path))
    }

    /// POSTs `body` as JSON to `path` and deserializes the JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> anyhow::Result<T> {
        let response = self
            .request(Method::POST, path)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {}/{} failed", self.base_url, path))?
            .error_for_status()
            .with_context(|| format!("POST {}/{} returned an error status", self.base_url, path))?;

        response
            .json()
            .await
            .with_context(|| format!("Failed to decode response body from {}", path))
    }
}
