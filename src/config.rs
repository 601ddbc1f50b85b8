//! Gateway configuration: endpoint map, per-destination credentials, and
//! Kafka connection settings.
//!
//! Everything is loaded from environment variables via
//! [`GatewayConfig::from_env`]; see the crate docs for the full table.
//! The configuration is immutable after construction; the only runtime
//! mutation is an explicit endpoint rebind through the client manager, which
//! replaces exactly one entry of the endpoint map.

use crate::clients::rest::RestClientKind;
use anyhow::Context;
use std::env;
use std::fmt;

const DEFAULT_CLOUD_ENDPOINT: &str = "https://api.confluent.cloud";
const DEFAULT_TELEMETRY_ENDPOINT: &str = "https://api.telemetry.confluent.cloud";
const DEFAULT_CONSUMER_GROUP: &str = "confluent-gateway";

/// An API key/secret pair for one destination.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl ApiCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }

    fn from_env(key_var: &str, secret_var: &str) -> Self {
        Self {
            api_key: env::var(key_var).unwrap_or_default(),
            api_secret: env::var(secret_var).unwrap_or_default(),
        }
    }

    /// True when both parts are present.
    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

// Secrets must never end up in logs or error chains.
impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// One base address per REST destination.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub cloud: String,
    pub flink: String,
    pub schema_registry: String,
    pub kafka_rest: String,
    pub telemetry: String,
}

impl EndpointConfig {
    pub fn endpoint(&self, kind: RestClientKind) -> &str {
        match kind {
            RestClientKind::Cloud => &self.cloud,
            RestClientKind::Flink => &self.flink,
            RestClientKind::SchemaRegistry => &self.schema_registry,
            RestClientKind::KafkaRest => &self.kafka_rest,
            RestClientKind::Telemetry => &self.telemetry,
        }
    }

    pub fn set_endpoint(&mut self, kind: RestClientKind, endpoint: impl Into<String>) {
        let slot = match kind {
            RestClientKind::Cloud => &mut self.cloud,
            RestClientKind::Flink => &mut self.flink,
            RestClientKind::SchemaRegistry => &mut self.schema_registry,
            RestClientKind::KafkaRest => &mut self.kafka_rest,
            RestClientKind::Telemetry => &mut self.telemetry,
        };
        *slot = endpoint.into();
    }

    fn from_env() -> Self {
        Self {
            cloud: env::var("CONFLUENT_CLOUD_REST_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_CLOUD_ENDPOINT.to_string()),
            flink: env::var("FLINK_REST_ENDPOINT").unwrap_or_default(),
            schema_registry: env::var("SCHEMA_REGISTRY_ENDPOINT").unwrap_or_default(),
            kafka_rest: env::var("KAFKA_REST_ENDPOINT").unwrap_or_default(),
            telemetry: env::var("CONFLUENT_CLOUD_TELEMETRY_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_TELEMETRY_ENDPOINT.to_string()),
        }
    }
}

/// Credentials per REST destination.
///
/// The telemetry API authenticates with the cloud credentials, so it has no
/// entry of its own.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub cloud: ApiCredentials,
    pub flink: ApiCredentials,
    pub schema_registry: ApiCredentials,
    pub kafka_rest: ApiCredentials,
}

impl AuthConfig {
    pub fn credentials(&self, kind: RestClientKind) -> &ApiCredentials {
        match kind {
            RestClientKind::Cloud | RestClientKind::Telemetry => &self.cloud,
            RestClientKind::Flink => &self.flink,
            RestClientKind::SchemaRegistry => &self.schema_registry,
            RestClientKind::KafkaRest => &self.kafka_rest,
        }
    }

    fn from_env() -> Self {
        Self {
            cloud: ApiCredentials::from_env(
                "CONFLUENT_CLOUD_API_KEY",
                "CONFLUENT_CLOUD_API_SECRET",
            ),
            flink: ApiCredentials::from_env("FLINK_API_KEY", "FLINK_API_SECRET"),
            schema_registry: ApiCredentials::from_env(
                "SCHEMA_REGISTRY_API_KEY",
                "SCHEMA_REGISTRY_API_SECRET",
            ),
            kafka_rest: ApiCredentials::from_env("KAFKA_API_KEY", "KAFKA_API_SECRET"),
        }
    }
}

/// Settings for the broker connection all Kafka clients derive from.
#[derive(Clone, Debug)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap broker list.
    pub bootstrap_servers: String,
    pub client_id: String,
    /// Base consumer group id; session-scoped consumers append their session
    /// key to it.
    pub consumer_group: String,
    /// SASL/PLAIN credentials; plaintext when absent.
    pub credentials: Option<ApiCredentials>,
}

impl KafkaConfig {
    fn from_env() -> anyhow::Result<Self> {
        let bootstrap_servers =
            env::var("BOOTSTRAP_SERVERS").context("No BOOTSTRAP_SERVERS provided in environment")?;

        let credentials = ApiCredentials::from_env("KAFKA_API_KEY", "KAFKA_API_SECRET");

        Ok(Self {
            bootstrap_servers,
            client_id: env::var("KAFKA_CLIENT_ID").unwrap_or_else(|_| crate::APP_NAME.clone()),
            consumer_group: env::var("KAFKA_CONSUMER_GROUP")
                .unwrap_or_else(|_| DEFAULT_CONSUMER_GROUP.to_string()),
            credentials: credentials.is_complete().then_some(credentials),
        })
    }
}

/// Everything the client manager needs, assembled once at startup.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub kafka: KafkaConfig,
    pub endpoints: EndpointConfig,
    pub auth: AuthConfig,
}

impl GatewayConfig {
    /// Loads the configuration from environment variables.
    ///
    /// Only `BOOTSTRAP_SERVERS` is required. Endpoints without a configured
    /// address fail lazily, when the corresponding client is first requested.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            kafka: KafkaConfig::from_env()?,
            endpoints: EndpointConfig::from_env(),
            auth: AuthConfig::from_env(),
        })
    }
}
