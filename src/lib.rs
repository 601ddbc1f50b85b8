//! # Confluent Gateway
//!
//! Client lifecycle layer for a gateway process that exposes Kafka and
//! Confluent Cloud operations. Every network client the gateway depends on
//! (the broker connection, the admin and producer handles, per-session
//! consumers, five REST destinations, and the Schema Registry client) is
//! expensive to construct and must be built at most once per configuration,
//! rebuilt when its endpoint changes, and released exactly once on shutdown.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use confluent_gateway::clients::ClientManager;
//! use confluent_gateway::config::GatewayConfig;
//! use confluent_gateway::logging;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     logging::setup_tracing();
//!
//!     let manager = ClientManager::new(GatewayConfig::from_env()?);
//!     let admin = manager.admin().await?;
//!     // ... handle requests ...
//!     manager.shutdown().await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`lazy`] - Construct-once memoization primitives (the core of the crate)
//! - [`clients`] - The client registry: accessors, endpoint rebind, shutdown
//! - [`config`] - Endpoint map, credentials, Kafka settings from environment
//! - [`logging`] - Tracing setup with plain console output
//!
//! ## Environment Variables
//!
//! ### Core
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `APP_NAME` | Application identifier | `CONFLUENT-GATEWAY` |
//! | `APP_VERSION` | Version string | `DEVELOPMENT-SNAPSHOT-VERSION` |
//! | `RUST_LOG` | Console log filter | `info` |
//!
//! ### Kafka
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `BOOTSTRAP_SERVERS` | Comma-separated broker list | (required) |
//! | `KAFKA_CLIENT_ID` | Client id for all derived clients | `APP_NAME` |
//! | `KAFKA_CONSUMER_GROUP` | Base consumer group id | `confluent-gateway` |
//! | `KAFKA_API_KEY` / `KAFKA_API_SECRET` | SASL/PLAIN credentials | (plaintext) |
//!
//! ### REST destinations
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `CONFLUENT_CLOUD_REST_ENDPOINT` | Confluent Cloud API | `https://api.confluent.cloud` |
//! | `CONFLUENT_CLOUD_TELEMETRY_ENDPOINT` | Telemetry Metrics API | `https://api.telemetry.confluent.cloud` |
//! | `FLINK_REST_ENDPOINT` | Flink API | (unset) |
//! | `SCHEMA_REGISTRY_ENDPOINT` | Schema Registry | (unset) |
//! | `KAFKA_REST_ENDPOINT` | Kafka REST API | (unset) |
//! | `CONFLUENT_CLOUD_API_KEY` / `..._SECRET` | Cloud + telemetry auth | (empty) |
//! | `FLINK_API_KEY` / `..._SECRET` | Flink auth | (empty) |
//! | `SCHEMA_REGISTRY_API_KEY` / `..._SECRET` | Schema Registry auth | (empty) |
//!
//! Endpoints left unset fail lazily, when the corresponding client is first
//! requested.

use std::env;
use std::sync::LazyLock;

/// The client registry and the clients it manages.
pub mod clients;

/// Configuration loaded from the environment.
pub mod config;

/// Construct-once memoization primitives.
pub mod lazy;

/// Tracing and logging infrastructure.
pub mod logging;

/// Application name from `APP_NAME` environment variable.
///
/// Used as the default Kafka client id and in the HTTP user agent.
pub static APP_NAME: LazyLock<String> =
    LazyLock::new(|| env::var("APP_NAME").unwrap_or("CONFLUENT-GATEWAY".to_string()));

/// Application version from `APP_VERSION` environment variable.
///
/// Typically set during CI/CD builds.
pub static APP_VERSION: LazyLock<String> =
    LazyLock::new(|| env::var("APP_VERSION").unwrap_or("DEVELOPMENT-SNAPSHOT-VERSION".to_string()));
