//! Kafka client construction on top of librdkafka.
//!
//! [`KafkaConnection`] holds the prepared client configuration every derived
//! client (admin, producer, consumer) starts from. librdkafka connects to the
//! brokers lazily in the background, so creating a client is the construction
//! step; the connection itself needs no explicit connect call.

use crate::config::KafkaConfig;
use anyhow::Context;
use rdkafka::ClientConfig;
use rdkafka::admin::AdminClient;
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::FutureProducer;

/// The shared broker connection settings all Kafka clients derive from.
pub struct KafkaConnection {
    config: ClientConfig,
    consumer_group: String,
}

impl KafkaConnection {
    pub fn new(settings: &KafkaConfig) -> Self {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &settings.bootstrap_servers)
            .set("client.id", &settings.client_id);

        if let Some(credentials) = &settings.credentials {
            config
                .set("security.protocol", "sasl_ssl")
                .set("sasl.mechanisms", "PLAIN")
                .set("sasl.username", &credentials.api_key)
                .set("sasl.password", &credentials.api_secret);
        }

        Self {
            config,
            consumer_group: settings.consumer_group.clone(),
        }
    }

    /// Creates an admin client for topic and cluster administration.
    pub fn admin(&self) -> anyhow::Result<AdminClient<DefaultClientContext>> {
        self.config
            .create()
            .context("Failed to create Kafka admin client")
    }

    /// Creates a producer with delivery tuning fixed at creation time.
    ///
    /// Compression and linger are not reconfigurable afterwards; changing
    /// them means closing the producer and constructing a new one.
    pub fn producer(&self) -> anyhow::Result<FutureProducer> {
        let mut config = self.config.clone();
        config
            .set("compression.type", "gzip")
            .set("linger.ms", "5");

        config.create().context("Failed to create Kafka producer")
    }

    /// Creates a fresh consumer bound to a session-derived group id.
    ///
    /// Consumers are intentionally never cached: each logical session needs
    /// its own offsets. Auto-commit and auto-topic-creation are disabled and
    /// replay starts from the earliest offset.
    pub fn consumer(&self, session: Option<&str>) -> anyhow::Result<StreamConsumer> {
        let group_id = self.group_id(session);
        tracing::info!(%group_id, "Creating Kafka consumer");

        let mut config = self.config.clone();
        config
            .set("group.id", &group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("allow.auto.create.topics", "false");

        config
            .create()
            .with_context(|| format!("Failed to create Kafka consumer for group '{}'", group_id))
    }

    /// The consumer group id for a session: the base group name, with the
    /// session key appended when present.
    pub fn group_id(&self, session: Option<&str>) -> String {
        match session {
            Some(session) => format!("{}-{}", self.consumer_group, session),
            None => self.consumer_group.clone(),
        }
    }
}
