//! The client registry: one lazily constructed client per external resource.
//!
//! [`ClientManager`] owns every client the gateway talks through: the broker
//! connection, the admin and producer handles, per-session consumers, the
//! five REST destinations, and the Schema Registry client. Consumers of the
//! registry obtain ready-to-use clients through the named accessors and never
//! construct or tear down clients themselves; the registry alone drives the
//! lifecycle (construct once, rebind, shutdown).
//!
//! The registry is an explicit instance: construct it from a
//! [`GatewayConfig`], share it by `Arc`, and call [`ClientManager::shutdown`]
//! once during process termination.

use crate::config::{AuthConfig, EndpointConfig, GatewayConfig};
use crate::lazy::{AsyncLazy, Lazy};
use anyhow::Context;
use arc_swap::ArcSwap;
use rdkafka::admin::AdminClient;
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::StreamConsumer;
use rdkafka::producer::{FutureProducer, Producer};
use std::sync::Arc;
use std::time::Duration;

pub mod kafka;
pub mod rest;
pub mod schema_registry;

use kafka::KafkaConnection;
use rest::{RestClient, RestClientKind};
use schema_registry::SchemaRegistryClient;

const PRODUCER_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ClientManager {
    auth: AuthConfig,
    endpoints: Arc<ArcSwap<EndpointConfig>>,
    kafka: Arc<Lazy<KafkaConnection>>,
    admin: AsyncLazy<AdminClient<DefaultClientContext>>,
    producer: AsyncLazy<FutureProducer>,
    cloud_rest: Lazy<RestClient>,
    flink_rest: Lazy<RestClient>,
    schema_registry_rest: Lazy<RestClient>,
    kafka_rest: Lazy<RestClient>,
    telemetry_rest: Lazy<RestClient>,
    schema_registry: Lazy<SchemaRegistryClient>,
}

impl ClientManager {
    pub fn new(config: GatewayConfig) -> Self {
        let GatewayConfig {
            kafka: kafka_settings,
            endpoints,
            auth,
        } = config;

        let endpoints = Arc::new(ArcSwap::from_pointee(endpoints));
        let kafka = Arc::new(Lazy::new(move || Ok(KafkaConnection::new(&kafka_settings))));

        let admin = AsyncLazy::new(
            {
                let kafka = kafka.clone();
                move || {
                    let kafka = kafka.clone();
                    async move {
                        tracing::info!("Connecting Kafka admin client");
                        kafka.get()?.admin()
                    }
                }
            },
            |admin: Arc<AdminClient<DefaultClientContext>>| async move {
                tracing::info!("Disconnecting Kafka admin client");
                drop(admin);
                Ok(())
            },
        );

        let producer = AsyncLazy::new(
            {
                let kafka = kafka.clone();
                move || {
                    let kafka = kafka.clone();
                    async move {
                        tracing::info!("Connecting Kafka producer");
                        kafka.get()?.producer()
                    }
                }
            },
            |producer: Arc<FutureProducer>| async move {
                tracing::info!("Disconnecting Kafka producer");
                // librdkafka's flush blocks, so it runs off the async runtime.
                tokio::task::spawn_blocking(move || producer.flush(PRODUCER_FLUSH_TIMEOUT))
                    .await
                    .context("Producer flush task panicked")?
                    .context("Failed to flush Kafka producer")
            },
        );

        let schema_registry = {
            let endpoints = endpoints.clone();
            let credentials = auth.schema_registry.clone();
            Lazy::new(move || {
                let endpoints = endpoints.load();
                let base_url = endpoints.endpoint(RestClientKind::SchemaRegistry);
                tracing::info!(%base_url, "Initializing Schema Registry client");
                SchemaRegistryClient::new(base_url, credentials.clone())
            })
        };

        Self {
            kafka,
            admin,
            producer,
            cloud_rest: Self::rest_cell_for(&endpoints, &auth, RestClientKind::Cloud),
            flink_rest: Self::rest_cell_for(&endpoints, &auth, RestClientKind::Flink),
            schema_registry_rest: Self::rest_cell_for(
                &endpoints,
                &auth,
                RestClientKind::SchemaRegistry,
            ),
            kafka_rest: Self::rest_cell_for(&endpoints, &auth, RestClientKind::KafkaRest),
            telemetry_rest: Self::rest_cell_for(&endpoints, &auth, RestClientKind::Telemetry),
            schema_registry,
            endpoints,
            auth,
        }
    }

    fn rest_cell_for(
        endpoints: &Arc<ArcSwap<EndpointConfig>>,
        auth: &AuthConfig,
        kind: RestClientKind,
    ) -> Lazy<RestClient> {
        let endpoints = endpoints.clone();
        let credentials = auth.credentials(kind).clone();

        Lazy::new(move || {
            let endpoints = endpoints.load();
            let base_url = endpoints.endpoint(kind);
            tracing::info!(%kind, %base_url, "Initializing REST client");
            RestClient::new(base_url, credentials.clone())
        })
    }

    fn rest_cell(&self, kind: RestClientKind) -> &Lazy<RestClient> {
        match kind {
            RestClientKind::Cloud => &self.cloud_rest,
            RestClientKind::Flink => &self.flink_rest,
            RestClientKind::SchemaRegistry => &self.schema_registry_rest,
            RestClientKind::KafkaRest => &self.kafka_rest,
            RestClientKind::Telemetry => &self.telemetry_rest,
        }
    }

    /// The shared broker connection all derived Kafka clients start from.
    pub fn base_connection(&self) -> anyhow::Result<Arc<KafkaConnection>> {
        self.kafka.get()
    }

    /// The connected admin client, constructed on first use.
    pub async fn admin(&self) -> anyhow::Result<Arc<AdminClient<DefaultClientContext>>> {
        self.admin.get().await
    }

    /// The connected producer, constructed on first use.
    pub async fn producer(&self) -> anyhow::Result<Arc<FutureProducer>> {
        self.producer.get().await
    }

    /// A fresh consumer bound to a group id derived from `session`.
    ///
    /// Never memoized; see [`KafkaConnection::consumer`].
    pub fn consumer(&self, session: Option<&str>) -> anyhow::Result<StreamConsumer> {
        self.kafka.get()?.consumer(session)
    }

    /// The REST client for `kind`, bound to the kind's current endpoint.
    pub fn rest_client(&self, kind: RestClientKind) -> anyhow::Result<Arc<RestClient>> {
        self.rest_cell(kind).get()
    }

    /// The Schema Registry client.
    pub fn schema_registry_client(&self) -> anyhow::Result<Arc<SchemaRegistryClient>> {
        self.schema_registry.get()
    }

    /// A snapshot of the current endpoint map.
    pub fn endpoints(&self) -> Arc<EndpointConfig> {
        self.endpoints.load_full()
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    /// Repoints one REST destination and invalidates exactly that client's
    /// cell.
    ///
    /// The next `rest_client(kind)` call rebuilds against the new address.
    /// Clients already handed out stay bound to the previous address until
    /// their holders re-fetch.
    pub fn rebind_endpoint(&self, kind: RestClientKind, endpoint: impl Into<String>) {
        let endpoint = endpoint.into();
        tracing::info!(%kind, %endpoint, "Rebinding REST endpoint");

        self.endpoints.rcu(|current| {
            let mut next = (**current).clone();
            next.set_endpoint(kind, endpoint.clone());
            next
        });
        self.rest_cell(kind).invalidate();
    }

    /// Closes every connected client in dependency order.
    ///
    /// The admin and producer handles depend on the base connection, so both
    /// are closed first (concurrently, collecting failures instead of
    /// aborting on the first one) and the base-connection cell is cleared
    /// last. REST cells carry no teardown and are simply dropped with the
    /// registry. Idempotent: a second call (or a call on a registry that
    /// never constructed anything) is a no-op.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        tracing::info!("Shutting down client manager");

        let failures = close_derived_then_base(&self.admin, &self.producer, &self.kafka).await;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!(
                "Shutdown completed with failures: {}",
                failures.join("; ")
            ))
        }
    }
}

/// Closes the two derived Kafka cells concurrently, running both closes to
/// completion regardless of individual failures, then clears the base cell.
/// Returns one entry per failed close, naming the resource.
async fn close_derived_then_base<A, P, B>(
    admin: &AsyncLazy<A>,
    producer: &AsyncLazy<P>,
    base: &Lazy<B>,
) -> Vec<String>
where
    A: Send + Sync + 'static,
    P: Send + Sync + 'static,
{
    let (admin, producer) = futures_util::future::join(admin.close(), producer.close()).await;
    base.invalidate();

    let mut failures = Vec::new();
    if let Err(err) = admin {
        failures.push(format!("admin: {err:#}"));
    }
    if let Err(err) = producer {
        failures.push(format!("producer: {err:#}"));
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiCredentials, KafkaConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            kafka: KafkaConfig {
                bootstrap_servers: "localhost:9092".to_string(),
                client_id: "gateway-test".to_string(),
                consumer_group: "gateway".to_string(),
                credentials: None,
            },
            endpoints: EndpointConfig {
                cloud: "https://cloud.example".to_string(),
                flink: "https://flink.example".to_string(),
                schema_registry: "https://sr.example".to_string(),
                kafka_rest: "https://kafka.example".to_string(),
                telemetry: "https://telemetry.example".to_string(),
            },
            auth: AuthConfig {
                cloud: ApiCredentials::new("cloud-key", "cloud-secret"),
                flink: ApiCredentials::new("flink-key", "flink-secret"),
                schema_registry: ApiCredentials::new("sr-key", "sr-secret"),
                kafka_rest: ApiCredentials::new("kafka-key", "kafka-secret"),
            },
        }
    }

    #[test]
    fn rest_clients_are_memoized_per_kind() {
        let manager = ClientManager::new(test_config());

        let first = manager.rest_client(RestClientKind::Cloud).unwrap();
        let again = manager.rest_client(RestClientKind::Cloud).unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let flink = manager.rest_client(RestClientKind::Flink).unwrap();
        assert!(!Arc::ptr_eq(&first, &flink));
    }

    #[test]
    fn rebind_rebuilds_only_the_affected_client() {
        let manager = ClientManager::new(test_config());

        let cloud_before = manager.rest_client(RestClientKind::Cloud).unwrap();
        let flink_before = manager.rest_client(RestClientKind::Flink).unwrap();
        assert_eq!(cloud_before.base_url(), "https://cloud.example");

        manager.rebind_endpoint(RestClientKind::Cloud, "https://cloud2.example");

        let cloud_after = manager.rest_client(RestClientKind::Cloud).unwrap();
        assert_eq!(cloud_after.base_url(), "https://cloud2.example");
        assert!(!Arc::ptr_eq(&cloud_before, &cloud_after));

        // The reference fetched before the rebind keeps its old binding.
        assert_eq!(cloud_before.base_url(), "https://cloud.example");

        // Other kinds are untouched, instance included.
        let flink_after = manager.rest_client(RestClientKind::Flink).unwrap();
        assert!(Arc::ptr_eq(&flink_before, &flink_after));
        assert_eq!(flink_after.base_url(), "https://flink.example");
    }

    #[test]
    fn rebind_to_invalid_endpoint_fails_on_next_fetch_and_recovers() {
        let manager = ClientManager::new(test_config());

        manager.rebind_endpoint(RestClientKind::KafkaRest, "not a url");
        assert!(manager.rest_client(RestClientKind::KafkaRest).is_err());

        // The failed construction left the cell empty, so a rebind back to a
        // valid address recovers without further intervention.
        manager.rebind_endpoint(RestClientKind::KafkaRest, "https://kafka2.example");
        let client = manager.rest_client(RestClientKind::KafkaRest).unwrap();
        assert_eq!(client.base_url(), "https://kafka2.example");
    }

    #[test]
    fn schema_registry_client_binds_endpoint_and_credentials() {
        let manager = ClientManager::new(test_config());

        let client = manager.schema_registry_client().unwrap();
        assert_eq!(client.base_url(), "https://sr.example");

        let again = manager.schema_registry_client().unwrap();
        assert!(Arc::ptr_eq(&client, &again));
    }

    #[tokio::test]
    async fn producer_is_shared_across_concurrent_first_use() {
        let manager = ClientManager::new(test_config());

        let (a, b) = tokio::join!(manager.producer(), manager.producer());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[tokio::test]
    async fn shutdown_clears_kafka_clients_and_is_idempotent() {
        let manager = ClientManager::new(test_config());

        let connection = manager.base_connection().unwrap();
        manager.admin().await.unwrap();
        manager.producer().await.unwrap();

        manager.shutdown().await.unwrap();

        // The base-connection cell was cleared last; the next access
        // reconstructs from scratch.
        let rebuilt = manager.base_connection().unwrap();
        assert!(!Arc::ptr_eq(&connection, &rebuilt));

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_on_unused_registry_is_a_noop() {
        let manager = ClientManager::new(test_config());
        manager.shutdown().await.unwrap();
    }

    fn cell_with_failing_releaser(releases: &Arc<AtomicUsize>) -> AsyncLazy<usize> {
        let releases = releases.clone();
        AsyncLazy::new(
            || async move { Ok(1) },
            move |_value| {
                let releases = releases.clone();
                async move {
                    releases.fetch_add(1, Ordering::SeqCst);
                    anyhow::bail!("disconnect refused")
                }
            },
        )
    }

    #[tokio::test]
    async fn failed_closes_are_collected_and_the_base_cell_is_still_cleared() {
        let releases = Arc::new(AtomicUsize::new(0));
        let admin = cell_with_failing_releaser(&releases);
        let producer = cell_with_failing_releaser(&releases);
        let base = Lazy::new(|| Ok(0_usize));

        admin.get().await.unwrap();
        producer.get().await.unwrap();
        let before = base.get().unwrap();

        let failures = close_derived_then_base(&admin, &producer, &base).await;

        // Both releasers ran to completion even though both failed.
        assert_eq!(releases.load(Ordering::SeqCst), 2);
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("admin:"), "got: {}", failures[0]);
        assert!(failures[1].starts_with("producer:"), "got: {}", failures[1]);

        // The failures did not stop the base cell from being cleared: the
        // next access reconstructs.
        let after = base.get().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[tokio::test]
    async fn shutdown_reports_aggregated_failures_without_aborting() {
        let releases = Arc::new(AtomicUsize::new(0));
        let admin = cell_with_failing_releaser(&releases);
        let producer = cell_with_failing_releaser(&releases);
        let base = Lazy::new(|| Ok(0_usize));

        admin.get().await.unwrap();
        producer.get().await.unwrap();

        let failures = close_derived_then_base(&admin, &producer, &base).await;
        let message = format!("Shutdown completed with failures: {}", failures.join("; "));
        assert!(message.contains("admin: disconnect refused"));
        assert!(message.contains("producer: disconnect refused"));

        // Both cells are back to empty, so a second pass is a no-op and
        // releases nothing further.
        let failures = close_derived_then_base(&admin, &producer, &base).await;
        assert!(failures.is_empty());
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn consumers_are_constructed_fresh_per_call() {
        let manager = ClientManager::new(test_config());

        let connection = manager.base_connection().unwrap();
        assert_eq!(connection.group_id(Some("s1")), "gateway-s1");
        assert_eq!(connection.group_id(Some("s2")), "gateway-s2");
        assert_eq!(connection.group_id(None), "gateway");

        // No cell backs consumers: the accessor hands back an owned client,
        // never a shared one, so repeating a session key constructs a second
        // independent client rather than returning a cached instance.
        let _first = manager.consumer(Some("s1")).unwrap();
        let _second = manager.consumer(Some("s1")).unwrap();
        let _other = manager.consumer(Some("s2")).unwrap();
        let _base = manager.consumer(None).unwrap();
    }
}
