//! Schema Registry client.
//!
//! A thin, typed wrapper over the registry's REST surface, bound at
//! construction to the schema-registry endpoint and credentials. Schema
//! encoding and serde framing are the callers' concern.

use crate::clients::rest::RestClient;
use crate::config::ApiCredentials;
use serde::Deserialize;

/// A schema version registered under a subject.
#[derive(Clone, Debug, Deserialize)]
pub struct RegisteredSchema {
    pub subject: String,
    pub id: u32,
    pub version: u32,
    pub schema: String,
    /// Absent in registry responses for Avro schemas.
    #[serde(rename = "schemaType", default = "default_schema_type")]
    pub schema_type: String,
}

fn default_schema_type() -> String {
    "AVRO".to_string()
}

pub struct SchemaRegistryClient {
    rest: RestClient,
}

impl SchemaRegistryClient {
    pub fn new(base_url: &str, credentials: ApiCredentials) -> anyhow::Result<Self> {
        Ok(Self {
            rest: RestClient::new(base_url, credentials)?,
        })
    }

    /// The registry endpoint this client was constructed against.
    pub fn base_url(&self) -> &str {
        self.rest.base_url()
    }

    /// Lists all subjects known to the registry.
    pub async fn list_subjects(&self) -> anyhow::Result<Vec<String>> {
        self.rest.get_json("subjects").await
    }

    /// Fetches the latest schema version registered under `subject`.
    pub async fn latest_version(&self, subject: &str) -> anyhow::Result<RegisteredSchema> {
        self.rest
            .get_json(&format!("subjects/{}/versions/latest", subject))
            .await
    }
}
