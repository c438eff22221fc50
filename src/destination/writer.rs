//! Record writer and destination

use crate::config::ConnectorConfig;
use crate::error::{Error, Result, ResultExt};
use crate::hubspot::{HubSpotClient, ResourceRegistry};
use crate::iterator::{Operation, Record};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Applies one record to the remote system
#[async_trait]
pub trait RecordWriter: Send + Sync {
    async fn write(&self, record: &Record) -> Result<()>;
}

/// Writes records of one resource through the HubSpot API
#[derive(Debug)]
pub struct Writer {
    client: Arc<HubSpotClient>,
    resource: String,
}

impl Writer {
    pub fn new(client: Arc<HubSpotClient>, resource: impl Into<String>) -> Self {
        Self {
            client,
            resource: resource.into(),
        }
    }

    async fn insert(&self, record: &Record) -> Result<()> {
        let payload = payload(record)?;

        self.client
            .create(&self.resource, payload)
            .await
            .with_context(|| format!("create {:?} item", self.resource))
    }

    async fn update(&self, record: &Record) -> Result<()> {
        let id = key_value(&record.key).context("get key's value")?;
        let payload = payload(record)?;

        self.client
            .update(&self.resource, &id, payload)
            .await
            .with_context(|| format!("update {:?} item", self.resource))
    }

    async fn delete(&self, record: &Record) -> Result<()> {
        let id = key_value(&record.key).context("get key's value")?;

        self.client
            .delete(&self.resource, &id)
            .await
            .with_context(|| format!("delete {:?} item", self.resource))
    }
}

#[async_trait]
impl RecordWriter for Writer {
    async fn write(&self, record: &Record) -> Result<()> {
        let result = match record.operation {
            Operation::Snapshot | Operation::Create => self.insert(record).await,
            Operation::Update => self.update(record).await,
            Operation::Delete => self.delete(record).await,
        };

        result.context("route record")
    }
}

fn payload(record: &Record) -> Result<&JsonObject> {
    record
        .payload
        .as_ref()
        .filter(|payload| !payload.is_empty())
        .ok_or(Error::EmptyPayload)
}

/// Id of the item a key refers to.
///
/// Only single-field keys are supported. Strings are taken as is, numbers are
/// rendered as integers.
pub fn key_value(key: &JsonObject) -> Result<String> {
    if key.len() > 1 {
        return Err(Error::CompositeKeyNotSupported);
    }

    let value = match key.values().next() {
        Some(JsonValue::String(id)) => id.clone(),
        Some(JsonValue::Number(number)) => match number.as_i64() {
            Some(id) => id.to_string(),
            None => (number.as_f64().unwrap_or_default() as i64).to_string(),
        },
        _ => String::new(),
    };

    if value.is_empty() {
        return Err(Error::EmptyKey);
    }

    Ok(value)
}

/// Destination of one resource
pub struct Destination {
    writer: Arc<dyn RecordWriter>,
}

impl Destination {
    pub fn new(writer: Arc<dyn RecordWriter>) -> Self {
        Self { writer }
    }

    /// Validate the config and write through the HubSpot API
    pub fn open(config: &ConnectorConfig, registry: Arc<ResourceRegistry>) -> Result<Self> {
        config.validate(&registry).context("validate config")?;

        let client = HubSpotClient::new(config.client_config(), registry)
            .context("create api client")?;

        Ok(Self::new(Arc::new(Writer::new(
            Arc::new(client),
            config.resource.clone(),
        ))))
    }

    /// Write records in order, stopping at the first failure.
    ///
    /// Returns how many records were written, and the failure if any.
    pub async fn write(&self, records: &[Record]) -> (usize, Result<()>) {
        for (written, record) in records.iter().enumerate() {
            if let Err(err) = self.writer.write(record).await {
                return (written, Err(err.wrap("write record")));
            }
        }

        debug!(count = records.len(), "records written");
        (records.len(), Ok(()))
    }
}
