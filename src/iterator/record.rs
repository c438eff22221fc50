//! Emitted change records

use crate::hubspot::{format_rfc3339, FIELD_ID};
use crate::types::{JsonObject, JsonValue};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata key holding the item's creation time
pub const METADATA_CREATED_AT: &str = "createdAt";

/// Kind of change a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Snapshot,
    Create,
    Update,
    Delete,
}

/// One change event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub operation: Operation,
    /// Marshalled [`Position`](super::Position) after this record
    #[serde(with = "position_bytes")]
    pub position: Bytes,
    pub key: JsonObject,
    /// Full item, absent on deletes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonObject>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Record {
    fn new(
        operation: Operation,
        position: Bytes,
        id: i64,
        payload: Option<JsonObject>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut key = JsonObject::new();
        key.insert(FIELD_ID.to_string(), JsonValue::from(id));

        let mut metadata = BTreeMap::new();
        metadata.insert(METADATA_CREATED_AT.to_string(), format_rfc3339(&created_at));

        Self {
            operation,
            position,
            key,
            payload,
            metadata,
        }
    }

    pub fn snapshot(position: Bytes, id: i64, payload: JsonObject, created_at: DateTime<Utc>) -> Self {
        Self::new(Operation::Snapshot, position, id, Some(payload), created_at)
    }

    pub fn create(position: Bytes, id: i64, payload: JsonObject, created_at: DateTime<Utc>) -> Self {
        Self::new(Operation::Create, position, id, Some(payload), created_at)
    }

    pub fn update(position: Bytes, id: i64, payload: JsonObject, created_at: DateTime<Utc>) -> Self {
        Self::new(Operation::Update, position, id, Some(payload), created_at)
    }

    /// Deletes carry only the key
    pub fn delete(position: Bytes, id: i64, created_at: DateTime<Utc>) -> Self {
        Self::new(Operation::Delete, position, id, None, created_at)
    }

    /// Creation time recorded in metadata
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get(METADATA_CREATED_AT)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Positions are JSON text, so they travel as a plain string
mod position_bytes {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Bytes::from(s))
    }
}
