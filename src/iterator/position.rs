//! Resume checkpoint exchanged with the host
//!
//! Wire format is a JSON object: `mode` (`"snapshot"` | `"cdc"`), and the
//! optional `itemId`, `initialTimestamp` and `timestamp` keys, omitted when
//! absent.

use crate::error::{Error, Result};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which sub-iterator produced a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    Snapshot,
    Cdc,
}

impl PositionMode {
    /// Wire name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Cdc => "cdc",
        }
    }
}

impl std::str::FromStr for PositionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "snapshot" => Ok(Self::Snapshot),
            "cdc" => Ok(Self::Cdc),
            other => Err(Error::InvalidPositionMode {
                mode: other.to_string(),
            }),
        }
    }
}

/// Identity of the last processed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Numeric(i64),
    Text(String),
}

impl ItemId {
    /// Numeric value, parsing textual ids
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Numeric(id) => Some(*id),
            Self::Text(id) => id.parse().ok(),
        }
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        Self::Numeric(id)
    }
}

/// Resume checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub mode: PositionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ItemId>,
    /// Snapshot cut, fixed when a snapshot starts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_timestamp: Option<DateTime<Utc>>,
    /// CDC watermark, or creation time of the last snapshot item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Wire shape with the mode kept as a string so an unknown mode is told
/// apart from malformed JSON
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPosition {
    mode: String,
    #[serde(default)]
    item_id: Option<ItemId>,
    #[serde(default)]
    initial_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl Position {
    /// Fresh snapshot position cut at `initial_timestamp`
    pub fn snapshot(initial_timestamp: DateTime<Utc>) -> Self {
        Self {
            mode: PositionMode::Snapshot,
            item_id: None,
            initial_timestamp: Some(initial_timestamp),
            timestamp: None,
        }
    }

    /// CDC position with the given watermark
    pub fn cdc(timestamp: DateTime<Utc>) -> Self {
        Self {
            mode: PositionMode::Cdc,
            item_id: None,
            initial_timestamp: None,
            timestamp: Some(timestamp),
        }
    }

    /// Serialize to the opaque bytes handed to the host
    pub fn marshal(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Parse bytes previously produced by [`Position::marshal`].
    ///
    /// Empty input fails with [`Error::EmptyPosition`], the cold start signal.
    /// Anything else that is not a position fails with
    /// [`Error::PositionParse`] or [`Error::InvalidPositionMode`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::EmptyPosition);
        }

        let raw: RawPosition =
            serde_json::from_slice(bytes).map_err(|e| Error::PositionParse {
                message: e.to_string(),
            })?;

        Ok(Self {
            mode: raw.mode.parse()?,
            item_id: raw.item_id,
            initial_timestamp: raw.initial_timestamp,
            timestamp: raw.timestamp,
        })
    }

    /// Parse, treating empty input as "no position yet"
    pub fn parse_optional(bytes: &[u8]) -> Result<Option<Self>> {
        match Self::parse(bytes) {
            Ok(position) => Ok(Some(position)),
            Err(Error::EmptyPosition) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Numeric id of the last processed item
    pub fn last_item_id(&self) -> Option<i64> {
        self.item_id.as_ref().and_then(ItemId::as_i64)
    }
}
