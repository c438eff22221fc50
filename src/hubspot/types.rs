//! HubSpot API wire models

use crate::error::{Error, Result};
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Item field holding the identifier
pub const FIELD_ID: &str = "id";

/// Format of timestamps in list query parameters
const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Format a timestamp the way list filters expect it
pub fn format_query_time(time: &DateTime<Utc>) -> String {
    time.format(QUERY_TIME_FORMAT).to_string()
}

// ============================================================================
// Items
// ============================================================================

/// One item returned by the API, an open-ended field map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(JsonObject);

impl Item {
    /// Wrap a field map
    pub fn new(fields: JsonObject) -> Self {
        Self(fields)
    }

    /// Get a raw field
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.0.get(field)
    }

    /// Borrow the field map
    pub fn fields(&self) -> &JsonObject {
        &self.0
    }

    /// Take the field map
    pub fn into_inner(self) -> JsonObject {
        self.0
    }

    /// The numeric identifier. The API always sends ids as numeric strings.
    pub fn id(&self) -> Result<i64> {
        let id = match self.0.get(FIELD_ID) {
            Some(JsonValue::String(id)) => id,
            _ => return Err(Error::ItemIdNotString),
        };

        id.parse::<i64>()
            .map_err(|_| Error::ItemIdNotNumeric { id: id.clone() })
    }

    /// Parse an RFC3339 time field
    pub fn time_field(&self, name: &str) -> Result<DateTime<Utc>> {
        let value = match self.0.get(name) {
            Some(JsonValue::String(value)) => value,
            _ => {
                return Err(Error::FieldNotExist {
                    field: name.to_string(),
                })
            }
        };

        DateTime::parse_from_rfc3339(value)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| Error::InvalidTimeField {
                field: name.to_string(),
                value: value.clone(),
            })
    }

    /// Parse an optional RFC3339 time field, absent or null yields `None`
    pub fn optional_time_field(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        match self.0.get(name) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(_) => self.time_field(name).map(Some),
        }
    }
}

impl From<JsonObject> for Item {
    fn from(fields: JsonObject) -> Self {
        Self(fields)
    }
}

// ============================================================================
// List
// ============================================================================

/// Optional parameters of a list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: Option<usize>,
    pub after: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
    pub sort: Option<String>,
    pub archived: bool,
    pub properties: Vec<String>,
}

impl ListOptions {
    /// Encode as query parameters, skipping absent options
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();

        if let Some(limit) = self.limit {
            query.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(after) = &self.after {
            query.push(("after".to_string(), after.clone()));
        }
        if let Some(t) = &self.created_after {
            query.push(("createdAfter".to_string(), format_query_time(t)));
        }
        if let Some(t) = &self.created_before {
            query.push(("createdBefore".to_string(), format_query_time(t)));
        }
        if let Some(t) = &self.updated_after {
            query.push(("updatedAfter".to_string(), format_query_time(t)));
        }
        if let Some(sort) = &self.sort {
            query.push(("sort".to_string(), sort.clone()));
        }
        if self.archived {
            query.push(("archived".to_string(), "true".to_string()));
        }
        if !self.properties.is_empty() {
            query.push(("properties".to_string(), self.properties.join(",")));
        }

        query
    }
}

/// Response of list and search calls
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default)]
    pub results: Vec<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paging: Option<Paging>,
}

impl ListResponse {
    /// The follow-on cursor link, if another page exists
    pub fn next_link(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|p| p.next.link.as_deref())
            .filter(|l| !l.is_empty())
    }
}

/// Paging section of a list response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: PagingNext,
}

/// Pointer to the next page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagingNext {
    #[serde(default)]
    pub after: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

// ============================================================================
// Search
// ============================================================================

/// Search filter operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOperator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Sort direction of a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Body of a search call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_groups: Vec<FilterGroup>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<SearchSort>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
}

/// Filters in one group are ANDed, groups are ORed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterGroup {
    pub filters: Vec<Filter>,
}

/// A single property filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub property_name: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl Filter {
    /// `property >= value`
    pub fn gte(property: impl Into<String>, value: impl ToString) -> Self {
        Self {
            property_name: property.into(),
            operator: FilterOperator::Gte,
            value: value.to_string(),
        }
    }

    /// `property < value`
    pub fn lt(property: impl Into<String>, value: impl ToString) -> Self {
        Self {
            property_name: property.into(),
            operator: FilterOperator::Lt,
            value: value.to_string(),
        }
    }
}

/// Sort clause of a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSort {
    pub property_name: String,
    pub direction: SortDirection,
}

impl SearchSort {
    /// Ascending sort on a property
    pub fn ascending(property: impl Into<String>) -> Self {
        Self {
            property_name: property.into(),
            direction: SortDirection::Ascending,
        }
    }
}

/// Render a timestamp as the epoch milliseconds search filters compare against
pub fn search_time_value(time: &DateTime<Utc>) -> String {
    time.timestamp_millis().to_string()
}

/// RFC3339 with millisecond precision, used in record metadata
pub fn format_rfc3339(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}
