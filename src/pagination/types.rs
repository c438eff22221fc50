//! Pagination types
//!
//! Defines the page model shared by both strategies and the tagged variant
//! the iterators dispatch through.

use super::strategies::{SearchPaged, TimestampPaged};
use crate::error::Result;
use crate::hubspot::{Item, PaginationCapability, ResourceApi, ResourceRegistry};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Continuation returned with a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Full link with every filter embedded, followed verbatim
    Link(String),
    /// Opaque `after` token, sent alongside the original filters
    After(String),
}

/// One page of items
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Items in the order the API returned them
    pub items: Vec<Item>,
    /// Present while more pages exist
    pub next: Option<Cursor>,
}

/// Bounds of one snapshot fetch
#[derive(Debug, Clone, Default)]
pub struct SnapshotQuery {
    /// Exclusive upper bound on creation time, the snapshot cut
    pub created_before: DateTime<Utc>,
    /// Inclusive lower bound on creation time when resuming without a cursor
    pub created_after: Option<DateTime<Utc>>,
    /// Identifier of the last delivered item
    pub last_item_id: Option<i64>,
    /// Continuation from the previous page
    pub cursor: Option<Cursor>,
}

/// Item fields the iterators read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFields {
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

/// Pagination strategy of a resource, chosen once from its capability
#[derive(Clone)]
pub enum Pagination {
    Timestamp(TimestampPaged),
    Search(SearchPaged),
}

impl Pagination {
    /// Select the strategy the registry declares for `resource`
    pub fn for_resource(
        registry: &ResourceRegistry,
        resource: &str,
        api: Arc<dyn ResourceApi>,
        page_size: usize,
        extra_properties: Vec<String>,
    ) -> Result<Self> {
        let pagination = match registry.capability(resource)? {
            PaginationCapability::Timestamp(fields) => Self::Timestamp(TimestampPaged::new(
                api,
                resource,
                fields.clone(),
                page_size,
                extra_properties,
            )),
            PaginationCapability::Search(fields) => Self::Search(SearchPaged::new(
                api,
                resource,
                fields.clone(),
                page_size,
                extra_properties,
            )),
        };

        Ok(pagination)
    }

    /// Fetch the next page of items created before the snapshot cut
    pub async fn fetch_snapshot_page(&self, query: &SnapshotQuery) -> Result<Page> {
        match self {
            Self::Timestamp(strategy) => strategy.fetch_snapshot_page(query).await,
            Self::Search(strategy) => strategy.fetch_snapshot_page(query).await,
        }
    }

    /// Fetch items changed at or after `updated_after`, oldest change first.
    /// `cursor` continues a previous fetch with the same bound.
    pub async fn fetch_changes(
        &self,
        updated_after: DateTime<Utc>,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        match self {
            Self::Timestamp(strategy) => strategy.fetch_changes(updated_after, cursor).await,
            Self::Search(strategy) => strategy.fetch_changes(updated_after, cursor).await,
        }
    }

    /// Field names to read creation, update and deletion times from
    pub fn fields(&self) -> ItemFields {
        match self {
            Self::Timestamp(strategy) => strategy.fields(),
            Self::Search(strategy) => strategy.fields(),
        }
    }

    /// Resource this strategy pages through
    pub fn resource(&self) -> &str {
        match self {
            Self::Timestamp(strategy) => &strategy.resource,
            Self::Search(strategy) => &strategy.resource,
        }
    }

    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timestamp(_) => "timestamp",
            Self::Search(_) => "search",
        }
    }
}

impl std::fmt::Debug for Pagination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pagination")
            .field("kind", &self.kind())
            .field("resource", &self.resource())
            .finish_non_exhaustive()
    }
}
