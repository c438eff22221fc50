//! Pagination strategy implementations
//!
//! Each strategy maps snapshot and change queries onto one of the two read
//! primitives the API offers.

use super::types::{Cursor, ItemFields, Page, SnapshotQuery};
use crate::error::{Result, ResultExt};
use crate::hubspot::{
    search_time_value, Filter, FilterGroup, ListOptions, ListResponse, ResourceApi,
    SearchFields, SearchRequest, SearchSort, TimestampFields,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Turn the paging section of a response into a continuation
fn next_cursor(response: &ListResponse) -> Option<Cursor> {
    let next = &response.paging.as_ref()?.next;

    match next.link.as_deref() {
        Some(link) if !link.is_empty() => Some(Cursor::Link(link.to_string())),
        _ if !next.after.is_empty() => Some(Cursor::After(next.after.clone())),
        _ => None,
    }
}

// ============================================================================
// Timestamp Pagination
// ============================================================================

/// List endpoint paging (CMS resources)
///
/// Filters on `createdBefore` / `updatedAfter` and follows the `paging.next.link`
/// cursor, which carries every filter of the original request.
#[derive(Clone)]
pub struct TimestampPaged {
    api: Arc<dyn ResourceApi>,
    pub(crate) resource: String,
    fields: TimestampFields,
    page_size: usize,
    properties: Vec<String>,
}

impl TimestampPaged {
    /// Create a new timestamp strategy
    pub fn new(
        api: Arc<dyn ResourceApi>,
        resource: impl Into<String>,
        fields: TimestampFields,
        page_size: usize,
        properties: Vec<String>,
    ) -> Self {
        Self {
            api,
            resource: resource.into(),
            fields,
            page_size,
            properties,
        }
    }

    pub(crate) async fn fetch_snapshot_page(&self, query: &SnapshotQuery) -> Result<Page> {
        let response = match &query.cursor {
            Some(Cursor::Link(link)) => self
                .api
                .list_by_next_link(link)
                .await
                .context("list timestamp items by next link")?,
            cursor => {
                let after = match cursor {
                    Some(Cursor::After(after)) => Some(after.clone()),
                    _ => None,
                };
                let created_after = if after.is_none() {
                    query.created_after
                } else {
                    None
                };

                let options = ListOptions {
                    limit: Some(self.page_size),
                    after,
                    created_before: Some(query.created_before),
                    created_after,
                    sort: Some(self.fields.created_at.clone()),
                    properties: self.properties.clone(),
                    ..Default::default()
                };

                self.api
                    .list(&self.resource, &options)
                    .await
                    .context("list timestamp items")?
            }
        };

        let next = next_cursor(&response);
        let mut items = response.results;

        // createdAfter is inclusive, so a resumed query returns the last
        // delivered item again
        if query.cursor.is_none() && query.created_after.is_some() {
            if let Some(last_id) = query.last_item_id {
                items.retain(|item| item.id().map_or(true, |id| id != last_id));
            }
        }

        Ok(Page { items, next })
    }

    pub(crate) async fn fetch_changes(
        &self,
        updated_after: DateTime<Utc>,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        let response = match cursor {
            Some(Cursor::Link(link)) => self
                .api
                .list_by_next_link(link)
                .await
                .context("list items by next link")?,
            cursor => {
                let options = ListOptions {
                    limit: Some(self.page_size),
                    after: match cursor {
                        Some(Cursor::After(after)) => Some(after.clone()),
                        _ => None,
                    },
                    updated_after: Some(updated_after),
                    sort: Some(self.fields.updated_at.clone()),
                    archived: true,
                    properties: self.properties.clone(),
                    ..Default::default()
                };

                self.api
                    .list(&self.resource, &options)
                    .await
                    .context("list items")?
            }
        };

        Ok(Page {
            next: next_cursor(&response),
            items: response.results,
        })
    }

    pub(crate) fn fields(&self) -> ItemFields {
        ItemFields {
            created_at: self.fields.created_at.clone(),
            updated_at: self.fields.updated_at.clone(),
            deleted_at: self.fields.deleted_at.clone(),
        }
    }
}

// ============================================================================
// Search Pagination
// ============================================================================

/// Search endpoint paging (CRM objects)
///
/// The search endpoint has no stable cursor, so snapshot pages are bounded by
/// the numeric object id of the last delivered item.
#[derive(Clone)]
pub struct SearchPaged {
    api: Arc<dyn ResourceApi>,
    pub(crate) resource: String,
    fields: SearchFields,
    page_size: usize,
    properties: Vec<String>,
}

impl SearchPaged {
    /// Create a new search strategy
    pub fn new(
        api: Arc<dyn ResourceApi>,
        resource: impl Into<String>,
        fields: SearchFields,
        page_size: usize,
        properties: Vec<String>,
    ) -> Self {
        Self {
            api,
            resource: resource.into(),
            fields,
            page_size,
            properties,
        }
    }

    pub(crate) async fn fetch_snapshot_page(&self, query: &SnapshotQuery) -> Result<Page> {
        let mut filters = vec![Filter::lt(
            &self.fields.created_at_property,
            search_time_value(&query.created_before),
        )];
        if let Some(last_id) = query.last_item_id {
            filters.push(Filter::gte(
                &self.fields.object_id_property,
                last_id.saturating_add(1),
            ));
        }

        let request = SearchRequest {
            limit: Some(self.page_size),
            filter_groups: vec![FilterGroup { filters }],
            sorts: vec![SearchSort::ascending(&self.fields.created_at_property)],
            properties: self.properties.clone(),
            ..Default::default()
        };

        let response = self
            .api
            .search(&self.resource, &request)
            .await
            .context("list search items")?;

        Ok(Page {
            next: next_cursor(&response),
            items: response.results,
        })
    }

    /// Search has no links, a `Link` cursor is treated like an offset
    pub(crate) async fn fetch_changes(
        &self,
        updated_after: DateTime<Utc>,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        let after = cursor.map(|cursor| match cursor {
            Cursor::After(after) | Cursor::Link(after) => after.clone(),
        });

        let request = SearchRequest {
            limit: Some(self.page_size),
            after,
            filter_groups: vec![FilterGroup {
                filters: vec![Filter::gte(
                    &self.fields.updated_at_property,
                    search_time_value(&updated_after),
                )],
            }],
            sorts: vec![SearchSort::ascending(&self.fields.updated_at_property)],
            properties: self.properties.clone(),
            ..Default::default()
        };

        let response = self
            .api
            .search(&self.resource, &request)
            .await
            .context("list items")?;

        Ok(Page {
            next: next_cursor(&response),
            items: response.results,
        })
    }

    pub(crate) fn fields(&self) -> ItemFields {
        ItemFields {
            created_at: self.fields.created_at.clone(),
            updated_at: self.fields.updated_at.clone(),
            deleted_at: None,
        }
    }
}
