//! In-memory [`ResourceApi`] used by unit tests
//!
//! Mirrors the filter semantics of the real endpoints: `createdAfter` and
//! `updatedAfter` are inclusive, `createdBefore` is exclusive, list pages
//! carry a follow-on link, search pages only an `after` offset. Offsets index
//! into the filtered, sorted item set.

use crate::error::{Error, Result};
use crate::hubspot::{
    format_rfc3339, FilterOperator, Item, ListOptions, ListResponse, Paging, PagingNext,
    ResourceApi, SearchRequest,
};
use crate::types::{JsonObject, JsonValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

/// One stored item
#[derive(Debug, Clone)]
pub(crate) struct FakeItem {
    pub id: i64,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub deleted: Option<DateTime<Utc>>,
    pub raw_id: Option<JsonValue>,
}

impl FakeItem {
    pub fn new(id: i64, created: DateTime<Utc>) -> Self {
        Self {
            id,
            created,
            updated: created,
            deleted: None,
            raw_id: None,
        }
    }

    pub fn updated(mut self, updated: DateTime<Utc>) -> Self {
        self.updated = updated;
        self
    }

    pub fn deleted(mut self, deleted: DateTime<Utc>) -> Self {
        self.deleted = Some(deleted);
        self
    }

    pub fn raw_id(mut self, id: JsonValue) -> Self {
        self.raw_id = Some(id);
        self
    }

    fn render(&self, names: &FieldNames) -> Item {
        let deleted = self.deleted.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let mut fields = JsonObject::new();
        fields.insert(
            "id".to_string(),
            self.raw_id
                .clone()
                .unwrap_or_else(|| JsonValue::from(self.id.to_string())),
        );
        fields.insert(names.created.to_string(), json!(format_rfc3339(&self.created)));
        fields.insert(names.updated.to_string(), json!(format_rfc3339(&self.updated)));
        fields.insert(names.deleted.to_string(), json!(format_rfc3339(&deleted)));
        fields.insert(
            "properties".to_string(),
            json!({"name": format!("item-{}", self.id)}),
        );
        Item::new(fields)
    }
}

/// Item fields the timestamps are rendered under
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldNames {
    pub created: &'static str,
    pub updated: &'static str,
    pub deleted: &'static str,
}

impl FieldNames {
    /// Names used by the blog endpoints
    pub const BLOG: Self = Self {
        created: "created",
        updated: "updated",
        deleted: "deletedAt",
    };
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            created: "createdAt",
            updated: "updatedAt",
            deleted: "deletedAt",
        }
    }
}

#[derive(Default)]
struct FakeState {
    items: Vec<FakeItem>,
    links: HashMap<String, (ListOptions, usize)>,
    list_calls: Vec<ListOptions>,
    search_calls: Vec<SearchRequest>,
    failure: Option<u16>,
    names: FieldNames,
    hang: bool,
}

/// In-memory API over a mutable item set
#[derive(Default)]
pub(crate) struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn with_items(items: Vec<FakeItem>) -> Self {
        let api = Self::default();
        api.state().items = items;
        api
    }

    /// Render items under other field names
    pub fn with_field_names(items: Vec<FakeItem>, names: FieldNames) -> Self {
        let api = Self::with_items(items);
        api.state().names = names;
        api
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn add(&self, item: FakeItem) {
        self.state().items.push(item);
    }

    /// Every following call fails with this status until cleared
    pub fn fail_with(&self, status: Option<u16>) {
        self.state().failure = status;
    }

    /// Every following call waits forever
    pub fn hang(&self) {
        self.state().hang = true;
    }

    /// Never resolves once [`FakeApi::hang`] was called
    async fn wait_if_hanging(&self) {
        let hang = self.state().hang;
        if hang {
            std::future::pending::<()>().await;
        }
    }

    /// Options of every `list` call, links resolved to their options
    pub fn list_calls(&self) -> Vec<ListOptions> {
        self.state().list_calls.clone()
    }

    pub fn search_calls(&self) -> Vec<SearchRequest> {
        self.state().search_calls.clone()
    }

    fn check_failure(state: &FakeState) -> Result<()> {
        match state.failure {
            Some(status) => Err(Error::http_status(status, "fake failure")),
            None => Ok(()),
        }
    }

    fn list_page(state: &mut FakeState, options: &ListOptions, offset: usize) -> ListResponse {
        let mut matched: Vec<&FakeItem> = state
            .items
            .iter()
            .filter(|item| match options.updated_after {
                Some(after) => item.updated >= after,
                None => {
                    options.created_before.map_or(true, |cut| item.created < cut)
                        && options.created_after.map_or(true, |from| item.created >= from)
                }
            })
            .collect();

        if options.updated_after.is_some() {
            matched.sort_by_key(|item| (item.updated, item.id));
        } else {
            matched.sort_by_key(|item| (item.created, item.id));
        }

        let limit = options.limit.unwrap_or(10);
        let end = (offset + limit).min(matched.len());
        let results: Vec<Item> = matched[offset.min(end)..end]
            .iter()
            .map(|item| item.render(&state.names))
            .collect();
        let total = matched.len() as u64;

        let paging = if end < matched.len() {
            let link = format!("https://fake.local/next/{}", state.links.len());
            state.links.insert(link.clone(), (options.clone(), end));
            Some(Paging {
                next: PagingNext {
                    after: end.to_string(),
                    link: Some(link),
                },
            })
        } else {
            None
        };

        ListResponse {
            total: Some(total),
            results,
            paging,
        }
    }
}

fn millis(value: &str) -> i64 {
    value.parse().unwrap_or_default()
}

#[async_trait]
impl ResourceApi for FakeApi {
    async fn list(&self, _resource: &str, options: &ListOptions) -> Result<ListResponse> {
        self.wait_if_hanging().await;
        let mut state = self.state();
        Self::check_failure(&state)?;
        state.list_calls.push(options.clone());

        let offset = options
            .after
            .as_deref()
            .and_then(|after| after.parse().ok())
            .unwrap_or(0);
        Ok(Self::list_page(&mut state, options, offset))
    }

    async fn list_by_next_link(&self, link: &str) -> Result<ListResponse> {
        self.wait_if_hanging().await;
        let mut state = self.state();
        Self::check_failure(&state)?;

        let (options, offset) = state
            .links
            .get(link)
            .cloned()
            .ok_or_else(|| Error::http_status(404, "unknown link"))?;
        state.list_calls.push(options.clone());

        Ok(Self::list_page(&mut state, &options, offset))
    }

    async fn search(&self, _resource: &str, request: &SearchRequest) -> Result<ListResponse> {
        self.wait_if_hanging().await;
        let mut state = self.state();
        Self::check_failure(&state)?;
        state.search_calls.push(request.clone());

        let filters: Vec<_> = request
            .filter_groups
            .iter()
            .flat_map(|group| group.filters.iter())
            .collect();

        let mut matched: Vec<&FakeItem> = state
            .items
            .iter()
            .filter(|item| {
                filters.iter().all(|filter| {
                    let value = millis(&filter.value);
                    match (filter.property_name.as_str(), filter.operator) {
                        ("createdate", FilterOperator::Lt) => {
                            item.created.timestamp_millis() < value
                        }
                        ("lastmodifieddate", FilterOperator::Gte) => {
                            item.updated.timestamp_millis() >= value
                        }
                        ("hs_object_id", FilterOperator::Gte) => item.id >= value,
                        _ => true,
                    }
                })
            })
            .collect();

        let by_update = request
            .sorts
            .first()
            .is_some_and(|sort| sort.property_name == "lastmodifieddate");
        if by_update {
            matched.sort_by_key(|item| (item.updated, item.id));
        } else {
            matched.sort_by_key(|item| (item.created, item.id));
        }

        let offset = request
            .after
            .as_deref()
            .and_then(|after| after.parse().ok())
            .unwrap_or(0);
        let limit = request.limit.unwrap_or(10);
        let end = (offset + limit).min(matched.len());
        let results = matched[offset.min(end)..end]
            .iter()
            .map(|item| item.render(&state.names))
            .collect();

        let paging = (end < matched.len()).then(|| Paging {
            next: PagingNext {
                after: end.to_string(),
                link: None,
            },
        });

        Ok(ListResponse {
            total: Some(matched.len() as u64),
            results,
            paging,
        })
    }
}
