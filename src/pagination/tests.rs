//! Tests for pagination module

use super::*;
use crate::error::Error;
use crate::hubspot::{FilterOperator, ResourceApi, ResourceRegistry, SortDirection};
use crate::testing::{FakeApi, FakeItem};
use chrono::{DateTime, Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 10, 1, 12, 0, 0).unwrap()
}

fn fake(count: i64) -> Arc<FakeApi> {
    Arc::new(FakeApi::with_items(
        (1..=count)
            .map(|id| FakeItem::new(id, base() + Duration::minutes(id)))
            .collect(),
    ))
}

fn strategy(api: Arc<FakeApi>, resource: &str, page_size: usize) -> Pagination {
    let api: Arc<dyn ResourceApi> = api;
    Pagination::for_resource(
        &ResourceRegistry::hubspot(),
        resource,
        api,
        page_size,
        vec!["email".to_string()],
    )
    .unwrap()
}

fn ids(page: &Page) -> Vec<i64> {
    page.items.iter().map(|item| item.id().unwrap()).collect()
}

// ============================================================================
// Selection
// ============================================================================

#[test]
fn test_for_resource_selects_strategy() {
    let api = fake(0);

    let pages = strategy(api.clone(), "cms.pages.site", 10);
    assert_eq!(pages.kind(), "timestamp");
    assert_eq!(pages.resource(), "cms.pages.site");
    assert_eq!(pages.fields().deleted_at.as_deref(), Some("deletedAt"));

    let contacts = strategy(api.clone(), "crm.contacts", 10);
    assert_eq!(contacts.kind(), "search");
    assert_eq!(contacts.fields().created_at, "createdAt");
    assert_eq!(contacts.fields().deleted_at, None);

    let registry = ResourceRegistry::hubspot();
    for resource in ["marketing.forms", "crm.unknown"] {
        let api: Arc<dyn ResourceApi> = api.clone();
        let err = Pagination::for_resource(&registry, resource, api, 10, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedResource { .. }));
    }
}

// ============================================================================
// Timestamp Pagination
// ============================================================================

#[tokio::test]
async fn test_timestamp_snapshot_follows_links() {
    let api = fake(5);
    let pagination = strategy(api.clone(), "cms.pages.site", 2);
    let cut = base() + Duration::minutes(4);

    let first = pagination
        .fetch_snapshot_page(&SnapshotQuery {
            created_before: cut,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ids(&first), vec![1, 2]);
    assert!(matches!(first.next, Some(Cursor::Link(_))));

    let second = pagination
        .fetch_snapshot_page(&SnapshotQuery {
            created_before: cut,
            last_item_id: Some(2),
            cursor: first.next.clone(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(ids(&second), vec![3]);
    assert!(second.next.is_none());

    let calls = api.list_calls();
    assert_eq!(calls[0].created_before, Some(cut));
    assert_eq!(calls[0].sort.as_deref(), Some("createdAt"));
    assert_eq!(calls[0].limit, Some(2));
    assert_eq!(calls[0].properties, vec!["email".to_string()]);
    assert!(!calls[0].archived);
}

#[tokio::test]
async fn test_timestamp_snapshot_resume_skips_boundary_item() {
    let api = fake(5);
    let pagination = strategy(api.clone(), "cms.pages.site", 10);

    let page = pagination
        .fetch_snapshot_page(&SnapshotQuery {
            created_before: base() + Duration::hours(1),
            created_after: Some(base() + Duration::minutes(2)),
            last_item_id: Some(2),
            cursor: None,
        })
        .await
        .unwrap();

    assert_eq!(ids(&page), vec![3, 4, 5]);
    assert_eq!(
        api.list_calls()[0].created_after,
        Some(base() + Duration::minutes(2))
    );
}

#[tokio::test]
async fn test_timestamp_snapshot_after_cursor_replaces_lower_bound() {
    let api = fake(3);
    let pagination = strategy(api.clone(), "cms.urlRedirects", 2);

    let page = pagination
        .fetch_snapshot_page(&SnapshotQuery {
            created_before: base() + Duration::hours(1),
            created_after: Some(base()),
            cursor: Some(Cursor::After("2".to_string())),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(ids(&page), vec![3]);
    let call = &api.list_calls()[0];
    assert_eq!(call.after.as_deref(), Some("2"));
    assert_eq!(call.created_after, None);
}

#[tokio::test]
async fn test_timestamp_changes_include_archived() {
    let api = fake(3);
    let pagination = strategy(api.clone(), "cms.pages.site", 10);

    let page = pagination
        .fetch_changes(base() + Duration::minutes(2), None)
        .await
        .unwrap();

    assert_eq!(ids(&page), vec![2, 3]);
    let call = &api.list_calls()[0];
    assert!(call.archived);
    assert_eq!(call.sort.as_deref(), Some("updatedAt"));
    assert_eq!(call.updated_after, Some(base() + Duration::minutes(2)));
    assert_eq!(call.created_before, None);
}

// ============================================================================
// Search Pagination
// ============================================================================

#[tokio::test]
async fn test_search_snapshot_bounds_by_object_id() {
    let api = fake(8);
    let pagination = strategy(api.clone(), "crm.contacts", 2);
    // 3 to 6 are left below the cut, one page of two leaves more behind
    let cut = base() + Duration::minutes(7);

    let page = pagination
        .fetch_snapshot_page(&SnapshotQuery {
            created_before: cut,
            last_item_id: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(ids(&page), vec![3, 4]);
    assert!(matches!(page.next, Some(Cursor::After(_))));

    let request = &api.search_calls()[0];
    assert_eq!(request.limit, Some(2));
    assert_eq!(request.properties, vec!["email".to_string()]);
    let filters = &request.filter_groups[0].filters;
    assert_eq!(filters[0].property_name, "createdate");
    assert_eq!(filters[0].operator, FilterOperator::Lt);
    assert_eq!(filters[0].value, cut.timestamp_millis().to_string());
    assert_eq!(filters[1].property_name, "hs_object_id");
    assert_eq!(filters[1].operator, FilterOperator::Gte);
    assert_eq!(filters[1].value, "3");
    assert_eq!(request.sorts[0].property_name, "createdate");
    assert_eq!(request.sorts[0].direction, SortDirection::Ascending);
}

#[tokio::test]
async fn test_search_snapshot_without_last_id() {
    let api = fake(2);
    let pagination = strategy(api.clone(), "crm.deals", 10);

    let page = pagination
        .fetch_snapshot_page(&SnapshotQuery {
            created_before: base() + Duration::hours(1),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(ids(&page), vec![1, 2]);
    assert!(page.next.is_none());
    assert_eq!(api.search_calls()[0].filter_groups[0].filters.len(), 1);
}

#[tokio::test]
async fn test_search_changes_sorted_by_update() {
    let api = Arc::new(FakeApi::with_items(vec![
        FakeItem::new(1, base()).updated(base() + Duration::minutes(9)),
        FakeItem::new(2, base()).updated(base() + Duration::minutes(3)),
        FakeItem::new(3, base()),
    ]));
    let pagination = strategy(api.clone(), "crm.contacts", 10);

    let page = pagination
        .fetch_changes(base() + Duration::minutes(1), None)
        .await
        .unwrap();

    assert_eq!(ids(&page), vec![2, 1]);
    let request = &api.search_calls()[0];
    assert_eq!(
        request.filter_groups[0].filters[0].property_name,
        "lastmodifieddate"
    );
    assert_eq!(request.sorts[0].property_name, "lastmodifieddate");
}

#[tokio::test]
async fn test_search_changes_continue_from_cursor() {
    let api = fake(5);
    let pagination = strategy(api.clone(), "crm.contacts", 2);
    let updated_after = base();

    let first = pagination.fetch_changes(updated_after, None).await.unwrap();
    assert_eq!(ids(&first), vec![1, 2]);
    let cursor = first.next.unwrap();
    assert_eq!(cursor, Cursor::After("2".to_string()));

    let second = pagination
        .fetch_changes(updated_after, Some(&cursor))
        .await
        .unwrap();
    assert_eq!(ids(&second), vec![3, 4]);

    let request = &api.search_calls()[1];
    assert_eq!(request.after.as_deref(), Some("2"));
    assert_eq!(
        request.filter_groups[0].filters[0].value,
        updated_after.timestamp_millis().to_string()
    );
}

#[tokio::test]
async fn test_fetch_error_is_wrapped() {
    let api = fake(1);
    api.fail_with(Some(502));
    let pagination = strategy(api.clone(), "cms.pages.site", 10);

    let err = pagination.fetch_changes(base(), None).await.unwrap_err();
    assert!(err.to_string().starts_with("list items: "));
    assert!(matches!(err.root(), Error::HttpStatus { status: 502, .. }));
}
