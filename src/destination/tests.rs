//! Tests for destination module

use super::*;
use crate::config::ConnectorConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig};
use crate::hubspot::{HubSpotClient, ResourceRegistry};
use crate::iterator::Record;
use crate::types::JsonObject;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test_case::test_case;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn writer_for(server: &MockServer, resource: &str) -> Writer {
    let http = HttpClient::with_config(
        HttpClientConfig::builder()
            .base_url(server.uri())
            .bearer_token("pat-test")
            .max_retries(1)
            .backoff(
                crate::types::BackoffType::Constant,
                Duration::from_millis(5),
                Duration::from_millis(5),
            )
            .no_rate_limit()
            .build(),
    )
    .unwrap();

    let client = HubSpotClient::with_http(http, Arc::new(ResourceRegistry::hubspot()));
    Writer::new(Arc::new(client), resource)
}

fn object(value: serde_json::Value) -> JsonObject {
    value.as_object().cloned().unwrap()
}

fn created_at() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 10, 1, 0, 0, 0).unwrap()
}

fn contact() -> JsonObject {
    object(json!({"properties": {"email": "ada@example.com"}}))
}

// ============================================================================
// Key Extraction
// ============================================================================

#[test_case(json!({"id": "101"}), "101" ; "string")]
#[test_case(json!({"id": 101}), "101" ; "integer")]
#[test_case(json!({"id": 101.0}), "101" ; "float")]
#[test_case(json!({"hs_object_id": 7}), "7" ; "any field name")]
fn test_key_value(key: serde_json::Value, expected: &str) {
    assert_eq!(key_value(&object(key)).unwrap(), expected);
}

#[test]
fn test_key_value_errors() {
    assert!(matches!(
        key_value(&object(json!({"id": 1, "email": "a"}))),
        Err(Error::CompositeKeyNotSupported)
    ));
    assert!(matches!(key_value(&JsonObject::new()), Err(Error::EmptyKey)));
    assert!(matches!(
        key_value(&object(json!({"id": ""}))),
        Err(Error::EmptyKey)
    ));
    assert!(matches!(
        key_value(&object(json!({"id": true}))),
        Err(Error::EmptyKey)
    ));
}

// ============================================================================
// Writer
// ============================================================================

#[tokio::test]
async fn test_snapshot_and_create_records_create_items() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/contacts"))
        .and(body_json(json!({"properties": {"email": "ada@example.com"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "1"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let writer = writer_for(&mock_server, "crm.contacts");
    let position = Bytes::from_static(b"{}");

    writer
        .write(&Record::snapshot(position.clone(), 1, contact(), created_at()))
        .await
        .unwrap();
    writer
        .write(&Record::create(position, 1, contact(), created_at()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_update_record_patches_item() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/crm/v3/objects/contacts/55"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "55"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let writer = writer_for(&mock_server, "crm.contacts");
    writer
        .write(&Record::update(Bytes::new(), 55, contact(), created_at()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_record_removes_item() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/crm/v3/objects/contacts/55"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let writer = writer_for(&mock_server, "crm.contacts");
    writer
        .write(&Record::delete(Bytes::new(), 55, created_at()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_create_without_payload() {
    let mock_server = MockServer::start().await;
    let writer = writer_for(&mock_server, "crm.contacts");

    let mut record = Record::create(Bytes::new(), 1, JsonObject::new(), created_at());
    let err = writer.write(&record).await.unwrap_err();
    assert!(matches!(err.root(), Error::EmptyPayload));

    record.payload = None;
    let err = writer.write(&record).await.unwrap_err();
    assert!(matches!(err.root(), Error::EmptyPayload));
}

#[tokio::test]
async fn test_write_failure_names_operation() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/crm/v3/objects/deals"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad property"))
        .mount(&mock_server)
        .await;

    let writer = writer_for(&mock_server, "crm.deals");
    let err = writer
        .write(&Record::create(Bytes::new(), 1, contact(), created_at()))
        .await
        .unwrap_err();

    assert!(err
        .to_string()
        .starts_with("route record: create \"crm.deals\" item: execute request: "));
    assert!(matches!(err.root(), Error::HttpStatus { status: 400, .. }));
}

// ============================================================================
// Destination
// ============================================================================

/// Records the ids it is given and fails on one of them
struct FlakyWriter {
    fail_on: i64,
    seen: Mutex<Vec<i64>>,
}

#[async_trait]
impl RecordWriter for FlakyWriter {
    async fn write(&self, record: &Record) -> Result<()> {
        let id = record.key["id"].as_i64().unwrap_or_default();
        if id == self.fail_on {
            return Err(Error::EmptyPayload);
        }
        self.seen.lock().unwrap().push(id);
        Ok(())
    }
}

fn records(ids: &[i64]) -> Vec<Record> {
    ids.iter()
        .map(|id| Record::create(Bytes::new(), *id, contact(), created_at()))
        .collect()
}

#[tokio::test]
async fn test_destination_writes_in_order() {
    let writer = Arc::new(FlakyWriter {
        fail_on: -1,
        seen: Mutex::new(Vec::new()),
    });
    let destination = Destination::new(writer.clone());

    let (written, result) = destination.write(&records(&[1, 2, 3])).await;
    assert_eq!(written, 3);
    assert!(result.is_ok());
    assert_eq!(*writer.seen.lock().unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_destination_stops_at_first_failure() {
    let writer = Arc::new(FlakyWriter {
        fail_on: 3,
        seen: Mutex::new(Vec::new()),
    });
    let destination = Destination::new(writer.clone());

    let (written, result) = destination.write(&records(&[1, 2, 3, 4])).await;
    assert_eq!(written, 2);
    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "write record: payload is empty");
    assert_eq!(*writer.seen.lock().unwrap(), vec![1, 2]);
}

#[test]
fn test_destination_open_validates_config() {
    let registry = Arc::new(ResourceRegistry::hubspot());
    assert!(Destination::open(&ConnectorConfig::new("pat", "crm.contacts"), registry.clone()).is_ok());

    let err = Destination::open(&ConnectorConfig::new("", "crm.contacts"), registry)
        .err()
        .unwrap();
    assert!(matches!(err.root(), Error::MissingConfigField { .. }));
}
