//! End-to-end tests for the `db_query` tool façade against a mock store.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;
use techtrend_support_core::Email;
use techtrend_support_server::query::{Datastore, RawRow, ResolvedQuery, StoreError};
use techtrend_support_server::tools::{DbQueryInput, ErrorKind, ToolResponse, run_db_query};

/// How the mock store should fail, if at all.
#[derive(Debug, Clone, Copy)]
enum FailMode {
    None,
    Timeout,
    Connection,
    SchemaMissing,
}

/// In-memory store double that records how often it was queried.
struct MockStore {
    rows: Vec<RawRow>,
    fail: FailMode,
    calls: AtomicUsize,
}

impl MockStore {
    fn with_rows(rows: Vec<RawRow>) -> Self {
        Self {
            rows,
            fail: FailMode::None,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing(fail: FailMode) -> Self {
        Self {
            rows: Vec::new(),
            fail,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Datastore for MockStore {
    async fn fetch(&self, _query: &ResolvedQuery) -> Result<Vec<RawRow>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fail {
            FailMode::None => Ok(self.rows.clone()),
            FailMode::Timeout => Err(StoreError::Timeout(std::time::Duration::from_secs(3))),
            FailMode::Connection => Err(StoreError::Connection(sqlx::Error::PoolClosed)),
            FailMode::SchemaMissing => Err(StoreError::SchemaMissing("order".to_owned())),
        }
    }
}

fn alice() -> Email {
    Email::parse("alice@example.com").unwrap()
}

fn alice_order_row() -> RawRow {
    json!({
        "id": 101,
        "order_date": "2024-03-07T10:30:00.000Z",
        "total": 29.99,
        "status": "shipped",
        "customer_name": "Alice Carter",
        "customer_email": "alice@example.com",
        "product_name": "Wireless Mouse",
        "product_price": 29.99,
    })
}

fn input(value: serde_json::Value) -> DbQueryInput {
    serde_json::from_value(value).unwrap()
}

fn expect_error(response: &ToolResponse) -> (&ErrorKind, &str) {
    match response {
        ToolResponse::Error(payload) => {
            assert!(payload.error);
            (&payload.kind, payload.formatted.as_str())
        }
        ToolResponse::Result(_) => panic!("expected an error payload"),
    }
}

#[tokio::test]
async fn order_lookup_returns_own_order() {
    let store = MockStore::with_rows(vec![alice_order_row()]);
    let identity = alice();
    let input = input(json!({"type": "order", "identifiers": []}));

    let response = run_db_query(&store, Some(&identity), &input).await;

    let result = response.as_result().expect("expected a result");
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.summary, "Found 1 order(s)");
    assert!(result.formatted.contains("Order #"));
    assert!(result.error.is_none());
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn crafted_foreign_email_is_denied_before_the_store() {
    let store = MockStore::with_rows(vec![alice_order_row()]);
    let identity = alice();
    let input = input(json!({
        "type": "order",
        "identifiers": [{"email": "bob@example.com"}]
    }));

    let response = run_db_query(&store, Some(&identity), &input).await;

    let (kind, formatted) = expect_error(&response);
    assert_eq!(*kind, ErrorKind::AccessDenied);
    assert!(formatted.contains("your own email"));
    assert_eq!(store.calls(), 0, "denied query must never reach the store");
}

#[tokio::test]
async fn missing_identity_fails_closed_without_store_contact() {
    let store = MockStore::with_rows(vec![alice_order_row()]);
    let input = input(json!({"type": "order", "identifiers": []}));

    let response = run_db_query(&store, None, &input).await;

    let (kind, formatted) = expect_error(&response);
    assert_eq!(*kind, ErrorKind::AuthenticationRequired);
    assert!(formatted.contains("email"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn store_timeout_is_reported_without_synthetic_rows() {
    let store = MockStore::failing(FailMode::Timeout);
    let identity = alice();
    let input = input(json!({"type": "order", "identifiers": []}));

    let response = run_db_query(&store, Some(&identity), &input).await;

    let (kind, formatted) = expect_error(&response);
    assert_eq!(*kind, ErrorKind::Timeout);
    assert!(formatted.contains("try again"));
    // Failures carry an empty data array, never synthetic rows.
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["data"], json!([]));
    assert_eq!(value["error"], json!(true));
}

#[tokio::test]
async fn connection_failure_is_distinguished_from_timeout() {
    let store = MockStore::failing(FailMode::Connection);
    let identity = alice();
    let input = input(json!({"type": "ticket", "identifiers": []}));

    let response = run_db_query(&store, Some(&identity), &input).await;
    let (kind, _) = expect_error(&response);
    assert_eq!(*kind, ErrorKind::ConnectionError);
}

#[tokio::test]
async fn missing_table_is_a_schema_error() {
    let store = MockStore::failing(FailMode::SchemaMissing);
    let identity = alice();
    let input = input(json!({"type": "order", "identifiers": []}));

    let response = run_db_query(&store, Some(&identity), &input).await;
    let (kind, _) = expect_error(&response);
    assert_eq!(*kind, ErrorKind::SchemaError);
}

#[tokio::test]
async fn nonexistent_product_yields_empty_data_not_an_error() {
    let store = MockStore::with_rows(Vec::new());
    let input = input(json!({
        "type": "product",
        "identifiers": [{"productId": "999"}]
    }));

    // No identity needed: products are public catalog data.
    let response = run_db_query(&store, None, &input).await;

    let result = response.as_result().expect("expected a result");
    assert!(result.data.is_empty());
    assert_eq!(result.summary, "No products found");
    assert!(result.error.is_none());
    assert!(!result.formatted.is_empty());
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn unknown_entity_type_is_a_validation_error() {
    let store = MockStore::with_rows(Vec::new());
    let identity = alice();
    let input = input(json!({"type": "invoice", "identifiers": []}));

    let response = run_db_query(&store, Some(&identity), &input).await;
    let (kind, _) = expect_error(&response);
    assert_eq!(*kind, ErrorKind::ValidationError);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn non_numeric_order_id_is_a_validation_error() {
    let store = MockStore::with_rows(Vec::new());
    let identity = alice();
    let input = input(json!({
        "type": "order",
        "identifiers": [{"orderId": "not-a-number"}]
    }));

    let response = run_db_query(&store, Some(&identity), &input).await;
    let (kind, _) = expect_error(&response);
    assert_eq!(*kind, ErrorKind::ValidationError);
    assert_eq!(store.calls(), 0);
}
