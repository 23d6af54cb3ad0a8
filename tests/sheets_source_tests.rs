//! Google Sheets source against a wiremock server standing in for the
//! Sheets v4 values endpoint.

use std::sync::Arc;
use std::time::Duration;

use dashboard_remarks::records::{
    RecordStore, SheetsTableSource, SourceError, TableRecordStore, TableSource,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn sheet_server(values: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sheet-123/values/A1:ZZ"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "range": "Sheet1!A1:ZZ",
            "majorDimension": "ROWS",
            "values": values,
        })))
        .mount(&server)
        .await;
    server
}

fn source(server: &MockServer) -> SheetsTableSource {
    SheetsTableSource::new(server.uri(), "sheet-123", "A1:ZZ", "test-key", 600).unwrap()
}

#[tokio::test]
async fn fetches_header_and_pads_short_rows() {
    let server = sheet_server(json!([
        ["Company", "Country", "Industry"],
        ["Acme", "India", "Textiles"],
        ["Globex", "India"],
    ]))
    .await;

    let table = source(&server).fetch().await.unwrap();
    assert_eq!(table.columns, vec!["Company", "Country", "Industry"]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.rows[1], vec!["Globex", "India", ""]);
}

#[tokio::test]
async fn empty_sheet_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "Sheet1" })))
        .mount(&server)
        .await;

    let err = source(&server).fetch().await.unwrap_err();
    assert!(matches!(err, SourceError::EmptyTable));
}

#[tokio::test]
async fn http_errors_surface_as_source_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": 403, "message": "API key not valid" }
        })))
        .mount(&server)
        .await;

    let err = source(&server).fetch().await.unwrap_err();
    assert!(matches!(err, SourceError::Http(_)));
}

#[tokio::test]
async fn record_store_caches_sheet_between_reads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sheet-123/values/A1:ZZ"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [["Company"], ["Acme"], ["Globex"]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = TableRecordStore::new(Arc::new(source(&server)), Duration::from_secs(60));
    assert!(store.record_exists(1).await.unwrap());
    assert!(!store.record_exists(2).await.unwrap());
    assert_eq!(store.stats().await.unwrap().source, "Google Sheets");
    // MockServer verifies the single expected request on drop.
}
