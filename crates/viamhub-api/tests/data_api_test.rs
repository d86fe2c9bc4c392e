#![allow(clippy::unwrap_used)]
// Integration tests for `DataApiClient` using wiremock.

use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use viamhub_api::{
    Credentials, DataApiClient, DataApiSettings, Error, ReadingValue, TransportConfig,
};

const FILTER_PATH: &str = "/api/v1/data/tabular/filter";

// ── Helpers ─────────────────────────────────────────────────────────

fn client_for(server: &MockServer) -> DataApiClient {
    DataApiClient::new(DataApiSettings {
        base_url: Url::parse(&server.uri()).unwrap(),
        credentials: Credentials::new("org-key-id", "org-key"),
        robot_id: "garage-main".into(),
        transport: TransportConfig::default(),
    })
}

async fn mount_connection_test(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(FILTER_PATH))
        .and(body_partial_json(json!({"filter": {"component_name": "test"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(server)
        .await;
}

// ── Connection ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_connection_sends_key_headers_and_is_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FILTER_PATH))
        .and(header("key_id", "org-key-id"))
        .and(header("key", "org-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);

    assert!(client.ensure_connection().await);
    assert!(client.ensure_connection().await);
}

#[tokio::test]
async fn test_connection_failure_reports_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FILTER_PATH))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = client_for(&server);

    assert!(!client.ensure_connection().await);
    let err = client.latest_readings("temp", 24).await.unwrap_err();
    assert!(matches!(err, Error::SessionClosed));
}

// ── Queries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_latest_readings_returns_newest_record() {
    let server = MockServer::start().await;
    mount_connection_test(&server).await;
    Mock::given(method("POST"))
        .and(path(FILTER_PATH))
        .and(body_partial_json(json!({
            "filter": {"component_name": "temp", "robot_id": "garage-main"},
            "limit": 1
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "time_received": "2026-03-01T12:00:00Z",
                "readings": [
                    {"reading_name": "celsius", "value": 19.0},
                    {"reading_name": "status", "value": "ok"}
                ]
            }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let readings = client.latest_readings("temp", 24).await.unwrap().unwrap();

    assert_eq!(readings["celsius"], ReadingValue::Number(19.0));
    assert_eq!(readings["status"], ReadingValue::Text("ok".into()));
}

#[tokio::test]
async fn test_latest_readings_empty_window_is_none() {
    let server = MockServer::start().await;
    mount_connection_test(&server).await;
    Mock::given(method("POST"))
        .and(path(FILTER_PATH))
        .and(body_partial_json(json!({"filter": {"component_name": "humidity"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let client = client_for(&server);

    assert!(client.latest_readings("humidity", 24).await.unwrap().is_none());
}

#[tokio::test]
async fn test_readings_in_range_respects_limit() {
    let server = MockServer::start().await;
    mount_connection_test(&server).await;
    Mock::given(method("POST"))
        .and(path(FILTER_PATH))
        .and(body_partial_json(json!({"filter": {"component_name": "temp"}, "limit": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"readings": [{"reading_name": "celsius", "value": 18.0}]},
                {"readings": [{"reading_name": "celsius", "value": 18.5}]}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let end = chrono::Utc::now();
    let start = end - chrono::Duration::hours(6);
    let series = client.readings_in_range("temp", start, end, 100).await.unwrap();

    assert_eq!(series.len(), 2);
    assert_eq!(series[1]["celsius"].as_f64(), Some(18.5));
}

#[tokio::test]
async fn test_shutdown_forces_reconnect() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(FILTER_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server);

    assert!(client.ensure_connection().await);
    client.shutdown().await;
    assert!(client.ensure_connection().await);
}
