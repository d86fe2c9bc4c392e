#![allow(clippy::unwrap_used)]
// Integration tests for `HttpTransport` / `HttpSession` using wiremock.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use viamhub_api::{
    Credentials, DeviceSession, DeviceTransport, Error, HttpTransport, ReadingValue, ResourceName,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn mount_auth(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth"))
        .and(body_json(json!({"api_key_id": "key-id", "api_key": "s3cret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(server)
        .await;
}

async fn setup() -> (MockServer, Arc<dyn DeviceSession>) {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let session = HttpTransport::default()
        .connect(&server.uri(), &Credentials::new("key-id", "s3cret"))
        .await
        .unwrap();
    (server, session)
}

// ── Session tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_rejected_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = HttpTransport::default()
        .connect(&server.uri(), &Credentials::new("key-id", "wrong"))
        .await;

    assert!(matches!(result, Err(Error::Authentication { .. })));
}

#[tokio::test]
async fn test_probe_sends_bearer_token() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/version"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "0.50.0"})))
        .expect(1)
        .mount(&server)
        .await;

    session.probe().await.unwrap();
}

#[tokio::test]
async fn test_list_resources() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resources": [
                {"namespace": "rdk", "type": "component", "subtype": "motor", "name": "door"},
                {"namespace": "rdk", "type": "component", "subtype": "sensor", "name": "temp"},
            ]
        })))
        .mount(&server)
        .await;

    let resources = session.list_resources().await.unwrap();

    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0], ResourceName::component("motor", "door"));
    assert_eq!(resources[1].name, "temp");
}

#[tokio::test]
async fn test_close_is_idempotent_and_blocks_further_calls() {
    let (server, session) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    session.close().await.unwrap();
    session.close().await.unwrap();

    let err = session.probe().await.unwrap_err();
    assert!(matches!(err, Error::SessionClosed));
}

// ── Component tests ─────────────────────────────────────────────────

#[tokio::test]
async fn test_motor_calls() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/components/door/motor/properties"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"position_reporting": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/components/door/motor/set_power"))
        .and(body_json(json!({"power_pct": -1.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/components/door/motor/go_for"))
        .and(body_json(json!({"rpm": 30.0, "revolutions": 2.5})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/components/door/motor/stop"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let motor = session.as_motor(&ResourceName::component("motor", "door"));

    assert_eq!(motor.name(), "door");
    assert!(motor.get_properties().await.unwrap().position_reporting);
    motor.set_power(-1.0).await.unwrap();
    motor.go_for(30.0, 2.5).await.unwrap();
    motor.stop().await.unwrap();
}

#[tokio::test]
async fn test_sensor_readings() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/components/temp/sensor/readings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "readings": {"celsius": 21.5, "unit": "C"}
        })))
        .mount(&server)
        .await;

    let sensor = session.as_sensor(&ResourceName::component("sensor", "temp"));
    let readings = sensor.get_readings().await.unwrap();

    assert_eq!(readings["celsius"], ReadingValue::Number(21.5));
    assert_eq!(readings["unit"], ReadingValue::Text("C".into()));
}

#[tokio::test]
async fn test_component_names_are_percent_encoded() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/components/back%20door/sensor/readings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"readings": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let sensor = session.as_sensor(&ResourceName::component("sensor", "back door"));
    assert!(sensor.get_readings().await.unwrap().is_empty());
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_wrong_capability_maps_to_not_found() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/components/temp/motor/properties"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let motor = session.as_motor(&ResourceName::component("sensor", "temp"));
    let err = motor.get_properties().await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/version"))
        .respond_with(ResponseTemplate::new(503).set_body_string("gateway restarting"))
        .mount(&server)
        .await;

    let err = session.probe().await.unwrap_err();

    match &err {
        Error::Api { status, message } => {
            assert_eq!(*status, 503);
            assert_eq!(message, "gateway restarting");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_keeps_raw_text() {
    let (server, session) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/resources"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = session.list_resources().await.unwrap_err();
    match err {
        Error::Deserialization { body, .. } => assert_eq!(body, "not json"),
        other => panic!("unexpected error: {other:?}"),
    }
}
