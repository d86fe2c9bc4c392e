#![allow(clippy::unwrap_used)]
// Timed cover actuation over the in-memory transport.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;
use viamhub_core::{CapabilityKind, ConnectionManager, CoreError, Cover, CoverConfig, CoverState};

use common::{Behaves, MockTransport, device_config};

fn setup(config: CoverConfig) -> (MockTransport, Arc<Cover>) {
    let transport = MockTransport::new();
    transport.state.add("door", Behaves::Motor);
    transport.state.add("temp", Behaves::Sensor);
    let manager = ConnectionManager::new(device_config(), Arc::new(transport.clone())).unwrap();
    (transport, Arc::new(Cover::new(manager, config)))
}

#[tokio::test(start_paused = true)]
async fn test_default_state_is_open() {
    let (_transport, cover) = setup(CoverConfig::new("door"));
    assert_eq!(cover.state().await, CoverState::default());
    assert_eq!(cover.state().await.position, 100);
}

#[tokio::test(start_paused = true)]
async fn test_close_then_open_drives_motor_for_configured_time() {
    let mut config = CoverConfig::new("door");
    config.close_time = Duration::from_secs(12);
    let (transport, cover) = setup(config);

    let started = tokio::time::Instant::now();
    cover.close().await.unwrap();
    assert!(started.elapsed() >= Duration::from_secs(12));

    let state = cover.state().await;
    assert!(state.is_closed);
    assert_eq!(state.position, 0);
    assert!(!state.is_moving());

    cover.open().await.unwrap();
    let state = cover.state().await;
    assert!(!state.is_closed);
    assert_eq!(state.position, 100);

    assert_eq!(
        transport.state.motor_log(),
        vec![
            "door:set_power:-1".to_owned(),
            "door:stop".to_owned(),
            "door:set_power:1".to_owned(),
            "door:stop".to_owned(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_flip_direction_inverts_power() {
    let mut config = CoverConfig::new("door");
    config.flip_direction = true;
    let (transport, cover) = setup(config);

    cover.open().await.unwrap();

    assert_eq!(transport.state.motor_log()[0], "door:set_power:-1");
}

#[tokio::test(start_paused = true)]
async fn test_second_move_is_rejected_while_moving() {
    let (_transport, cover) = setup(CoverConfig::new("door"));

    let mover = Arc::clone(&cover);
    let opening = tokio::spawn(async move { mover.open().await });
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(cover.state().await.is_opening);
    let err = cover.close().await.unwrap_err();
    assert!(matches!(err, CoreError::CoverBusy { .. }));

    opening.await.unwrap().unwrap();
    assert!(!cover.state().await.is_moving());
}

#[tokio::test(start_paused = true)]
async fn test_stop_interrupts_a_move() {
    let (transport, cover) = setup(CoverConfig::new("door"));

    let mover = Arc::clone(&cover);
    let closing = tokio::spawn(async move { mover.close().await });
    tokio::time::sleep(Duration::from_secs(3)).await;

    let started = tokio::time::Instant::now();
    cover.stop().await.unwrap();
    closing.await.unwrap().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));

    let state = cover.state().await;
    assert!(!state.is_moving());
    assert!(!state.is_closed);
    assert_eq!(state.position, 50);
    assert!(transport.state.motor_log().contains(&"door:stop".to_owned()));

    // Not busy any more.
    cover.open().await.unwrap();
    assert_eq!(cover.state().await.position, 100);
}

#[tokio::test(start_paused = true)]
async fn test_new_move_waits_for_interrupted_run_to_stop_motor() {
    let (transport, cover) = setup(CoverConfig::new("door"));

    let mover = Arc::clone(&cover);
    let closing = tokio::spawn(async move { mover.close().await });
    tokio::time::sleep(Duration::from_secs(3)).await;

    *transport.state.stop_delay.lock().unwrap() = Duration::from_secs(2);
    let stopper = Arc::clone(&cover);
    let stopping = tokio::spawn(async move { stopper.stop().await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    // The interrupted close is still stopping its motor.
    assert!(!cover.state().await.is_moving());
    let err = cover.open().await.unwrap_err();
    assert!(matches!(err, CoreError::CoverBusy { .. }));

    stopping.await.unwrap().unwrap();
    closing.await.unwrap().unwrap();
    *transport.state.stop_delay.lock().unwrap() = Duration::ZERO;

    cover.open().await.unwrap();
    let log = transport.state.motor_log();
    assert_eq!(log.last().map(String::as_str), Some("door:stop"));
    assert_eq!(log[log.len() - 2], "door:set_power:1");
    assert_eq!(cover.state().await.position, 100);
}

#[tokio::test(start_paused = true)]
async fn test_missing_motor_is_reported() {
    let (_transport, cover) = setup(CoverConfig::new("temp"));

    let err = cover.open().await.unwrap_err();

    assert!(matches!(
        err,
        CoreError::CapabilityNotFound {
            kind: CapabilityKind::Motor,
            ..
        }
    ));
    assert_eq!(cover.state().await, CoverState::default());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_device_is_reported() {
    let (transport, cover) = setup(CoverConfig::new("door"));
    transport.state.fail_connect.store(true, Ordering::SeqCst);

    let err = cover.close().await.unwrap_err();

    assert!(matches!(err, CoreError::NotConnected));
    assert!(!cover.state().await.is_moving());
    assert!(transport.state.motor_log().is_empty());
}
