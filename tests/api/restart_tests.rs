//! Restart coordination over HTTP: scheduling, idempotence, draining, failure.

use crate::common::{fast_restart_settings, TestHarness};
use axum::http::StatusCode;
use device_config_agent::restart::{RestartPhase, RestartReason};
use device_config_agent::store::MemoryBackend;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_manual_restart_runs_once() {
    let h = TestHarness::new();

    let first = h.get("/api/restart").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json["message"], "Restart scheduled");
    assert_eq!(first.json["restart"]["phase"], "schedule_requested");
    assert_eq!(first.json["restart"]["reason"], "manual");

    let second = h.get("/api/restart").await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.json["message"], "Restart already in progress");
    assert_eq!(
        second.json["restart"]["request_id"],
        first.json["restart"]["request_id"]
    );

    h.wait_for_phase(RestartPhase::Restarting).await;
    h.wait_for_restart_calls(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.platform.calls(), 1);
    // Storage was flushed before the primitive ran.
    assert_eq!(h.backend.flush_count(), 1);
}

#[tokio::test]
async fn test_network_change_then_manual_restart_is_one_sequence() {
    let h = TestHarness::new();
    let res = h.post("/api/network", r#"{"dhcp_enabled": false}"#).await;
    assert_eq!(res.json["restart_required"], true);

    let res = h.get("/api/restart").await;
    assert_eq!(res.json["message"], "Restart already in progress");
    assert_eq!(res.json["restart"]["reason"], "network-config-changed");

    h.wait_for_phase(RestartPhase::Restarting).await;
    h.wait_for_restart_calls(1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.platform.calls(), 1);
}

#[tokio::test]
async fn test_mutations_get_503_while_draining() {
    let h = TestHarness::new();
    h.get("/api/restart").await;

    // Before the drain deadline mutations are still accepted.
    let res = h.post("/api/gpio", r#"{"device_id": 5}"#).await;
    assert_eq!(res.status, StatusCode::OK);

    h.wait_for_restart(|s| s.phase != RestartPhase::ScheduleRequested)
        .await;

    let res = h.post("/api/gpio", r#"{"device_id": 6}"#).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.retry_after.as_deref(), Some("7"));
    assert_eq!(res.json["error"]["type"], "RestartPending");

    let res = h.post("/api/factory-reset", "{}").await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);

    // Reads still work and show the last committed value.
    let res = h.get("/api/gpio").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["device_id"], 5);
}

#[tokio::test]
async fn test_restart_failure_keeps_config_and_is_reported() {
    let h = TestHarness::with_backend(MemoryBackend::new(), fast_restart_settings());
    h.platform.set_failure(Some("reboot: Operation not permitted".into()));

    let res = h
        .post(
            "/api/network",
            r#"{"dhcp_enabled": false, "ip": "10.0.0.5", "gateway": "10.0.0.1"}"#,
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let status = h.wait_for_restart(|s| s.last_error.is_some()).await;
    assert_eq!(status.phase, RestartPhase::Idle);

    let res = h.get("/api/restart/status").await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json["error"]["type"], "RestartFailed");
    let message = res.json["message"].as_str().unwrap();
    assert!(message.contains("Operation not permitted"));
    assert!(message.contains("restart the device manually"));

    // The committed change survived the failed restart.
    let network = h.service.network();
    assert!(!network.dhcp_enabled);
    assert_eq!(network.ip, "10.0.0.5");
    assert_eq!(
        h.backend.stored().unwrap().config.network.ip,
        "10.0.0.5"
    );

    // Mutations are accepted again and a new attempt can be made.
    let res = h.post("/api/gpio", r#"{"device_id": 9}"#).await;
    assert_eq!(res.status, StatusCode::OK);
    h.platform.set_failure(None);
    let res = h.get("/api/restart").await;
    assert_eq!(res.json["message"], "Restart scheduled");
    assert_eq!(h.service.restart_status().reason, Some(RestartReason::Manual));
}

#[tokio::test]
async fn test_restart_status_when_idle() {
    let h = TestHarness::new();
    let res = h.get("/api/restart/status").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["restart"], serde_json::json!({"phase": "idle"}));
}

#[tokio::test]
async fn test_device_still_up_after_restart_command_is_reported() {
    let settings = device_config_agent::restart::RestartSettings {
        restart_timeout: Duration::from_millis(200),
        ..fast_restart_settings()
    };
    let h = TestHarness::with_backend(MemoryBackend::new(), settings);

    h.get("/api/restart").await;
    h.wait_for_phase(RestartPhase::Restarting).await;
    let res = h.post("/api/gpio", r#"{"device_id": 3}"#).await;
    assert_eq!(res.status, StatusCode::SERVICE_UNAVAILABLE);

    let status = h.wait_for_restart(|s| s.last_error.is_some()).await;
    assert_eq!(status.phase, RestartPhase::Idle);
    assert_eq!(h.platform.calls(), 1);

    let res = h.get("/api/restart/status").await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.json["message"]
        .as_str()
        .unwrap()
        .contains("still running"));

    // The device is manageable again.
    let res = h.post("/api/gpio", r#"{"device_id": 3}"#).await;
    assert_eq!(res.status, StatusCode::OK);
}
