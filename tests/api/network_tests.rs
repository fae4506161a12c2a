//! `/api/network` tests.

use crate::common::{assert_json_contains, rejected_fields, TestHarness};
use axum::http::StatusCode;
use device_config_agent::restart::{RestartPhase, RestartReason};
use device_config_agent::state::DEFAULT_MAC;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_get_network_returns_factory_defaults() {
    let h = TestHarness::new();
    let res = h.get("/api/network").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.json,
        json!({
            "status": "ok",
            "message": "Network configuration",
            "network": {
                "mac": DEFAULT_MAC,
                "dhcp_enabled": true,
                "ip": "192.168.1.100",
                "subnet": "255.255.255.0",
                "gateway": "192.168.1.1",
                "dns": "8.8.8.8"
            }
        })
    );
}

#[tokio::test]
async fn test_static_addressing_requires_restart_and_keeps_mac() {
    let h = TestHarness::new();
    let res = h
        .post(
            "/api/network",
            r#"{"dhcpEnabled": false, "ip": "10.0.0.5", "subnet": "255.255.255.0", "gateway": "10.0.0.1", "dns": "8.8.8.8"}"#,
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_json_contains(
        &res.json,
        &json!({
            "status": "ok",
            "applied": true,
            "restart_required": true,
            "restart": {"phase": "schedule_requested", "reason": "network-config-changed"}
        }),
    );
    assert!(res.json["message"].as_str().unwrap().contains("restart"));

    let res = h.get("/api/network").await;
    assert_eq!(
        res.json["network"],
        json!({
            "mac": DEFAULT_MAC,
            "dhcp_enabled": false,
            "ip": "10.0.0.5",
            "subnet": "255.255.255.0",
            "gateway": "10.0.0.1",
            "dns": "8.8.8.8"
        })
    );
}

#[tokio::test]
async fn test_partial_update_keeps_other_fields() {
    let h = TestHarness::new();
    let res = h.post("/api/network", r#"{"dns": "1.1.1.1"}"#).await;

    assert_eq!(res.status, StatusCode::OK);
    // DHCP is still on, so the static fields are advisory.
    assert_eq!(res.json["restart_required"], false);

    let network = h.service.network();
    assert_eq!(network.dns, "1.1.1.1");
    assert_eq!(network.ip, "192.168.1.100");
    assert!(network.dhcp_enabled);
}

#[tokio::test]
async fn test_client_mac_is_ignored() {
    let h = TestHarness::new();
    let res = h
        .post("/api/network", r#"{"mac": "DE:AD:BE:EF:00:01", "dns": "9.9.9.9"}"#)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["network"]["mac"], DEFAULT_MAC);
    assert_eq!(h.service.network().mac, DEFAULT_MAC);
}

#[tokio::test]
async fn test_malformed_addresses_rejected_without_change() {
    let h = TestHarness::new();
    let before = h.get("/api/network").await.json;

    let res = h
        .post(
            "/api/network",
            r#"{"dhcp_enabled": false, "ip": "10.0.0", "gateway": "10.0.1.1"}"#,
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json["status"], "error");
    assert_eq!(res.json["error"]["type"], "ValidationError");
    assert!(rejected_fields(&res.json).contains(&"ip".to_string()));

    assert_eq!(h.get("/api/network").await.json, before);
    assert_eq!(h.service.restart_status().phase, RestartPhase::Idle);
}

#[tokio::test]
async fn test_gateway_outside_subnet_rejected() {
    let h = TestHarness::new();
    let res = h
        .post(
            "/api/network",
            r#"{"dhcp_enabled": false, "ip": "10.0.0.5", "subnet": "255.255.255.0", "gateway": "10.0.1.1"}"#,
        )
        .await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected_fields(&res.json), vec!["gateway".to_string()]);
    assert!(h.service.network().dhcp_enabled);
}

#[tokio::test]
async fn test_unusable_host_addresses_are_rejected() {
    let h = TestHarness::new();

    let res = h
        .post(
            "/api/network",
            r#"{"dhcp_enabled": false, "ip": "10.0.0.255", "subnet": "255.255.255.0", "gateway": "10.0.0.1"}"#,
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected_fields(&res.json), vec!["ip".to_string()]);

    let res = h
        .post(
            "/api/network",
            r#"{"dhcp_enabled": false, "ip": "10.0.0.1", "subnet": "255.255.255.0", "gateway": "10.0.0.1"}"#,
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected_fields(&res.json), vec!["gateway".to_string()]);

    assert!(h.service.network().dhcp_enabled);
    assert_eq!(h.service.restart_status().phase, RestartPhase::Idle);
}

#[tokio::test]
async fn test_resubmitting_same_payload_does_not_restart_again() {
    let h = TestHarness::new();
    let body = r#"{"dhcp_enabled": false, "ip": "10.0.0.5", "subnet": "255.255.255.0", "gateway": "10.0.0.1"}"#;

    let first = h.post("/api/network", body).await;
    assert_eq!(first.json["restart_required"], true);
    let request_id = first.json["restart"]["request_id"].clone();

    let second = h.post("/api/network", body).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.json["changed"], false);
    assert_eq!(second.json["restart_required"], false);
    assert_eq!(second.json["restart"]["request_id"], request_id);

    h.wait_for_phase(RestartPhase::Restarting).await;
    h.wait_for_restart_calls(1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.platform.calls(), 1);
    assert_eq!(
        h.service.restart_status().reason,
        Some(RestartReason::NetworkConfigChanged)
    );
}

#[tokio::test]
async fn test_malformed_json_is_client_error() {
    let h = TestHarness::new();
    let res = h.post("/api/network", r#"{"ip": "10.0.0.5""#).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json["error"]["type"], "InvalidPayload");

    let res = h.post("/api/network", r#"{"dhcp_enabled": "no"}"#).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.json["error"]["type"], "InvalidPayload");

    let res = h.post("/api/network", "").await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_storage_failure_is_server_error() {
    let h = TestHarness::new();
    h.backend.fail_next_persists(1);

    let res = h.post("/api/network", r#"{"dhcp_enabled": false}"#).await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.json["error"]["type"], "StorageError");
    assert!(h.service.network().dhcp_enabled);
    assert_eq!(h.service.restart_status().phase, RestartPhase::Idle);

    // Retrying succeeds once storage recovers.
    let res = h.post("/api/network", r#"{"dhcp_enabled": false}"#).await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(!h.service.network().dhcp_enabled);
}
