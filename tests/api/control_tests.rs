//! `/api/control` tests.

use crate::common::{assert_json_contains, rejected_fields, TestHarness};
use axum::http::StatusCode;
use device_config_agent::events::ConfigEvent;
use device_config_agent::restart::RestartPhase;
use device_config_agent::state::SectionName;
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_get_control_is_flat() {
    let h = TestHarness::new();
    let res = h.get("/api/control").await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.json,
        json!({
            "status": "ok",
            "message": "Control configuration",
            "tcp_port": 5050,
            "rs232_1_baud": 9600
        })
    );
}

#[tokio::test]
async fn test_port_8080_applies_live() {
    let h = TestHarness::new();
    let mut events = h.events.subscribe();

    let res = h
        .post("/api/control", r#"{"tcpPort": 8080, "rs232_1_baud": 9600}"#)
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_json_contains(
        &res.json,
        &json!({
            "status": "ok",
            "applied": true,
            "changed": true,
            "restart_required": false,
            "control": {"tcp_port": 8080, "rs232_1_baud": 9600},
            "restart": {"phase": "idle"}
        }),
    );

    let event = events.recv().await.unwrap();
    assert_eq!(
        event,
        ConfigEvent::SectionApplied {
            section: SectionName::Comm,
            value: device_config_agent::state::SectionValue::Comm(h.service.comm()),
            rebind_tcp_port: Some(8080),
        }
    );
    assert_eq!(h.service.restart_status().phase, RestartPhase::Idle);
}

#[tokio::test]
async fn test_out_of_range_ports_rejected() {
    let h = TestHarness::new();
    for port in ["0", "70000", "-1"] {
        let res = h
            .post("/api/control", &format!(r#"{{"tcp_port": {port}}}"#))
            .await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST, "port {port}");
        assert_eq!(rejected_fields(&res.json), vec!["tcp_port".to_string()]);
    }
    assert_eq!(h.service.comm().tcp_port, 5050);
}

#[tokio::test]
async fn test_privileged_port_rejected_by_default() {
    let h = TestHarness::new();
    let res = h.post("/api/control", r#"{"tcp_port": 80}"#).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected_fields(&res.json), vec!["tcp_port".to_string()]);
}

#[tokio::test]
async fn test_unsupported_baud_rejected() {
    let h = TestHarness::new();
    let res = h.post("/api/control", r#"{"rs232Baud": 12345}"#).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected_fields(&res.json), vec!["rs232_1_baud".to_string()]);

    let res = h.post("/api/control", r#"{"rs232_1_baud": 115200}"#).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(h.service.comm().rs232_baud, 115200);
    assert_eq!(h.service.comm().tcp_port, 5050);
}

#[tokio::test]
async fn test_all_violations_reported_together() {
    let h = TestHarness::new();
    let res = h
        .post("/api/control", r#"{"tcp_port": 0, "rs232_1_baud": 1}"#)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        rejected_fields(&res.json),
        vec!["tcp_port".to_string(), "rs232_1_baud".to_string()]
    );
}
