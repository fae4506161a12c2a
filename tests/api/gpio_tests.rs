//! `/api/gpio` tests.

use crate::common::{rejected_fields, TestHarness};
use axum::http::StatusCode;
use device_config_agent::state::{CommMode, TriggerMode};
use pretty_assertions::assert_eq;
use serde_json::json;

#[tokio::test]
async fn test_get_gpio_defaults() {
    let h = TestHarness::new();
    let res = h.get("/api/gpio").await;
    assert_eq!(
        res.json,
        json!({
            "status": "ok",
            "message": "GPIO configuration",
            "device_id": 1,
            "comm_mode": "text",
            "trigger_mode": "toggle",
            "auto_response": true
        })
    );
}

#[tokio::test]
async fn test_device_id_300_rejected_and_unchanged() {
    let h = TestHarness::new();
    let res = h.post("/api/gpio", r#"{"deviceId": 300}"#).await;

    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(rejected_fields(&res.json), vec!["device_id".to_string()]);
    assert_eq!(res.json["error"]["fields"][0]["value"], "300");
    assert_eq!(h.get("/api/gpio").await.json["device_id"], 1);
}

#[tokio::test]
async fn test_gpio_update_applies_live() {
    let h = TestHarness::new();
    let res = h
        .post(
            "/api/gpio",
            r#"{"device_id": 247, "comm_mode": "binary", "trigger_mode": "trigger", "auto_response": false}"#,
        )
        .await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["restart_required"], false);
    let gpio = h.service.gpio();
    assert_eq!(gpio.device_id, 247);
    assert_eq!(gpio.comm_mode, CommMode::Binary);
    assert_eq!(gpio.trigger_mode, TriggerMode::Trigger);
    assert!(!gpio.auto_response);
}

#[tokio::test]
async fn test_unknown_modes_rejected() {
    let h = TestHarness::new();
    let res = h
        .post("/api/gpio", r#"{"comm_mode": "hex", "trigger_mode": "edge"}"#)
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        rejected_fields(&res.json),
        vec!["comm_mode".to_string(), "trigger_mode".to_string()]
    );
    assert_eq!(h.service.gpio().comm_mode, CommMode::Text);
}

#[tokio::test]
async fn test_firmware_rt_mode_alias() {
    let h = TestHarness::new();
    let res = h.post("/api/gpio", r#"{"rt_mode": "binary"}"#).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json["gpio"]["comm_mode"], "binary");
}
