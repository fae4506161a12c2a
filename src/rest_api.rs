#![allow(clippy::missing_errors_doc)]
//! REST API surface for reading and updating the device configuration.
//!
//! The routes mirror the ones the device web UI already talks to
//! (`/api/network`, `/api/control`, `/api/gpio`, `/api/restart`) plus a few
//! operational extras. Every response is JSON with a `status` of `ok` or
//! `error`; POST bodies are partial sections with PATCH semantics.

use axum::{
    body::Bytes,
    extract::{Path, State as AxumState},
    http::{Method, Uri},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    service::{ConfigService, UpdateOutcome},
    state::SectionName,
};

#[derive(Clone)]
pub struct RestContext {
    pub service: ConfigService,
}

// ---------- Router Builder ----------
pub fn build_router(ctx: RestContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/network", get(get_network).post(post_network))
        .route("/api/control", get(get_control).post(post_control))
        .route("/api/gpio", get(get_gpio).post(post_gpio))
        .route("/api/restart", get(restart))
        .route("/api/restart/status", get(restart_status))
        .route("/api/all", get(get_all))
        .route("/api/factory-reset", post(factory_reset))
        .route("/api/config/{section}", get(get_section).post(post_section))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(ctx)
}

// ---------- Handlers ----------
async fn health() -> Json<Value> {
    Json(json!({
        "status":"ok",
        "message":"Device config agent is running",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn get_network(AxumState(ctx): AxumState<RestContext>) -> Json<Value> {
    Json(json!({
        "status":"ok",
        "message":"Network configuration",
        "network": ctx.service.network()
    }))
}

async fn post_network(AxumState(ctx): AxumState<RestContext>, body: Bytes) -> AppResult<Json<Value>> {
    let outcome = ctx
        .service
        .update_section(SectionName::Network.as_str(), parse_body(&body)?)
        .await?;
    Ok(Json(update_json(&outcome)))
}

async fn get_control(AxumState(ctx): AxumState<RestContext>) -> Json<Value> {
    Json(ok_with(&ctx.service.comm(), "Control configuration"))
}

async fn post_control(AxumState(ctx): AxumState<RestContext>, body: Bytes) -> AppResult<Json<Value>> {
    let outcome = ctx
        .service
        .update_section(SectionName::Comm.as_str(), parse_body(&body)?)
        .await?;
    Ok(Json(update_json(&outcome)))
}

async fn get_gpio(AxumState(ctx): AxumState<RestContext>) -> Json<Value> {
    Json(ok_with(&ctx.service.gpio(), "GPIO configuration"))
}

async fn post_gpio(AxumState(ctx): AxumState<RestContext>, body: Bytes) -> AppResult<Json<Value>> {
    let outcome = ctx
        .service
        .update_section(SectionName::Gpio.as_str(), parse_body(&body)?)
        .await?;
    Ok(Json(update_json(&outcome)))
}

async fn restart(AxumState(ctx): AxumState<RestContext>) -> Json<Value> {
    let outcome = ctx.service.request_restart();
    let message = if outcome.newly_scheduled {
        "Restart scheduled"
    } else {
        "Restart already in progress"
    };
    Json(json!({
        "status":"ok",
        "message": message,
        "restart": outcome.status
    }))
}

async fn restart_status(AxumState(ctx): AxumState<RestContext>) -> AppResult<Json<Value>> {
    let status = ctx.service.restart_report()?;
    let message = if status.phase.is_pending() {
        "Restart in progress"
    } else {
        "No restart pending"
    };
    Ok(Json(json!({"status":"ok","message": message,"restart": status})))
}

async fn get_all(AxumState(ctx): AxumState<RestContext>) -> Json<Value> {
    let config = ctx.service.snapshot();
    Json(json!({
        "status":"ok",
        "message":"Device configuration",
        "network": config.network,
        "control": config.comm,
        "gpio": config.gpio,
        "restart": ctx.service.restart_status()
    }))
}

async fn factory_reset(AxumState(ctx): AxumState<RestContext>) -> AppResult<Json<Value>> {
    let outcome = ctx.service.factory_reset().await?;
    Ok(Json(json!({
        "status":"ok",
        "message":"Factory reset completed. Device will restart.",
        "network": outcome.config.network,
        "control": outcome.config.comm,
        "gpio": outcome.config.gpio,
        "restart": outcome.restart
    })))
}

async fn get_section(
    Path(section): Path<String>,
    AxumState(ctx): AxumState<RestContext>,
) -> AppResult<Json<Value>> {
    let value = ctx.service.get_section(&section)?;
    Ok(Json(json!({
        "status":"ok",
        "message": format!("{} configuration", capitalize(wire_key(value.name()))),
        "section": value.name(),
        "config": value
    })))
}

async fn post_section(
    Path(section): Path<String>,
    AxumState(ctx): AxumState<RestContext>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let outcome = ctx
        .service
        .update_section(&section, parse_body(&body)?)
        .await?;
    Ok(Json(update_json(&outcome)))
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed {
        method: method.to_string(),
        path: uri.path().to_string(),
    }
}

// ---------- Helpers ----------
fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::InvalidPayload(
            "request body must be a JSON object".to_string(),
        ));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Serialize `value` and add `status` and `message` alongside its fields.
fn ok_with<T: Serialize>(value: &T, message: &str) -> Value {
    let mut body = serde_json::to_value(value).unwrap_or_else(|_| json!({}));
    if let Value::Object(map) = &mut body {
        map.insert("status".into(), json!("ok"));
        map.insert("message".into(), json!(message));
    }
    body
}

fn update_json(outcome: &UpdateOutcome) -> Value {
    let message = match (outcome.section, outcome.changed, outcome.restart_required) {
        (_, false, _) => "No changes".to_string(),
        (SectionName::Network, true, true) => {
            "Network configuration saved. Device will restart to apply it.".to_string()
        }
        (section, true, false) if section.applies_live() => {
            format!("{} configuration applied", capitalize(section.as_str()))
        }
        (section, true, _) => format!("{} configuration saved", capitalize(section.as_str())),
    };

    let mut body = json!({
        "status":"ok",
        "message": message,
        "applied": outcome.applied,
        "changed": outcome.changed,
        "restart_required": outcome.restart_required,
        "restart": outcome.restart
    });
    body[wire_key(outcome.section)] = serde_json::to_value(&outcome.value).unwrap_or(Value::Null);
    body
}

/// Key a section is published under in responses; the web UI calls comm `control`.
fn wire_key(section: SectionName) -> &'static str {
    match section {
        SectionName::Comm => "control",
        other => other.as_str(),
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
