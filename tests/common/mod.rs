//! Shared test utilities for the device config agent tests.
//!
//! This module provides common test infrastructure including:
//! - A harness wiring the service to in-memory storage and a mock restart
//! - Request helpers driving the router without a socket
//! - JSON assertion helpers

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use device_config_agent::{
    events::EventBus,
    rest_api::{build_router, RestContext},
    restart::{MockRestart, RestartCoordinator, RestartPhase, RestartSettings, RestartStatus},
    service::ConfigService,
    state::{DeviceConfig, DEFAULT_MAC},
    store::{ConfigStore, MemoryBackend},
    validation::ValidationPolicy,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Restart timings short enough for tests.
pub fn fast_restart_settings() -> RestartSettings {
    RestartSettings {
        drain_delay: Duration::from_millis(100),
        drain_timeout: Duration::from_millis(300),
        retry_after: Duration::from_secs(7),
        restart_timeout: Duration::from_secs(10),
    }
}

/// Complete agent wired to in-memory storage and a mock restart primitive.
pub struct TestHarness {
    pub service: ConfigService,
    pub backend: MemoryBackend,
    pub platform: MockRestart,
    pub events: EventBus,
}

impl TestHarness {
    /// Fresh device on factory defaults.
    pub fn new() -> Self {
        Self::with_backend(MemoryBackend::new(), fast_restart_settings())
    }

    /// Use `backend` as the durable storage, e.g. one pre-loaded with a document.
    pub fn with_backend(backend: MemoryBackend, settings: RestartSettings) -> Self {
        let platform = MockRestart::new();
        let store = Arc::new(
            ConfigStore::open(
                Arc::new(backend.clone()),
                DeviceConfig::factory(DEFAULT_MAC),
            )
            .expect("memory store opens"),
        );
        let events = EventBus::new();
        let coordinator = RestartCoordinator::new(
            Arc::new(platform.clone()),
            store.clone(),
            events.clone(),
            settings,
        );
        let service = ConfigService::new(
            store,
            ValidationPolicy::default(),
            coordinator,
            events.clone(),
        );

        Self {
            service,
            backend,
            platform,
            events,
        }
    }

    pub fn router(&self) -> Router {
        build_router(RestContext {
            service: self.service.clone(),
        })
    }

    /// Send a request through a fresh router and decode the JSON body.
    pub async fn request(&self, method: Method, uri: &str, body: Option<&str>) -> TestResponse {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        let response = self.router().oneshot(request).await.expect("router responds");
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        TestResponse {
            status,
            retry_after,
            json,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: &str) -> TestResponse {
        self.request(Method::POST, uri, Some(body)).await
    }

    /// Wait until the restart state machine satisfies `predicate`.
    pub async fn wait_for_restart(
        &self,
        predicate: impl FnMut(&RestartStatus) -> bool,
    ) -> RestartStatus {
        let mut rx = self.service.restart_coordinator().subscribe();
        let status = tokio::time::timeout(Duration::from_secs(3), rx.wait_for(predicate))
            .await
            .expect("restart state reached in time")
            .expect("coordinator alive")
            .clone();
        status
    }

    /// Wait until the mock restart primitive has been invoked `expected` times.
    ///
    /// `Restarting` is published before the primitive runs on the blocking pool.
    pub async fn wait_for_restart_calls(&self, expected: usize) {
        tokio::time::timeout(Duration::from_secs(3), async {
            while self.platform.calls() < expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("restart primitive invoked in time");
    }

    pub async fn wait_for_phase(&self, phase: RestartPhase) -> RestartStatus {
        self.wait_for_restart(|s| s.phase == phase).await
    }
}

/// A decoded response.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub retry_after: Option<String>,
    pub json: Value,
}

/// Assert that a JSON value contains specific fields with expected values.
///
/// # Example
/// ```ignore
/// let actual = json!({"status": "ok", "tcp_port": 5050});
/// let expected = json!({"status": "ok"});
/// assert_json_contains(&actual, &expected); // Passes - actual contains all of expected
/// ```
pub fn assert_json_contains(actual: &Value, expected: &Value) {
    assert_json_diff::assert_json_include!(actual: actual, expected: expected);
}

/// Field names listed in an error response.
pub fn rejected_fields(json: &Value) -> Vec<String> {
    json["error"]["fields"]
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|f| f["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
