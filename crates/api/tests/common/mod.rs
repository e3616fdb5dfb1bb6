#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use iot_health_api::config::ServerConfig;
use iot_health_api::router::build_app_router;
use iot_health_api::state::AppState;
use iot_health_core::registry::ChannelRegistry;
use iot_health_core::tracker::ArrivalTracker;
use iot_health_events::{ArrivalBus, ArrivalRecorder};
use iot_health_mqtt::MqttOptions;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        cors_origins: vec!["http://localhost:5000".to_string()],
        request_timeout_secs: 30,
        icons_dir: PathBuf::from("icons"),
        topics_file: PathBuf::from("topics.json"),
        mqtt: MqttOptions::new("localhost", 1883, "test-client"),
    }
}

/// Application under test plus the tracker it reads from.
pub struct TestApp {
    pub router: Router,
    pub tracker: Arc<ArrivalTracker>,
}

/// Build the full application router over `registry`, with a live recorder
/// draining the arrival bus.
pub fn build_test_app(registry: ChannelRegistry) -> TestApp {
    build_test_app_with(registry, test_config(), true)
}

/// Like [`build_test_app`] but with a custom config and optionally without
/// a recorder (the bus is closed).
pub fn build_test_app_with(
    registry: ChannelRegistry,
    config: ServerConfig,
    with_recorder: bool,
) -> TestApp {
    let tracker = Arc::new(ArrivalTracker::new());
    let (arrivals, receiver) = ArrivalBus::new(64);
    if with_recorder {
        tokio::spawn(ArrivalRecorder::run(Arc::clone(&tracker), receiver));
    } else {
        drop(receiver);
    }

    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::new(registry),
        tracker: Arc::clone(&tracker),
        arrivals,
    };

    TestApp {
        router: build_app_router(state, &config),
        tracker,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Poll until `topic` has `count` recorded arrivals, or panic after a second.
pub async fn wait_for_count(tracker: &ArrivalTracker, topic: &str, count: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        let seen = tracker.state(topic).map(|s| s.count()).unwrap_or(0);
        if seen >= count {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {count} arrivals on {topic}, saw {seen}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
