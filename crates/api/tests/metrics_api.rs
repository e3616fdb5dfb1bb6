//! Integration tests for the Prometheus metrics endpoint.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{body_string, build_test_app, get};
use iot_health_core::registry::{Channel, ChannelRegistry};

// ---------------------------------------------------------------------------
// Test: GET /metrics serves the exposition format
// ---------------------------------------------------------------------------

#[tokio::test]
async fn metrics_served_as_prometheus_text() {
    let registry = ChannelRegistry::from_channels([
        Channel::new("sensors/temp one").with_type("temperature"),
        Channel::new("sensors/idle"),
    ]);
    let app = build_test_app(registry);
    let now = Utc::now();
    app.tracker.record("sensors/temp one", now - Duration::seconds(20));
    app.tracker.record("sensors/temp one", now - Duration::seconds(10));

    let response = get(&app.router, "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .expect("Missing content-type header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/plain"), "got {content_type}");

    let doc = body_string(response).await;
    let temp = r#"{topic="sensors_temp_one",display_name="sensors_temp_one",type="temperature"}"#;
    let idle = r#"{topic="sensors_idle",display_name="sensors_idle",type="unknown"}"#;

    assert!(doc.contains("# TYPE mqtt_topic_last_seen_timestamp gauge"));
    assert!(doc.contains(&format!("mqtt_topic_message_count{temp} 2\n")));
    assert!(doc.contains(&format!("mqtt_topic_healthy{temp} 1\n")));
    assert!(doc.contains(&format!("mqtt_topic_avg_interval_seconds{temp} 10\n")));

    assert!(doc.contains(&format!("mqtt_topic_last_seen_timestamp{idle} 0\n")));
    assert!(doc.contains(&format!("mqtt_topic_healthy{idle} 0\n")));
    assert!(!doc.contains(&format!("mqtt_topic_avg_interval_seconds{idle}")));
}

// ---------------------------------------------------------------------------
// Test: no topics still yields a valid document
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_registry_exports_headers_only() {
    let app = build_test_app(ChannelRegistry::empty());

    let doc = body_string(get(&app.router, "/metrics").await).await;

    assert!(doc.ends_with('\n'));
    assert!(doc.lines().all(|l| l.starts_with('#')));
    assert_eq!(doc.matches("# HELP ").count(), 4);
}
