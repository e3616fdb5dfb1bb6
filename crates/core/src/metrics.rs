//! Prometheus text exposition of evaluated channel status.
//!
//! Each family is written once with its `# HELP` / `# TYPE` header followed
//! by one sample per channel. Channels without a value for a family (no
//! average interval yet) are simply left out of that family.

use std::fmt::Write;

use crate::status::{HealthStatus, StatusView};

/// Prefix shared by every exported metric name.
pub const METRIC_PREFIX: &str = "mqtt_topic";

/// Content type served alongside [`export`] output.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Characters replaced by `_` in label values.
const REPLACED_LABEL_CHARS: [char; 5] = ['/', '-', '.', ':', ' '];

struct Family {
    name: &'static str,
    kind: &'static str,
    help: &'static str,
    value: fn(&StatusView) -> Option<String>,
}

const FAMILIES: [Family; 4] = [
    Family {
        name: "last_seen_timestamp",
        kind: "gauge",
        help: "Unix timestamp of last message received for each topic",
        value: last_seen_value,
    },
    Family {
        name: "message_count",
        kind: "counter",
        help: "Total number of messages received for each topic",
        value: message_count_value,
    },
    Family {
        name: "healthy",
        kind: "gauge",
        help: "Whether the topic is considered healthy (1) or not (0)",
        value: healthy_value,
    },
    Family {
        name: "avg_interval_seconds",
        kind: "gauge",
        help: "Average interval between messages in seconds",
        value: avg_interval_value,
    },
];

fn last_seen_value(view: &StatusView) -> Option<String> {
    Some(view.last_seen_epoch.unwrap_or(0).to_string())
}

fn message_count_value(view: &StatusView) -> Option<String> {
    Some(view.message_count.to_string())
}

fn healthy_value(view: &StatusView) -> Option<String> {
    Some(u8::from(view.status == HealthStatus::Healthy).to_string())
}

fn avg_interval_value(view: &StatusView) -> Option<String> {
    view.avg_interval_secs
        .filter(|secs| *secs > 0.0)
        .map(|secs| secs.to_string())
}

/// Render `views` as a Prometheus text exposition document.
///
/// Never fails; the document always ends with a newline.
pub fn export(views: &[StatusView]) -> String {
    let mut out = String::new();
    let labels: Vec<String> = views.iter().map(label_set).collect();

    for family in &FAMILIES {
        let name = format!("{METRIC_PREFIX}_{}", family.name);
        // Writing to a String cannot fail.
        let _ = writeln!(out, "# HELP {name} {}", family.help);
        let _ = writeln!(out, "# TYPE {name} {}", family.kind);

        for (view, labels) in views.iter().zip(&labels) {
            if let Some(value) = (family.value)(view) {
                let _ = writeln!(out, "{name}{{{labels}}} {value}");
            }
        }
    }

    out
}

fn label_set(view: &StatusView) -> String {
    format!(
        "topic=\"{}\",display_name=\"{}\",type=\"{}\"",
        sanitize_label(&view.topic),
        sanitize_label(&view.display_name),
        sanitize_label(&view.channel_type),
    )
}

/// Make a value safe for use inside a quoted label.
///
/// `/ - . : space` become `_`; backslash, double quote and newline are
/// escaped as the exposition format requires.
pub fn sanitize_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            c if REPLACED_LABEL_CHARS.contains(&c) => out.push('_'),
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::registry::Channel;
    use crate::status::render_status;
    use crate::tracker::ArrivalTracker;
    use crate::types::Timestamp;

    fn ts(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn sample_lines<'a>(doc: &'a str, family: &str) -> Vec<&'a str> {
        let prefix = format!("{METRIC_PREFIX}_{family}{{");
        doc.lines().filter(|l| l.starts_with(&prefix)).collect()
    }

    #[test]
    fn sanitize_replaces_separator_characters() {
        assert_eq!(sanitize_label("sensors/temp one"), "sensors_temp_one");
        assert_eq!(sanitize_label("a-b.c:d"), "a_b_c_d");
        assert_eq!(sanitize_label("plain"), "plain");
    }

    #[test]
    fn sanitize_escapes_quote_backslash_newline() {
        assert_eq!(sanitize_label(r#"say "hi""#), r#"say_\"hi\""#);
        assert_eq!(sanitize_label("a\\b"), "a\\\\b");
        assert_eq!(sanitize_label("x\ny"), "x\\ny");
    }

    #[test]
    fn empty_export_has_headers_and_trailing_newline() {
        let doc = export(&[]);

        assert!(doc.ends_with('\n'));
        assert_eq!(doc.matches("# HELP ").count(), 4);
        assert_eq!(doc.matches("# TYPE ").count(), 4);
        assert!(doc.contains("# TYPE mqtt_topic_message_count counter"));
        assert!(doc.contains("# TYPE mqtt_topic_healthy gauge"));
    }

    #[test]
    fn never_seen_channel_exports_zeroes_without_interval() {
        let view = render_status(&Channel::new("sensors/temp one"), None, ts(0));
        let doc = export(&[view]);

        let labels = r#"{topic="sensors_temp_one",display_name="sensors_temp_one",type="unknown"}"#;
        assert!(doc.contains(&format!("mqtt_topic_last_seen_timestamp{labels} 0\n")));
        assert!(doc.contains(&format!("mqtt_topic_message_count{labels} 0\n")));
        assert!(doc.contains(&format!("mqtt_topic_healthy{labels} 0\n")));
        assert!(sample_lines(&doc, "avg_interval_seconds").is_empty());
    }

    #[test]
    fn single_arrival_omits_average_interval() {
        let tracker = ArrivalTracker::new();
        tracker.record("t", ts(0));
        let view = render_status(&Channel::new("t"), tracker.state("t").as_ref(), ts(1));

        let doc = export(&[view]);
        assert_eq!(sample_lines(&doc, "healthy"), [r#"mqtt_topic_healthy{topic="t",display_name="t",type="unknown"} 1"#]);
        assert!(sample_lines(&doc, "avg_interval_seconds").is_empty());
    }

    #[test]
    fn seen_channel_exports_every_family() {
        let tracker = ArrivalTracker::new();
        tracker.record("home/door", ts(0));
        tracker.record("home/door", ts(30));
        tracker.record("home/door", ts(90));
        let channel = Channel::new("home/door")
            .with_display_name("Front door")
            .with_type("contact");

        let view = render_status(&channel, tracker.state("home/door").as_ref(), ts(100));
        let doc = export(&[view]);

        let labels = r#"{topic="home_door",display_name="Front_door",type="contact"}"#;
        let epoch = ts(90).timestamp();
        assert!(doc.contains(&format!("mqtt_topic_last_seen_timestamp{labels} {epoch}\n")));
        assert!(doc.contains(&format!("mqtt_topic_message_count{labels} 3\n")));
        assert!(doc.contains(&format!("mqtt_topic_healthy{labels} 1\n")));
        assert!(doc.contains(&format!("mqtt_topic_avg_interval_seconds{labels} 45\n")));
    }

    #[test]
    fn unhealthy_channel_exports_healthy_zero() {
        let tracker = ArrivalTracker::new();
        tracker.record("t", ts(0));
        let view = render_status(&Channel::new("t"), tracker.state("t").as_ref(), ts(7200));

        let doc = export(&[view]);
        assert_eq!(sample_lines(&doc, "healthy"), [r#"mqtt_topic_healthy{topic="t",display_name="t",type="unknown"} 0"#]);
    }

    #[test]
    fn samples_follow_their_family_header() {
        let views = [
            render_status(&Channel::new("a"), None, ts(0)),
            render_status(&Channel::new("b"), None, ts(0)),
        ];
        let doc = export(&views);
        let lines: Vec<_> = doc.lines().collect();

        let header = lines
            .iter()
            .position(|l| *l == "# TYPE mqtt_topic_message_count counter")
            .unwrap();
        assert!(lines[header + 1].starts_with("mqtt_topic_message_count{topic=\"a\""));
        assert!(lines[header + 2].starts_with("mqtt_topic_message_count{topic=\"b\""));
        assert!(lines[header + 3].starts_with("# HELP mqtt_topic_healthy"));
    }
}
