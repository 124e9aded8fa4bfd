use super::Renderer;
use crate::domain::LogEvent;
use serde::Serialize;
use std::collections::BTreeMap;

/// One JSON object per line, with second precision UTC timestamps.
///
/// Keys: `timestamp`, `level`, `thread`, `source`, `message`, `throwable`
/// (only with a failure trace) and `mdc`. There is no nested diagnostic
/// stack or caller location; the `mdc` map carries all context.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    level: &'a str,
    thread: Option<&'a str>,
    source: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    throwable: Option<&'a str>,
    mdc: &'a BTreeMap<String, String>,
}

impl Renderer for JsonRenderer {
    fn render(&self, event: &LogEvent) -> String {
        let line = JsonLine {
            timestamp: event.timestamp().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            level: event.level().as_str(),
            thread: event.thread_name(),
            source: event.source(),
            message: event.message(),
            throwable: event.failure(),
            mdc: event.context(),
        };

        match serde_json::to_string(&line) {
            Ok(mut json) => {
                json.push('\n');
                json
            }
            // Only reachable with a broken Serialize impl; keep the message
            Err(e) => format!(
                "{{\"level\":\"{}\",\"message\":\"unrenderable event: {}\"}}\n",
                event.level().as_str(),
                e
            ),
        }
    }
}
