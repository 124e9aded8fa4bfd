use super::Renderer;
use crate::domain::LogEvent;
use std::fmt::Write as _;

/// Human readable single-line format:
///
/// ```text
/// 2025-01-15T10:30:45.123Z INFO  [worker-1] http - accepted {request_id=r-1}
///     connection reset
///     caused by: broken pipe
/// ```
#[derive(Debug, Clone, Default)]
pub struct PatternRenderer {
    header: Option<String>,
    footer: Option<String>,
}

impl PatternRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    #[must_use]
    pub fn with_footer(mut self, footer: impl Into<String>) -> Self {
        self.footer = Some(footer.into());
        self
    }
}

impl Renderer for PatternRenderer {
    fn render(&self, event: &LogEvent) -> String {
        let mut line = String::with_capacity(96 + event.message().len());
        let _ = write!(
            line,
            "{} {:<5} [{}] {} - {}",
            event.timestamp().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            event.level(),
            event.thread_name().unwrap_or("-"),
            event.source(),
            event.message()
        );

        if !event.context().is_empty() {
            let pairs: Vec<String> = event
                .context()
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            let _ = write!(line, " {{{}}}", pairs.join(", "));
        }
        line.push('\n');

        if let Some(failure) = event.failure() {
            for trace_line in failure.lines() {
                line.push_str("    ");
                line.push_str(trace_line);
                line.push('\n');
            }
        }
        line
    }

    fn header(&self) -> Option<String> {
        self.header.clone()
    }

    fn footer(&self) -> Option<String> {
        self.footer.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LogLevel;
    use chrono::{TimeZone, Utc};

    fn event() -> LogEvent {
        LogEvent::new(LogLevel::Info, "http", "accepted")
            .with_timestamp(Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 45).unwrap())
            .with_thread_name("worker-1")
    }

    #[test]
    fn test_renders_single_line() {
        let rendered = PatternRenderer::new().render(&event());
        assert_eq!(
            rendered,
            "2025-01-15T10:30:45.000Z INFO  [worker-1] http - accepted\n"
        );
    }

    #[test]
    fn test_renders_context_and_failure() {
        let event = event()
            .with_context("request_id", "r-1")
            .with_context("user", "u-9")
            .with_failure_trace("connection reset\ncaused by: broken pipe");

        let rendered = PatternRenderer::new().render(&event);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].ends_with("accepted {request_id=r-1, user=u-9}"));
        assert_eq!(lines[1], "    connection reset");
        assert_eq!(lines[2], "    caused by: broken pipe");
    }

    #[test]
    fn test_header_and_footer_are_optional() {
        assert!(PatternRenderer::new().header().is_none());
        let renderer = PatternRenderer::new().with_header("# start\n");
        assert_eq!(renderer.header().as_deref(), Some("# start\n"));
        assert!(renderer.footer().is_none());
    }
}
