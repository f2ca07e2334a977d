//! Clock and host log forwarding
//!
//! The pull engine reads the current time only when it has to invent an
//! upload date for an asset the host lost track of. Logs leave the process
//! through [`LoggerSink`] so a host can fold sync activity into its own log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;

/// Source of "now"
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for reproducible upload dates in tests
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Severity, ordered from chattiest to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name, also valid as an `EnvFilter` directive
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One forwarded event
///
/// `fields` holds every key/value recorded on the event except the message,
/// already stringified (and redacted, when the runtime is configured to).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub timestamp: DateTime<Utc>,
    pub target: String,
    pub message: String,
    pub fields: BTreeMap<String, String>,
    /// Name of the innermost active span, e.g. `pull_item`
    pub span: Option<String>,
}

impl LogEntry {
    pub fn new(level: LogLevel, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            timestamp: Utc::now(),
            target: target.into(),
            message: message.into(),
            fields: BTreeMap::new(),
            span: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn in_span(mut self, span: impl Into<String>) -> Self {
        self.span = Some(span.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}

/// Host-side destination for sync log events
///
/// Receives events after level filtering. Implementations must not echo
/// remote credentials; the runtime redacts known credential fields before
/// they get here, but free-form messages are passed as-is.
#[async_trait::async_trait]
pub trait LoggerSink: Send + Sync {
    async fn log(&self, entry: LogEntry) -> Result<()>;

    /// Events below this level are dropped before a [`LogEntry`] is built
    fn min_level(&self) -> LogLevel {
        LogLevel::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_fixed_clock_is_frozen() {
        let instant = DateTime::from_timestamp(1_717_243_200, 0).unwrap();
        let clock = FixedClock(instant);

        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let before = Utc::now();
        assert!(SystemClock.now() >= before);
    }

    #[test]
    fn test_level_order_and_names() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Warn.to_string(), "warn");
        assert_eq!(serde_json::to_string(&LogLevel::Error).unwrap(), "\"error\"");
    }

    #[test]
    fn test_entry_fields_and_span() {
        let entry = LogEntry::new(LogLevel::Info, "core_sync::pull", "Pulled item")
            .with_field("mapping_id", "12")
            .with_field("item_id", "1204")
            .in_span("pull_item");

        assert_eq!(entry.field("item_id"), Some("1204"));
        assert_eq!(entry.field("missing"), None);
        assert_eq!(entry.span.as_deref(), Some("pull_item"));
        let keys: Vec<_> = entry.fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["item_id", "mapping_id"]);
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<LogEntry>>);

    #[async_trait::async_trait]
    impl LoggerSink for Collect {
        async fn log(&self, entry: LogEntry) -> Result<()> {
            self.0.lock().unwrap().push(entry);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_default_threshold() {
        let sink = Collect::default();
        assert_eq!(sink.min_level(), LogLevel::Info);

        sink.log(LogEntry::new(LogLevel::Warn, "core_sync", "Skipped attachment"))
            .await
            .unwrap();
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }
}
