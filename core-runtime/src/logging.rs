//! # Logging
//!
//! Installs the global `tracing` subscriber for the sync runtime.
//!
//! Every sync crate logs through `tracing` macros. This module decides where
//! those events end up: a formatted stdout stream (pretty while developing,
//! JSON in release builds) and, optionally, a host [`LoggerSink`] that
//! receives each event as a [`LogEntry`].
//!
//! Pulls touch remote credentials and account emails, so values headed for
//! the host sink are passed through [`redact_if_sensitive`] unless redaction
//! is switched off. Temporary download paths should be logged through
//! [`strip_path`].
//!
//! ```ignore
//! use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
//! use bridge_traits::time::LogLevel;
//!
//! init_logging(
//!     LoggingConfig::default()
//!         .with_format(LogFormat::Compact)
//!         .with_level(LogLevel::Debug)
//!         .with_logger_sink(host_sink),
//! )?;
//! tracing::info!(item_id = 1204, "Pull started");
//! ```

use crate::error::{Error, Result};

use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};

use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::format::FmtSpan,
    layer::{Context, SubscriberExt},
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer, Registry,
};

/// Crates whose events follow the configured level
const SYNC_TARGETS: &[&str] = &[
    "content_sync_workspace",
    "core_runtime",
    "core_sync",
    "bridge_traits",
    "bridge_desktop",
];

/// HTTP plumbing that is only interesting when it warns
const QUIET_TARGETS: &[&str] = &["h2", "hyper", "reqwest"];

/// Field-name fragments whose values never leave the process
const CREDENTIAL_KEYS: &[&str] = &[
    "token",
    "password",
    "secret",
    "api_key",
    "api-key",
    "apikey",
    "authorization",
    "bearer",
    "cookie",
];

const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored
    Pretty,
    /// One JSON object per event
    Json,
    /// Single line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level applied to the sync crates when no `filter` is given
    pub level: LogLevel,
    /// Redact credentials and emails before events reach `logger_sink`
    pub redact_pii: bool,
    /// Full `EnvFilter` directive string, replaces the level-based default
    pub filter: Option<String>,
    pub logger_sink: Option<Arc<dyn LoggerSink>>,
    /// Include span enter/exit and span context in stdout output
    pub enable_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: LogLevel::Info,
            redact_pii: true,
            filter: None,
            logger_sink: None,
            enable_spans: true,
        }
    }
}

impl LoggingConfig {
    pub fn with_format(self, format: LogFormat) -> Self {
        Self { format, ..self }
    }

    pub fn with_level(self, level: LogLevel) -> Self {
        Self { level, ..self }
    }

    pub fn with_pii_redaction(self, redact_pii: bool) -> Self {
        Self { redact_pii, ..self }
    }

    pub fn with_filter(self, filter: impl Into<String>) -> Self {
        Self {
            filter: Some(filter.into()),
            ..self
        }
    }

    pub fn with_logger_sink(self, sink: Arc<dyn LoggerSink>) -> Self {
        Self {
            logger_sink: Some(sink),
            ..self
        }
    }

    pub fn with_spans(self, enable_spans: bool) -> Self {
        Self {
            enable_spans,
            ..self
        }
    }
}

/// Install the global subscriber
///
/// Fails if the filter string does not parse or a global subscriber is
/// already set, so call it once at host startup.
pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = build_filter(&config)?;
    let forward = config
        .logger_sink
        .clone()
        .map(|sink| LoggerSinkLayer::new(sink, config.redact_pii));

    tracing_subscriber::registry()
        .with(stdout_layer(&config))
        .with(forward)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}

fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = config
        .filter
        .clone()
        .unwrap_or_else(|| default_filter(config.level));

    EnvFilter::try_new(&directives)
        .map_err(|e| Error::Logging(format!("bad filter {:?}: {}", directives, e)))
}

/// `level` for the sync crates, `warn` for the HTTP stack
fn default_filter(level: LogLevel) -> String {
    let sync = SYNC_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level));
    let quiet = QUIET_TARGETS.iter().map(|target| format!("{}=warn", target));

    sync.chain(quiet).collect::<Vec<_>>().join(",")
}

fn stdout_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stdout);

    match config.format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer
            .json()
            .flatten_event(true)
            .with_current_span(config.enable_spans)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => {
            let span_events = match config.enable_spans {
                true => FmtSpan::NEW | FmtSpan::CLOSE,
                false => FmtSpan::NONE,
            };
            layer.pretty().with_span_events(span_events).boxed()
        }
    }
}

/// Mirrors events into a host [`LoggerSink`]
struct LoggerSinkLayer {
    sink: Arc<dyn LoggerSink>,
    redact_pii: bool,
}

impl LoggerSinkLayer {
    fn new(sink: Arc<dyn LoggerSink>, redact_pii: bool) -> Self {
        Self { sink, redact_pii }
    }

    fn entry_for<S>(&self, event: &Event<'_>, ctx: &Context<'_, S>) -> LogEntry
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let metadata = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let message = fields
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut entry = LogEntry::new(log_level(metadata.level()), metadata.target(), message);

        for (key, value) in fields.values {
            let value = match self.redact_pii {
                true => redact_if_sensitive(&key, &value),
                false => value,
            };
            entry.fields.insert(key, value);
        }
        if let Some(span) = ctx.lookup_current() {
            entry.span = Some(span.name().to_string());
        }

        entry
    }
}

impl<S> Layer<S> for LoggerSinkLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        if log_level(event.metadata().level()) < self.sink.min_level() {
            return;
        }
        deliver(Arc::clone(&self.sink), self.entry_for(event, &ctx));
    }
}

/// Hand the entry to the sink without blocking a runtime worker
fn deliver(sink: Arc<dyn LoggerSink>, entry: LogEntry) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(async move {
                if let Err(e) = sink.log(entry).await {
                    eprintln!("host log sink rejected entry: {}", e);
                }
            });
        }
        Err(_) => {
            if let Err(e) = futures::executor::block_on(sink.log(entry)) {
                eprintln!("host log sink rejected entry: {}", e);
            }
        }
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: BTreeMap<String, String>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: String) {
        match field.name() {
            "message" => self.message = Some(value),
            name => {
                self.values.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.to_string());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.put(field, value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{:?}", value));
    }
}

fn log_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warn,
        Level::INFO => LogLevel::Info,
        Level::DEBUG => LogLevel::Debug,
        Level::TRACE => LogLevel::Trace,
    }
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^([^@\s])[^@\s]*@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
    })
}

/// Value safe to put in a log line
///
/// Credential-looking field names lose their value entirely. Email addresses
/// keep only their first character so an operator can still tell accounts
/// apart.
///
/// ```ignore
/// tracing::debug!(api_key = %redact_if_sensitive("api_key", &key), "Calling remote");
/// ```
pub fn redact_if_sensitive(field_name: &str, value: &str) -> String {
    let name = field_name.to_ascii_lowercase();
    if CREDENTIAL_KEYS.iter().any(|key| name.contains(key)) {
        return REDACTED.to_string();
    }

    match email_pattern().captures(value.trim()) {
        Some(caps) => format!("{}***@{}", &caps[1], REDACTED),
        None => value.to_string(),
    }
}

/// Final path component, for logging temp files without their directory
pub fn strip_path(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as SinkResult;
    use std::sync::Mutex;

    struct RecordingSink {
        min: LogLevel,
        entries: Mutex<Vec<LogEntry>>,
    }

    impl RecordingSink {
        fn at(min: LogLevel) -> Arc<Self> {
            Arc::new(Self {
                min,
                entries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LoggerSink for RecordingSink {
        async fn log(&self, entry: LogEntry) -> SinkResult<()> {
            self.entries.lock().unwrap().push(entry);
            Ok(())
        }

        fn min_level(&self) -> LogLevel {
            self.min
        }
    }

    fn forward_to(sink: Arc<RecordingSink>, redact: bool) -> tracing::subscriber::DefaultGuard {
        let layer = LoggerSinkLayer::new(sink, redact);
        tracing::subscriber::set_default(tracing_subscriber::registry().with(layer))
    }

    #[test]
    fn test_builder_replaces_only_named_field() {
        let config = LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_pii_redaction(false)
            .with_spans(false);

        assert_eq!(config.format, LogFormat::Compact);
        assert_eq!(config.level, LogLevel::Info);
        assert!(!config.redact_pii);
        assert!(!config.enable_spans);
        assert!(config.filter.is_none());
    }

    #[test]
    fn test_default_format_follows_build_profile() {
        let expected = if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        };
        assert_eq!(LogFormat::default(), expected);
    }

    #[test]
    fn test_default_filter_directives() {
        let filter = default_filter(LogLevel::Debug);

        assert!(filter.starts_with("content_sync_workspace=debug,"));
        assert!(filter.contains("core_sync=debug"));
        assert!(filter.contains("bridge_desktop=debug"));
        assert!(filter.ends_with("hyper=warn,reqwest=warn"));
    }

    #[test]
    fn test_build_filter_prefers_custom_string() {
        let config = LoggingConfig::default()
            .with_level(LogLevel::Error)
            .with_filter("core_sync=trace");
        let filter = build_filter(&config).unwrap().to_string();

        assert!(filter.contains("core_sync=trace"));
        assert!(!filter.contains("error"));
    }

    #[test]
    fn test_build_filter_rejects_garbage() {
        let config = LoggingConfig::default().with_filter("core_sync=loud");
        assert!(matches!(build_filter(&config), Err(Error::Logging(_))));
    }

    #[test]
    fn test_credentials_redacted_by_name() {
        assert_eq!(redact_if_sensitive("access_token", "abc"), REDACTED);
        assert_eq!(redact_if_sensitive("X-Api-Key", "abc"), REDACTED);
        assert_eq!(redact_if_sensitive("remote_api_key", "abc"), REDACTED);
        assert_eq!(redact_if_sensitive("Password", "hunter2"), REDACTED);
    }

    #[test]
    fn test_email_keeps_first_character() {
        assert_eq!(
            redact_if_sensitive("account", "ops@example.com"),
            "o***@[REDACTED]"
        );
        assert_eq!(redact_if_sensitive("title", "Q3 @ HQ"), "Q3 @ HQ");
        assert_eq!(redact_if_sensitive("title", "Launch post"), "Launch post");
    }

    #[test]
    fn test_strip_path_edge_cases() {
        assert_eq!(strip_path("/tmp/sync_media/hero.png"), "hero.png");
        assert_eq!(strip_path("C:\\Temp\\hero.png"), "hero.png");
        assert_eq!(strip_path("/var/log/"), "");
    }

    #[test]
    fn test_sink_receives_fields_and_span() {
        let sink = RecordingSink::at(LogLevel::Trace);
        let _guard = forward_to(sink.clone(), false);

        let span = tracing::info_span!("pull_item");
        let _entered = span.enter();
        tracing::info!(target: "core_sync::pull", item_id = 42u64, "pulled item");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].target, "core_sync::pull");
        assert_eq!(entries[0].message, "pulled item");
        assert_eq!(entries[0].field("item_id"), Some("42"));
        assert_eq!(entries[0].span.as_deref(), Some("pull_item"));
    }

    #[test]
    fn test_sink_threshold_and_redaction() {
        let sink = RecordingSink::at(LogLevel::Warn);
        let _guard = forward_to(sink.clone(), true);

        tracing::info!("below threshold");
        tracing::warn!(api_key = "k-123", account = "ops@example.com", "remote call failed");

        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Warn);
        assert_eq!(entries[0].field("api_key"), Some(REDACTED));
        assert_eq!(entries[0].field("account"), Some("o***@[REDACTED]"));
    }
}
