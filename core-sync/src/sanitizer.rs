//! Field Sanitizer
//!
//! Type-specific cleaning of values destined for native record fields.

use bridge_traits::{RecordId, RecordStore};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use regex::{Captures, Regex};
use std::sync::{Arc, OnceLock};

use crate::error::FieldError;

/// Native record field names
pub mod fields {
    pub const ID: &str = "ID";
    pub const TITLE: &str = "title";
    pub const CONTENT: &str = "content";
    pub const EXCERPT: &str = "excerpt";
    pub const AUTHOR: &str = "author";
    pub const STATUS: &str = "status";
    pub const TYPE: &str = "type";
    pub const FORMAT: &str = "format";
    pub const DATE: &str = "date";
    pub const DATE_GMT: &str = "date_gmt";
    pub const MODIFIED: &str = "modified";
    pub const MODIFIED_GMT: &str = "modified_gmt";
}

/// Inline tags kept in titles
const TITLE_TAGS: &[&str] = &["strong", "em", "del", "ins", "code"];

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Record the value is being sanitized for
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldContext<'a> {
    pub record_id: Option<RecordId>,
    pub record_type: Option<&'a str>,
}

pub struct FieldSanitizer {
    record_store: Arc<dyn RecordStore>,
    local_offset: FixedOffset,
}

impl FieldSanitizer {
    pub fn new(record_store: Arc<dyn RecordStore>, local_offset: FixedOffset) -> Self {
        Self {
            record_store,
            local_offset,
        }
    }

    /// Sanitize `value` for the native field `field`.
    ///
    /// Empty values are returned unchanged, except for `ID` which can never
    /// be set from mapped content.
    pub fn sanitize(
        &self,
        field: &str,
        value: &str,
        ctx: &FieldContext<'_>,
    ) -> Result<String, FieldError> {
        if field == fields::ID {
            return Err(FieldError::ProtectedId);
        }

        if value.is_empty() {
            return Ok(String::new());
        }

        let value = match field {
            fields::DATE | fields::DATE_GMT | fields::MODIFIED | fields::MODIFIED_GMT => {
                return self.format_date(field, value);
            }
            fields::FORMAT => {
                if let Some(record_type) = ctx.record_type {
                    if !self.record_store.supports_formats(record_type) {
                        return Err(FieldError::UnsupportedFormat {
                            record_type: record_type.to_string(),
                        });
                    }
                }
                strip_tags(value, TITLE_TAGS)
            }
            fields::TITLE => strip_tags(value, TITLE_TAGS),
            _ => value.to_string(),
        };

        Ok(self
            .record_store
            .sanitize_field(field, &value, ctx.record_id))
    }

    fn format_date(&self, field: &str, value: &str) -> Result<String, FieldError> {
        let parsed = parse_datetime(value, self.local_offset).ok_or_else(|| {
            FieldError::InvalidDate {
                field: field.to_string(),
            }
        })?;

        let formatted = if field.ends_with("_gmt") {
            parsed.with_timezone(&Utc).format(DATE_FORMAT).to_string()
        } else {
            parsed
                .with_timezone(&self.local_offset)
                .format(DATE_FORMAT)
                .to_string()
        };

        Ok(formatted)
    }
}

/// Parse a unix timestamp or date string.
///
/// Strings without a zone are read in `offset`.
pub fn parse_datetime(value: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(secs) = value.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).map(|dt| dt.fixed_offset());
    }
    if let Some(secs) = value.parse::<f64>().ok().filter(|secs| secs.is_finite()) {
        return DateTime::from_timestamp(secs.trunc() as i64, 0).map(|dt| dt.fixed_offset());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt);
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y/%m/%d %H:%M:%S",
    ];
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;

    offset.from_local_datetime(&naive).single()
}

/// Parse a remote or stored timestamp; zone-less values are UTC
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    parse_datetime(value, Utc.fix()).map(|dt| dt.with_timezone(&Utc))
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)<!--.*?-->|</?([a-zA-Z][a-zA-Z0-9-]*)\b[^>]*>")
            .expect("tag pattern is a valid regex")
    })
}

fn whitespace_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is a valid regex"))
}

/// Remove markup, keeping the tags named in `allowed`
pub fn strip_tags(value: &str, allowed: &[&str]) -> String {
    tag_pattern()
        .replace_all(value, |caps: &Captures<'_>| {
            let keep = caps
                .get(1)
                .map(|name| {
                    let name = name.as_str().to_ascii_lowercase();
                    allowed.iter().any(|tag| *tag == name)
                })
                .unwrap_or(false);

            if keep {
                caps[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

/// Plain text: no markup, single spaces, trimmed
pub fn sanitize_text(value: &str) -> String {
    let stripped = strip_tags(value, &[]);
    whitespace_pattern()
        .replace_all(&stripped, " ")
        .trim()
        .to_string()
}
