//! Field Mapper
//!
//! Walks an item's tabs and elements in declared order and routes every
//! mapped element value into the record payload: native fields, taxonomy
//! terms, metadata, or media references collected for placement after the
//! record is persisted.
//!
//! Failures inside one element are recorded as skips and mapping carries on
//! with the next element.

use bridge_traits::{
    Element, ElementType, Item, MediaFile, RecordPayload, TermRef,
};
use core_runtime::config::CoreConfig;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::FieldError;
use crate::hooks::PullHooks;
use crate::mapping::{Destination, Mapping, MediaDestination};
use crate::outcome::{Skip, SkipScope};
use crate::placement::media_token;
use crate::pull::PullSettings;
use crate::sanitizer::{fields, sanitize_text, FieldContext, FieldSanitizer};
use crate::terms::{is_meaningful, TermResolver};

/// An item's files grouped by owning element name
pub type ItemFiles = BTreeMap<String, Vec<MediaFile>>;

pub fn group_files(files: Vec<MediaFile>) -> ItemFiles {
    let mut grouped = ItemFiles::new();
    for file in files {
        grouped.entry(file.field.clone()).or_default().push(file);
    }
    grouped
}

/// A media file waiting to be placed
#[derive(Debug, Clone, PartialEq)]
pub struct MediaReference {
    pub file: MediaFile,
    /// 1-based position within the owning element
    pub position: usize,
}

impl MediaReference {
    /// Placeholder written into text fields for inline destinations
    pub fn token(&self) -> String {
        media_token(self.file.id)
    }
}

/// Media references of one element and where they go
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentGroup {
    pub element: String,
    pub destination: MediaDestination,
    pub media: Vec<MediaReference>,
}

/// Payload ready for persistence plus what mapping left for later
#[derive(Debug, Clone)]
pub struct MappingResult {
    pub payload: RecordPayload,
    pub attachments: Vec<AttachmentGroup>,
    pub skipped: Vec<Skip>,
}

/// Per-pass mapping state
struct MapState {
    payload: RecordPayload,
    attachments: Vec<AttachmentGroup>,
    /// Append fields not yet written during this pass
    unwritten: BTreeSet<String>,
}

pub struct FieldMapper {
    sanitizer: FieldSanitizer,
    terms: TermResolver,
    hooks: Arc<dyn PullHooks>,
    settings: PullSettings,
}

impl FieldMapper {
    pub fn new(config: &CoreConfig, hooks: Arc<dyn PullHooks>, settings: PullSettings) -> Self {
        Self {
            sanitizer: FieldSanitizer::new(Arc::clone(&config.record_store), config.local_offset()),
            terms: TermResolver::new(Arc::clone(&config.taxonomy_store)),
            hooks,
            settings,
        }
    }

    /// Map `item` onto `payload` according to `mapping`
    pub async fn map(
        &self,
        item: &Item,
        files: &ItemFiles,
        mapping: &Mapping,
        mut payload: RecordPayload,
    ) -> MappingResult {
        apply_defaults(&mut payload, item, mapping);

        let mut state = MapState {
            payload,
            attachments: Vec::new(),
            unwritten: self.settings.append_fields.clone(),
        };
        let mut skipped = Vec::new();

        for tab in &item.config {
            for element in &tab.elements {
                let Some(destination) = mapping.destination(&element.name) else {
                    continue;
                };

                debug!(element = %element.name, ?destination, "Mapping element");
                if let Err(e) = self
                    .map_element(&mut state, item, files, element, destination)
                    .await
                {
                    warn!(element = %element.name, "Skipping element: {}", e);
                    skipped.push(Skip::new(
                        SkipScope::Element(element.name.clone()),
                        e.to_string(),
                    ));
                }
            }
        }

        let payload = if state.payload.is_new() {
            self.hooks.new_record_payload(state.payload, item)
        } else {
            self.hooks.updated_record_payload(state.payload, item)
        };

        MappingResult {
            payload,
            attachments: state.attachments,
            skipped,
        }
    }

    async fn map_element(
        &self,
        state: &mut MapState,
        item: &Item,
        files: &ItemFiles,
        element: &Element,
        destination: Destination,
    ) -> Result<(), FieldError> {
        let element_files = files.get(&element.name).cloned().unwrap_or_default();
        let value = element_value(element, &element_files);

        match destination {
            Destination::Native(field) => self.map_native(state, &field, &value),
            Destination::Taxonomy(taxonomy) => {
                self.map_taxonomy(state, item, element, &taxonomy, &value)
                    .await
            }
            Destination::Meta(key) => {
                let value = self.hooks.sanitize_meta_value(value, element, item);
                self.write_meta(&mut state.payload, &key, value);

                if element.kind == ElementType::Files {
                    let destination = MediaDestination::parse(&key);
                    self.collect_media(state, item, element, element_files, destination);
                }
                Ok(())
            }
            Destination::Media(media_destination) => {
                self.collect_media(state, item, element, element_files, media_destination);
                Ok(())
            }
        }
    }

    fn map_native(&self, state: &mut MapState, field: &str, value: &Value) -> Result<(), FieldError> {
        let text = value_text(value);
        let ctx = FieldContext {
            record_id: state.payload.id,
            record_type: state.payload.field(fields::TYPE),
        };
        let sanitized = self.sanitizer.sanitize(field, &text, &ctx)?;
        self.write_field(state, field, sanitized);
        Ok(())
    }

    async fn map_taxonomy(
        &self,
        state: &mut MapState,
        item: &Item,
        element: &Element,
        taxonomy: &str,
        value: &Value,
    ) -> Result<(), FieldError> {
        let terms = self.terms.resolve(taxonomy, element.kind, value).await?;
        let terms: Vec<TermRef> = self
            .hooks
            .filter_terms(terms, element, item)
            .into_iter()
            .filter(is_meaningful)
            .collect();

        if terms.is_empty() {
            return Ok(());
        }

        if taxonomy == self.settings.category_taxonomy {
            state.payload.categories = terms;
        } else {
            state.payload.tax_input.insert(taxonomy.to_string(), terms);
        }
        Ok(())
    }

    fn collect_media(
        &self,
        state: &mut MapState,
        item: &Item,
        element: &Element,
        files: Vec<MediaFile>,
        destination: MediaDestination,
    ) {
        let files = self.hooks.sanitize_media_value(files, element, item);
        let media: Vec<MediaReference> = files
            .into_iter()
            .enumerate()
            .map(|(index, file)| MediaReference {
                file,
                position: index + 1,
            })
            .collect();

        if destination.is_inline() {
            let field = match destination {
                MediaDestination::ExcerptInline => fields::EXCERPT,
                _ => fields::CONTENT,
            };
            for reference in &media {
                self.write_field(state, field, reference.token());
            }
        }

        state.attachments.push(AttachmentGroup {
            element: element.name.clone(),
            destination,
            media,
        });
    }

    /// Write a native field; append fields concatenate after their first write
    fn write_field(&self, state: &mut MapState, field: &str, value: String) {
        if self.settings.can_append(field) && !state.unwritten.remove(field) {
            state
                .payload
                .fields
                .entry(field.to_string())
                .or_default()
                .push_str(&value);
        } else {
            state.payload.set_field(field, value);
        }
    }

    fn write_meta(&self, payload: &mut RecordPayload, key: &str, value: Value) {
        if self.settings.can_append(key) {
            if let (Some(Value::String(existing)), Value::String(addition)) =
                (payload.meta_input.get_mut(key), &value)
            {
                existing.push_str(addition);
                return;
            }
        }
        payload.meta_input.insert(key.to_string(), value);
    }
}

/// Author, status and type from the mapping, before any element is mapped
fn apply_defaults(payload: &mut RecordPayload, item: &Item, mapping: &Mapping) {
    if let Some(author) = &mapping.defaults.author {
        payload.set_field(fields::AUTHOR, author.as_str());
    }

    let status = mapping
        .local_status_for(item)
        .or(mapping.defaults.status.as_deref());
    if let Some(status) = status {
        payload.set_field(fields::STATUS, status);
    }

    payload.set_field(fields::TYPE, mapping.record_type.as_str());
}

/// Value an element contributes, by element type
pub fn element_value(element: &Element, files: &[MediaFile]) -> Value {
    match element.kind {
        ElementType::Section => element
            .subtitle
            .clone()
            .map(Value::String)
            .unwrap_or(Value::Null),
        ElementType::ChoiceRadio => element
            .options
            .iter()
            .find(|option| option.selected)
            .map(|option| Value::String(option.label.clone()))
            .unwrap_or_else(|| Value::String(String::new())),
        ElementType::ChoiceCheckbox => Value::Array(
            element
                .options
                .iter()
                .filter(|option| option.selected)
                .map(|option| Value::String(option.label.clone()))
                .collect(),
        ),
        ElementType::Files => serde_json::to_value(files).unwrap_or_default(),
        ElementType::Text if element.plain_text => match &element.value {
            Value::String(text) => Value::String(sanitize_text(text)),
            other => other.clone(),
        },
        ElementType::Text | ElementType::Other => element.value.clone(),
    }
}

/// Text form of a value; lists are joined with `", "`
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => text.clone(),
        Value::Array(values) => values
            .iter()
            .map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => value.to_string(),
    }
}
