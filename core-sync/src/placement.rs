//! Attachment Placement Engine
//!
//! Runs after the record has been persisted. Every collected media
//! reference is sideloaded through the [`MediaResolver`] and then placed:
//!
//! - `featured`: becomes the record's primary visual (last one wins)
//! - `content-inline` / `excerpt-inline`: its token (or the `[media-N]`
//!   shortcodes at its position) is replaced by rendered image markup
//! - `gallery`: collected into one gallery block rendered at the last
//!   gallery token
//! - anything else: the asset id is listed under that metadata key
//!
//! The result is a [`SubstitutionMap`] applied to the payload by the
//! orchestrator.

use bridge_traits::{
    AssetStorage, ImageAttributes, ItemMeta, MappingId, MediaId, RecordId, RecordPayload,
    RecordStore,
};
use core_runtime::config::CoreConfig;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::hooks::PullHooks;
use crate::mapper::{AttachmentGroup, MediaReference};
use crate::mapping::MediaDestination;
use crate::media_resolver::MediaResolver;
use crate::outcome::{Skip, SkipScope, StepOutcome};
use crate::pull::PullSettings;
use crate::sanitizer::fields;

/// Placeholder for a media file inside a text field
pub fn media_token(id: MediaId) -> String {
    format!("#_gc_media_id_{}#", id)
}

/// Text field receiving inline media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    Content,
    Excerpt,
}

impl TextField {
    pub fn name(&self) -> &'static str {
        match self {
            TextField::Content => fields::CONTENT,
            TextField::Excerpt => fields::EXCERPT,
        }
    }

    /// Field holding the placeholder token of a media destination
    pub fn for_destination(destination: &MediaDestination) -> Option<TextField> {
        match destination {
            MediaDestination::ContentInline | MediaDestination::Gallery => Some(TextField::Content),
            MediaDestination::ExcerptInline => Some(TextField::Excerpt),
            MediaDestination::Featured | MediaDestination::MetaKey(_) => None,
        }
    }
}

/// Token replacements per text field, plus asset ids per metadata key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionMap {
    pub content: BTreeMap<String, String>,
    pub excerpt: BTreeMap<String, String>,
    pub meta: BTreeMap<String, Vec<RecordId>>,
}

impl SubstitutionMap {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.excerpt.is_empty() && self.meta.is_empty()
    }

    pub fn insert(&mut self, field: TextField, token: impl Into<String>, value: impl Into<String>) {
        let table = match field {
            TextField::Content => &mut self.content,
            TextField::Excerpt => &mut self.excerpt,
        };
        table.insert(token.into(), value.into());
    }

    /// Apply replacements to the payload's text fields.
    ///
    /// When media was placed under metadata keys the payload's metadata
    /// input is replaced by those keys only.
    pub fn apply(&self, payload: &mut RecordPayload) {
        for (field, table) in [(TextField::Content, &self.content), (TextField::Excerpt, &self.excerpt)] {
            if table.is_empty() {
                continue;
            }
            if let Some(text) = payload.fields.get_mut(field.name()) {
                *text = replace_tokens(text, table);
            }
        }

        if !self.meta.is_empty() {
            payload.meta_input = self
                .meta
                .iter()
                .map(|(key, ids)| {
                    let ids = ids.iter().map(|id| Value::from(id.0)).collect();
                    (key.clone(), Value::Array(ids))
                })
                .collect();
        }
    }
}

/// Replace every token in one left-to-right pass.
///
/// At each position the longest matching token wins and replaced text is
/// never scanned again.
pub fn replace_tokens(text: &str, replacements: &BTreeMap<String, String>) -> String {
    let mut tokens: Vec<(&str, &str)> = replacements
        .iter()
        .filter(|(token, _)| !token.is_empty())
        .map(|(token, value)| (token.as_str(), value.as_str()))
        .collect();
    if tokens.is_empty() {
        return text.to_string();
    }
    tokens.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        match tokens.iter().find(|(token, _)| rest.starts_with(token)) {
            Some((token, value)) => {
                output.push_str(value);
                rest = &rest[token.len()..];
            }
            None => {
                output.push(ch);
                rest = &rest[ch.len_utf8()..];
            }
        }
    }
    output
}

fn shortcode_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\[media-(\d+)([^\]]*)\]").expect("media shortcode pattern is a valid regex")
    })
}

fn attribute_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"([\w-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"']+))"#)
            .expect("shortcode attribute pattern is a valid regex")
    })
}

/// `[media-N ...]` shortcodes in `text` for `position`, with their attributes
pub fn media_shortcodes(text: &str, position: usize) -> Vec<(String, BTreeMap<String, String>)> {
    let mut found: Vec<(String, BTreeMap<String, String>)> = Vec::new();

    for caps in shortcode_pattern().captures_iter(text) {
        if caps[1].parse::<usize>().ok() != Some(position) {
            continue;
        }
        let raw = caps[0].to_string();
        if found.iter().any(|(existing, _)| *existing == raw) {
            continue;
        }

        let attributes = attribute_pattern()
            .captures_iter(&caps[2])
            .map(|attr| {
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .or_else(|| attr.get(4))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                (attr[1].to_ascii_lowercase(), value)
            })
            .collect();
        found.push((raw, attributes));
    }

    found
}

/// Substitutions plus the attachments that could not be placed
#[derive(Debug, Clone, Default)]
pub struct Placement {
    pub replacements: SubstitutionMap,
    pub placed: usize,
    pub skipped: Vec<Skip>,
}

pub struct PlacementEngine {
    resolver: MediaResolver,
    record_store: Arc<dyn RecordStore>,
    assets: Arc<dyn AssetStorage>,
    hooks: Arc<dyn PullHooks>,
    settings: PullSettings,
}

impl PlacementEngine {
    pub fn new(config: &CoreConfig, hooks: Arc<dyn PullHooks>, settings: PullSettings) -> Self {
        Self {
            resolver: MediaResolver::new(config, Arc::clone(&hooks)),
            record_store: Arc::clone(&config.record_store),
            assets: Arc::clone(&config.asset_storage),
            hooks,
            settings,
        }
    }

    /// Sideload and place every attachment of a persisted record
    pub async fn place(
        &self,
        attachments: &[AttachmentGroup],
        payload: &RecordPayload,
        record_id: RecordId,
        mapping_id: MappingId,
    ) -> Placement {
        let mut placement = Placement::default();
        let mut featured: Option<RecordId> = None;
        let mut gallery_ids: Vec<RecordId> = Vec::new();
        let mut gallery_token: Option<String> = None;

        for group in attachments {
            for reference in &group.media {
                let media_id = reference.file.id;
                let asset_id = match self.resolver.resolve(&reference.file, record_id).await {
                    Ok(resolution) => resolution.asset_id(),
                    Err(e) => {
                        warn!(media_id = %media_id, "Skipping attachment: {}", e);
                        if let Some(field) = TextField::for_destination(&group.destination) {
                            placement.replacements.insert(field, reference.token(), "");
                        }
                        placement
                            .skipped
                            .push(Skip::new(SkipScope::Attachment(media_id), e.to_string()));
                        continue;
                    }
                };

                let token = reference.token();
                match &group.destination {
                    MediaDestination::Featured => featured = Some(asset_id),
                    MediaDestination::ContentInline => {
                        let field = TextField::Content;
                        self.place_inline(&mut placement.replacements, field, reference, asset_id, payload)
                            .await
                    }
                    MediaDestination::ExcerptInline => {
                        let field = TextField::Excerpt;
                        self.place_inline(&mut placement.replacements, field, reference, asset_id, payload)
                            .await
                    }
                    MediaDestination::Gallery => {
                        gallery_ids.push(asset_id);
                        placement.replacements.insert(TextField::Content, token.clone(), "");
                        gallery_token = Some(token);
                    }
                    MediaDestination::MetaKey(key) => {
                        placement
                            .replacements
                            .meta
                            .entry(key.clone())
                            .or_default()
                            .push(asset_id);
                    }
                }

                if let StepOutcome::Skipped(reason) =
                    self.record_linkage(reference, asset_id, mapping_id).await
                {
                    warn!(media_id = %media_id, asset_id = %asset_id, "{}", reason);
                    placement
                        .skipped
                        .push(Skip::new(SkipScope::Attachment(media_id), reason));
                }
                placement.placed += 1;
            }
        }

        if let Some(asset_id) = featured {
            if let Err(e) = self.record_store.set_primary_visual(record_id, asset_id).await {
                warn!(record_id = %record_id, asset_id = %asset_id, "Failed to set primary visual: {}", e);
                placement
                    .skipped
                    .push(Skip::new(SkipScope::PrimaryVisual, e.to_string()));
            }
        }

        if let Some(token) = gallery_token {
            let ids: Vec<String> = gallery_ids.iter().map(ToString::to_string).collect();
            let markup = format!(r#"[gallery link="file" size="full" ids="{}"]"#, ids.join(","));
            let markup = self.hooks.gallery_markup(markup, &gallery_ids, payload);
            placement.replacements.insert(TextField::Content, token, markup);
        }

        placement.replacements =
            self.hooks
                .media_replacements(placement.replacements, attachments, payload);

        debug!(
            placed = placement.placed,
            skipped = placement.skipped.len(),
            "Attachment placement finished"
        );
        placement
    }

    async fn place_inline(
        &self,
        replacements: &mut SubstitutionMap,
        field: TextField,
        reference: &MediaReference,
        asset_id: RecordId,
        payload: &RecordPayload,
    ) {
        let default_image = self.render(asset_id, self.default_attributes(reference.file.id)).await;
        let text = payload.field(field.name()).unwrap_or_default();
        let shortcodes = media_shortcodes(text, reference.position);

        if shortcodes.is_empty() {
            let image = self
                .hooks
                .content_image(default_image, reference, asset_id, payload);
            replacements.insert(field, reference.token(), image);
            return;
        }

        for (raw, attributes) in shortcodes {
            let requested = if attributes.is_empty() {
                None
            } else {
                self.requested_media(&attributes, reference.file.id, asset_id)
                    .await
            };
            let image = requested.unwrap_or_else(|| default_image.clone());
            let image = self.hooks.content_image(image, reference, asset_id, payload);
            replacements.insert(field, raw, image);
        }
        replacements.insert(field, reference.token(), "");
    }

    fn default_attributes(&self, media_id: MediaId) -> ImageAttributes {
        let mut extra = BTreeMap::new();
        extra.insert("data-gcid".to_string(), media_id.to_string());
        ImageAttributes {
            size: "full".to_string(),
            class: self.settings.inline_image_class.clone(),
            alt: None,
            extra,
        }
    }

    async fn render(&self, asset_id: RecordId, attributes: ImageAttributes) -> String {
        match self.assets.render_image(asset_id, &attributes).await {
            Ok(markup) => markup,
            Err(e) => {
                warn!(asset_id = %asset_id, "Failed to render image: {}", e);
                String::new()
            }
        }
    }

    /// Image (optionally linked) as requested by shortcode attributes
    async fn requested_media(
        &self,
        attributes: &BTreeMap<String, String>,
        media_id: MediaId,
        asset_id: RecordId,
    ) -> Option<String> {
        let mut image = self.default_attributes(media_id);
        if let Some(size) = attributes.get("size").filter(|s| !s.is_empty()) {
            image.size = size.clone();
        }
        if let Some(align) = attributes.get("align").filter(|a| !a.is_empty()) {
            image.class = format!("{} align{}", image.class, align);
        }
        if let Some(class) = attributes.get("class").filter(|c| !c.is_empty()) {
            image.class = format!("{} {}", image.class, class);
        }
        image.alt = attributes.get("alt").cloned();

        let markup = self.assets.render_image(asset_id, &image).await.ok()?;
        if markup.is_empty() {
            return None;
        }

        let link = match attributes.get("linkto").map(String::as_str) {
            Some("file") => self.assets.asset_url(asset_id).await.ok().flatten(),
            Some("attachment") => self.assets.attachment_page_url(asset_id).await.ok().flatten(),
            _ => None,
        };

        Some(match link {
            Some(href) => format!(r#"<a href="{}">{}</a>"#, href, markup),
            None => markup,
        })
    }

    /// Bind a sideloaded asset to its remote media file and mapping
    async fn record_linkage(
        &self,
        reference: &MediaReference,
        asset_id: RecordId,
        mapping_id: MappingId,
    ) -> StepOutcome<()> {
        let media = &reference.file;
        let mut meta = ItemMeta::new();
        meta.insert("user_id".to_string(), media.user_id.to_string());
        meta.insert("item_id".to_string(), media.item_id.to_string());
        meta.insert("field".to_string(), media.field.clone());
        meta.insert("type".to_string(), media.media_type.clone());
        meta.insert("url".to_string(), media.url.clone());
        meta.insert("filename".to_string(), media.filename.clone());
        meta.insert("size".to_string(), media.size.to_string());
        if let Some(created) = &media.created_at {
            meta.insert("created_at".to_string(), created.as_str().to_string());
        }
        if let Some(updated) = &media.updated_at {
            meta.insert("updated_at".to_string(), updated.as_str().to_string());
        }

        let result: bridge_traits::error::Result<()> = async {
            self.record_store.bind_media_id(asset_id, media.id).await?;
            self.record_store.bind_mapping_id(asset_id, mapping_id).await?;
            self.record_store.set_record_item_metadata(asset_id, &meta).await
        }
        .await;

        match result {
            Ok(()) => StepOutcome::Applied(()),
            Err(e) => StepOutcome::Skipped(format!("Failed to record media linkage: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_media_token_format() {
        assert_eq!(media_token(MediaId(7)), "#_gc_media_id_7#");
    }

    #[test]
    fn test_replace_tokens_single_pass() {
        let replacements = table(&[("#a#", "#b#"), ("#b#", "B")]);
        assert_eq!(replace_tokens("x #a# y #b#", &replacements), "x #b# y B");
    }

    #[test]
    fn test_replace_tokens_longest_match_first() {
        let replacements = table(&[("#_gc_media_id_1#", "one"), ("#_gc_media_id_12#", "twelve")]);
        assert_eq!(
            replace_tokens("#_gc_media_id_12##_gc_media_id_1#", &replacements),
            "twelveone"
        );
    }

    #[test]
    fn test_replace_tokens_keeps_multibyte_text() {
        let replacements = table(&[("#t#", "ü")]);
        assert_eq!(replace_tokens("naïve #t# café", &replacements), "naïve ü café");
    }

    #[test]
    fn test_media_shortcodes_for_position() {
        let text = r#"<p>[media-1 size="medium" align='left' linkto=file]</p>[media-2][media-1]"#;

        let first = media_shortcodes(text, 1);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].0, r#"[media-1 size="medium" align='left' linkto=file]"#);
        assert_eq!(first[0].1.get("size").map(String::as_str), Some("medium"));
        assert_eq!(first[0].1.get("align").map(String::as_str), Some("left"));
        assert_eq!(first[0].1.get("linkto").map(String::as_str), Some("file"));
        assert_eq!(first[1].0, "[media-1]");
        assert!(first[1].1.is_empty());

        let second = media_shortcodes(text, 2);
        assert_eq!(second.len(), 1);
        assert!(media_shortcodes(text, 3).is_empty());
    }

    #[test]
    fn test_text_field_for_destination() {
        assert_eq!(
            TextField::for_destination(&MediaDestination::Gallery),
            Some(TextField::Content)
        );
        assert_eq!(
            TextField::for_destination(&MediaDestination::ExcerptInline),
            Some(TextField::Excerpt)
        );
        assert_eq!(TextField::for_destination(&MediaDestination::Featured), None);
    }

    #[test]
    fn test_substitution_map_apply() {
        let mut map = SubstitutionMap::default();
        map.insert(TextField::Content, "#_gc_media_id_1#", "<img>");
        map.insert(TextField::Excerpt, "#_gc_media_id_2#", "");
        map.meta.insert("hero_ids".to_string(), vec![RecordId(5), RecordId(6)]);

        let mut payload = RecordPayload::fresh();
        payload.set_field("content", "<p>a</p>#_gc_media_id_1#");
        payload.set_field("excerpt", "sum #_gc_media_id_2#");
        payload
            .meta_input
            .insert("subtitle".to_string(), Value::String("x".to_string()));

        map.apply(&mut payload);

        assert_eq!(payload.field("content"), Some("<p>a</p><img>"));
        assert_eq!(payload.field("excerpt"), Some("sum "));
        assert_eq!(payload.meta_input.len(), 1);
        assert_eq!(payload.meta_input["hero_ids"], serde_json::json!([5, 6]));
    }
}
