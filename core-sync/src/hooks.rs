//! Extension hooks
//!
//! Hosts customize a pull by implementing [`PullHooks`]. Every method has an
//! identity default, so an implementation only overrides what it needs.

use bridge_traits::{Asset, Element, Item, MediaFile, Record, RecordId, RecordPayload, TermRef};

use crate::mapper::{AttachmentGroup, MediaReference};
use crate::placement::SubstitutionMap;

pub trait PullHooks: Send + Sync {
    /// Whether a pull is skipped when the host already has the latest changes
    fn only_update_if_newer(&self, default: bool, _item: &Item, _record: &Record) -> bool {
        default
    }

    /// Final transform of a payload that will create a record
    fn new_record_payload(&self, payload: RecordPayload, _item: &Item) -> RecordPayload {
        payload
    }

    /// Final transform of a payload that will update a record
    fn updated_record_payload(&self, payload: RecordPayload, _item: &Item) -> RecordPayload {
        payload
    }

    fn filter_terms(&self, terms: Vec<TermRef>, _element: &Element, _item: &Item) -> Vec<TermRef> {
        terms
    }

    fn sanitize_meta_value(
        &self,
        value: serde_json::Value,
        _element: &Element,
        _item: &Item,
    ) -> serde_json::Value {
        value
    }

    fn sanitize_media_value(
        &self,
        files: Vec<MediaFile>,
        _element: &Element,
        _item: &Item,
    ) -> Vec<MediaFile> {
        files
    }

    /// Attachments about to be placed on a persisted record
    fn media_objects(
        &self,
        attachments: Vec<AttachmentGroup>,
        _payload: &RecordPayload,
    ) -> Vec<AttachmentGroup> {
        attachments
    }

    /// Markup replacing an inline media token or shortcode
    fn content_image(
        &self,
        markup: String,
        _media: &MediaReference,
        _asset_id: RecordId,
        _payload: &RecordPayload,
    ) -> String {
        markup
    }

    fn gallery_markup(
        &self,
        markup: String,
        _asset_ids: &[RecordId],
        _payload: &RecordPayload,
    ) -> String {
        markup
    }

    fn media_replacements(
        &self,
        replacements: SubstitutionMap,
        _attachments: &[AttachmentGroup],
        _payload: &RecordPayload,
    ) -> SubstitutionMap {
        replacements
    }

    /// Whether a re-downloaded asset gets its title/description regenerated
    fn replace_attachment_data_on_update(&self, default: bool, _asset: &Asset) -> bool {
        default
    }
}

/// Identity hooks
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl PullHooks for DefaultHooks {}
