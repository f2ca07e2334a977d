//! Host Content Store Abstraction
//!
//! Records are the host's persisted content entities. Managed media assets
//! are records too, so both share [`RecordId`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::Result;
use crate::remote::{ItemId, MediaId};

/// Identifier of a host record (content record or media asset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a mapping configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingId(pub u64);

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a taxonomy term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub u64);

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A term either by canonical id or by label
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TermRef {
    Id(TermId),
    Name(String),
}

/// Item linkage metadata stored on a record (`created_at`, `updated_at`, ...)
pub type ItemMeta = BTreeMap<String, String>;

/// A persisted host record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub record_type: String,
    /// Current native field values keyed by field name
    pub fields: BTreeMap<String, String>,
}

/// A managed media asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: RecordId,
    pub parent: Option<RecordId>,
    /// Creation time as `YYYY-MM-DD HH:MM:SS`; hosts may report a zero year
    pub created_at: Option<String>,
    pub title: String,
    pub description: String,
}

/// Record payload handed to the store on create/update
///
/// A payload without `id` creates a new record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub id: Option<RecordId>,
    pub fields: BTreeMap<String, String>,
    /// Terms of the built-in category taxonomy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<TermRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tax_input: BTreeMap<String, Vec<TermRef>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta_input: BTreeMap<String, serde_json::Value>,
}

impl RecordPayload {
    /// Payload for a record that does not exist yet
    pub fn fresh() -> Self {
        Self::default()
    }

    /// Payload seeded from an existing record's current values
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: Some(record.id),
            fields: record.fields.clone(),
            ..Self::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

/// Options for persisting a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    /// Whether the host should create a revision on update
    pub create_revision: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            create_revision: true,
        }
    }
}

/// Host record storage used by the pull pipeline
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Find the record bound to a remote item
    async fn find_record_by_item_id(&self, item_id: ItemId) -> Result<Option<Record>>;

    /// Create (payload without id) or update a record
    async fn create_or_update_record(
        &self,
        payload: &RecordPayload,
        options: SaveOptions,
    ) -> Result<RecordId>;

    /// Read the item linkage metadata of a record or asset
    async fn get_record_item_metadata(&self, id: RecordId) -> Result<ItemMeta>;

    /// Replace the item linkage metadata of a record or asset
    async fn set_record_item_metadata(&self, id: RecordId, meta: &ItemMeta) -> Result<()>;

    async fn bind_item_id(&self, id: RecordId, item_id: ItemId) -> Result<()>;

    async fn bind_mapping_id(&self, id: RecordId, mapping_id: MappingId) -> Result<()>;

    /// Set the record's primary visual (featured image)
    async fn set_primary_visual(&self, id: RecordId, asset_id: RecordId) -> Result<()>;

    /// Find the managed asset previously sideloaded for a remote media file
    async fn find_asset_by_media_id(&self, media_id: MediaId) -> Result<Option<Asset>>;

    async fn bind_media_id(&self, asset_id: RecordId, media_id: MediaId) -> Result<()>;

    /// Generic host sanitization for a native field value
    fn sanitize_field(&self, _field: &str, value: &str, _record_id: Option<RecordId>) -> String {
        value.to_string()
    }

    /// Whether the record type supports the format field
    fn supports_formats(&self, _record_type: &str) -> bool {
        true
    }
}

/// Host taxonomy storage
#[async_trait]
pub trait TaxonomyStore: Send + Sync {
    async fn is_hierarchical(&self, taxonomy: &str) -> Result<bool>;

    /// Look up a term by id or label
    async fn term_exists(&self, taxonomy: &str, term: &TermRef) -> Result<Option<TermId>>;

    /// Create a new term with the given label
    async fn insert_term(&self, taxonomy: &str, label: &str) -> Result<TermId>;
}
