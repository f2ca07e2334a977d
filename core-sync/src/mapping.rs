//! Mapping configuration
//!
//! A mapping binds the elements of remote items to destinations on a host
//! record type. Hosts store it as JSON:
//!
//! ```json
//! {
//!   "id": 12,
//!   "record_type": "post",
//!   "defaults": { "author": "1", "status": "draft" },
//!   "status_map": { "931": { "local": "publish", "after": "932" } },
//!   "destinations": {
//!     "el1": { "type": "native", "value": "title" },
//!     "el2": { "type": "taxonomy", "value": "category" },
//!     "el3": { "type": "media", "value": "featured_image" }
//!   }
//! }
//! ```

use bridge_traits::{Item, MappingId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SyncError};

/// Host record configuration for one sync target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: MappingId,
    /// Host record type written to the `type` field
    pub record_type: String,
    #[serde(default)]
    pub defaults: MappingDefaults,
    /// Remote status id to local status and follow-up remote status
    #[serde(default)]
    pub status_map: BTreeMap<String, StatusTransition>,
    /// Element name to destination
    #[serde(default)]
    pub destinations: BTreeMap<String, RawDestination>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingDefaults {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// Local status for records pulled while the item has this status
    #[serde(default)]
    pub local: Option<String>,
    /// Remote status the item moves to once pulled
    #[serde(default)]
    pub after: Option<String>,
}

/// Destination as stored; either part may be missing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDestination {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// A resolved sink for an element value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// Native record field
    Native(String),
    /// Taxonomy name
    Taxonomy(String),
    /// Metadata key
    Meta(String),
    Media(MediaDestination),
}

/// Where sideloaded media ends up
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaDestination {
    Featured,
    ContentInline,
    ExcerptInline,
    Gallery,
    /// Any other name is a metadata key receiving asset ids
    MetaKey(String),
}

impl MediaDestination {
    pub fn parse(value: &str) -> Self {
        match value {
            "featured_image" => MediaDestination::Featured,
            "content_image" => MediaDestination::ContentInline,
            "excerpt_image" => MediaDestination::ExcerptInline,
            "gallery" => MediaDestination::Gallery,
            other => MediaDestination::MetaKey(other.to_string()),
        }
    }

    /// Whether references get a placeholder token in a text field
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            MediaDestination::ContentInline
                | MediaDestination::ExcerptInline
                | MediaDestination::Gallery
        )
    }
}

impl RawDestination {
    /// Resolve into a typed destination; malformed entries yield `None`
    pub fn resolve(&self) -> Option<Destination> {
        let kind = self.kind.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        let value = self.value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;

        match kind {
            "native" => Some(Destination::Native(value.to_string())),
            "taxonomy" => Some(Destination::Taxonomy(value.to_string())),
            "meta" => Some(Destination::Meta(value.to_string())),
            "media" => Some(Destination::Media(MediaDestination::parse(value))),
            _ => None,
        }
    }
}

impl Mapping {
    /// Fails when the mapping cannot drive a pull
    pub fn validate(&self) -> Result<()> {
        if self.record_type.trim().is_empty() {
            return Err(self.config_error("no record type"));
        }

        if self.destinations.is_empty() {
            return Err(self.config_error("no destinations"));
        }

        if self.destinations.values().all(|raw| raw.resolve().is_none()) {
            return Err(self.config_error("no resolvable destinations"));
        }

        Ok(())
    }

    fn config_error(&self, reason: &str) -> SyncError {
        SyncError::Config {
            mapping_id: self.id,
            reason: reason.to_string(),
        }
    }

    pub fn destination(&self, element_name: &str) -> Option<Destination> {
        self.destinations.get(element_name)?.resolve()
    }

    fn transition(&self, item: &Item) -> Option<&StatusTransition> {
        let status = item.status.as_ref()?;
        self.status_map.get(&status.id)
    }

    /// Local status override for the item's current remote status
    pub fn local_status_for(&self, item: &Item) -> Option<&str> {
        self.transition(item)?
            .local
            .as_deref()
            .filter(|status| !status.is_empty())
    }

    /// Remote status the item should move to after a pull
    pub fn next_remote_status(&self, item: &Item) -> Option<&str> {
        self.transition(item)?
            .after
            .as_deref()
            .filter(|status| !status.is_empty())
    }
}
