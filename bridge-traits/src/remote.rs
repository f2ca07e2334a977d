//! Remote Content API Abstraction
//!
//! Types describing content items as the remote content-management API
//! returns them, plus the trait the core uses to fetch items, list their
//! files and move them between workflow statuses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Identifier of a remote content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a remote media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(pub u64);

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timestamp as sent by the remote API.
///
/// Depending on the endpoint the API either sends a bare string or an object
/// carrying the date string and its timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteTimestamp {
    Plain(String),
    Dated {
        date: String,
        #[serde(default)]
        timezone: Option<String>,
    },
}

impl RemoteTimestamp {
    /// The raw date string
    pub fn as_str(&self) -> &str {
        match self {
            RemoteTimestamp::Plain(date) => date,
            RemoteTimestamp::Dated { date, .. } => date,
        }
    }
}

impl From<&str> for RemoteTimestamp {
    fn from(value: &str) -> Self {
        RemoteTimestamp::Plain(value.to_string())
    }
}

/// Workflow status of an item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStatus {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Remote content item snapshot, fetched once per pull
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub created_at: Option<RemoteTimestamp>,
    #[serde(default)]
    pub updated_at: Option<RemoteTimestamp>,
    /// Ordered tabs of structured fields
    #[serde(default)]
    pub config: Vec<Tab>,
}

/// A tab groups an ordered list of elements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// Element type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Text,
    Section,
    ChoiceRadio,
    ChoiceCheckbox,
    Files,
    #[serde(other)]
    Other,
}

/// Option of a choice element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    #[serde(default)]
    pub name: String,
    pub label: String,
    #[serde(default)]
    pub selected: bool,
}

/// A single structured field of an item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: ElementType,
    /// Scalar, list or object; files are delivered separately
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub plain_text: bool,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
}

/// Media file attached to an item field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaFile {
    pub id: MediaId,
    #[serde(default)]
    pub user_id: u64,
    pub item_id: ItemId,
    /// Name of the owning element
    pub field: String,
    #[serde(rename = "type", default)]
    pub media_type: String,
    pub url: String,
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: Option<RemoteTimestamp>,
    #[serde(default)]
    pub updated_at: Option<RemoteTimestamp>,
}

/// Remote content API used by the pull pipeline
///
/// Authentication and transport are the implementor's concern.
#[async_trait]
pub trait RemoteItemApi: Send + Sync {
    /// Fetch a full item snapshot
    async fn get_item(&self, id: ItemId) -> Result<Item>;

    /// List every file attached to the item (uncached)
    async fn get_item_files(&self, id: ItemId) -> Result<Vec<MediaFile>>;

    /// Move the item to another workflow status
    async fn set_item_status(&self, id: ItemId, status_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_deserializes_from_api_json() {
        let json = r#"{
            "id": 42,
            "name": "Launch post",
            "status": { "id": "7", "name": "Ready" },
            "created_at": { "date": "2024-01-02 10:00:00.000000", "timezone": "UTC" },
            "updated_at": "2024-01-03 11:00:00",
            "config": [{
                "name": "tab1",
                "label": "Content",
                "elements": [
                    { "name": "el1", "label": "Body", "type": "text", "value": "<p>Hi</p>" },
                    { "name": "el2", "label": "Tags", "type": "choice_checkbox",
                      "options": [{ "label": "A", "selected": true }, { "label": "B" }] },
                    { "name": "el3", "label": "Widget", "type": "guidelines" }
                ]
            }]
        }"#;

        let item: Item = serde_json::from_str(json).unwrap();
        assert_eq!(item.id, ItemId(42));
        assert_eq!(
            item.created_at.as_ref().map(|t| t.as_str()),
            Some("2024-01-02 10:00:00.000000")
        );
        assert_eq!(item.updated_at.as_ref().map(|t| t.as_str()), Some("2024-01-03 11:00:00"));
        let elements = &item.config[0].elements;
        assert_eq!(elements[0].kind, ElementType::Text);
        assert_eq!(elements[1].kind, ElementType::ChoiceCheckbox);
        assert!(elements[1].options[0].selected);
        assert!(!elements[1].options[1].selected);
        assert_eq!(elements[2].kind, ElementType::Other);
        assert!(elements[2].value.is_null());
    }

    #[test]
    fn test_media_file_deserializes() {
        let json = r#"{
            "id": 9, "user_id": 3, "item_id": 42, "field": "el4", "type": "image",
            "url": "https://cdn.example.com/a.png?x=1", "filename": "a.png", "size": 1024,
            "updated_at": "2024-01-03 11:00:00"
        }"#;

        let file: MediaFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.id, MediaId(9));
        assert_eq!(file.media_type, "image");
        assert!(file.created_at.is_none());
    }
}
