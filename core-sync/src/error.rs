use bridge_traits::{BridgeError, ItemId, MappingId, RecordId};
use thiserror::Error;

/// Pipeline-level failure of a pull
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Mapping {mapping_id} is not usable: {reason}")]
    Config { mapping_id: MappingId, reason: String },

    #[error("Failed to fetch item {item_id}: {message}")]
    Fetch { item_id: ItemId, message: String },

    #[error("Host store rejected item {item_id}: {message}")]
    Persist {
        item_id: ItemId,
        record_id: Option<RecordId>,
        code: Option<String>,
        message: String,
    },

    #[error("Host store error: {message}")]
    Store { message: String },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Media(#[from] MediaError),
}

impl From<BridgeError> for SyncError {
    fn from(err: BridgeError) -> Self {
        SyncError::Store {
            message: err.to_string(),
        }
    }
}

/// Failure to map a single element; the element is skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Cannot override record IDs")]
    ProtectedId,

    #[error("{field} field requires a numeric timestamp or date string")]
    InvalidDate { field: String },

    #[error("The {record_type} record type does not support formats")]
    UnsupportedFormat { record_type: String },

    #[error("Term resolution failed for taxonomy {taxonomy}: {message}")]
    Term { taxonomy: String, message: String },
}

/// Failure to sideload a single attachment; the attachment is skipped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Invalid image URL: {0}")]
    InvalidMediaUrl(String),

    #[error("Download of {url} failed: {message}")]
    Download { url: String, message: String },

    #[error("Media storage failed: {0}")]
    Storage(String),
}

impl From<BridgeError> for MediaError {
    fn from(err: BridgeError) -> Self {
        MediaError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_becomes_store_error() {
        let err: SyncError = BridgeError::OperationFailed("disk full".to_string()).into();
        assert!(matches!(err, SyncError::Store { ref message } if message.contains("disk full")));
    }

    #[test]
    fn test_persist_error_message() {
        let err = SyncError::Persist {
            item_id: ItemId(12),
            record_id: None,
            code: Some("invalid_type".to_string()),
            message: "Invalid record type".to_string(),
        };
        assert_eq!(err.to_string(), "Host store rejected item 12: Invalid record type");
    }

    #[test]
    fn test_field_error_is_transparent() {
        let err: SyncError = FieldError::ProtectedId.into();
        assert_eq!(err.to_string(), "Cannot override record IDs");
    }
}
