//! Media Download and Asset Storage Abstractions
//!
//! Sideloading is split in two collaborators: a [`MediaDownloader`] that
//! fetches a remote file into a temporary location, and an [`AssetStorage`]
//! that moves temporary files into the host's permanent media library.
//!
//! Downloads of large media may legitimately take tens of minutes;
//! implementations must not impose short timeouts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::store::RecordId;

/// A downloaded file waiting in temporary storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempFile {
    /// Location of the temporary file
    pub path: PathBuf,
    /// Sanitized file name the asset should be stored under
    pub name: String,
}

/// A file moved into permanent storage but not yet bound to an asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub url: String,
    pub mime_type: String,
}

/// Descriptive metadata embedded in an image (EXIF/IPTC)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub title: String,
    pub caption: String,
}

/// Attributes used when rendering an asset as inline markup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageAttributes {
    /// Named image size (`full`, `medium`, ...)
    pub size: String,
    pub class: String,
    pub alt: Option<String>,
    /// Extra `data-*`/custom attributes
    pub extra: BTreeMap<String, String>,
}

/// Replacement of an existing asset's file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetUpdate {
    pub id: RecordId,
    pub parent: Option<RecordId>,
    pub mime_type: String,
    pub file: PathBuf,
    /// `None` leaves the current title untouched
    pub title: Option<String>,
    /// `None` leaves the current description untouched
    pub description: Option<String>,
}

/// Temporary download collaborator
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// Download `url` into a temporary file named after `file_name`
    async fn download_to_temp(&self, url: &str, file_name: &str) -> Result<TempFile>;

    /// Remove a temporary file that will not be stored
    async fn discard(&self, file: &TempFile) -> Result<()>;
}

/// Permanent asset storage collaborator
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Validate and store a temp file as a new asset attached to `parent`
    async fn store_sideloaded(&self, file: &TempFile, parent: RecordId) -> Result<RecordId>;

    /// Public URL of an asset, if the asset has a stored file
    async fn asset_url(&self, id: RecordId) -> Result<Option<String>>;

    /// URL of the asset's attachment page
    async fn attachment_page_url(&self, id: RecordId) -> Result<Option<String>>;

    /// Move a temp file into the upload directory for `time` (`YYYY-MM-DD HH:MM:SS`)
    async fn store_file(&self, file: &TempFile, time: &str) -> Result<StoredFile>;

    /// Read embedded image metadata from a stored file
    async fn read_image_metadata(&self, path: &Path) -> Result<Option<ImageMetadata>>;

    /// Rebind an existing asset to a newly stored file
    async fn update_asset(&self, update: &AssetUpdate) -> Result<RecordId>;

    /// Regenerate derived metadata (sizes, dimensions) for an asset
    async fn regenerate_metadata(&self, id: RecordId, path: &Path) -> Result<()>;

    /// Render an asset as an inline image tag
    async fn render_image(&self, id: RecordId, attributes: &ImageAttributes) -> Result<String>;
}
