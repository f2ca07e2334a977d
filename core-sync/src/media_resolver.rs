//! Media Resolver
//!
//! Decides whether a remote media file needs sideloading (no local asset
//! yet), re-sideloading (remote file changed) or nothing at all, and runs the
//! sideload protocol against the downloader and asset storage collaborators.
//!
//! ## Sideload protocol
//!
//! New asset:
//! 1. Validate the file name carries a supported image extension
//! 2. Download into temporary storage
//! 3. Hand the temp file to permanent storage (temp file discarded on failure)
//! 4. Verify the stored asset exposes a URL
//!
//! Replacement of an existing asset:
//! 1. Download into temporary storage
//! 2. Move the file into the upload location of the asset's creation time
//! 3. Optionally regenerate title/description from embedded image metadata
//! 4. Rebind the asset to the new file and regenerate derived metadata

use bridge_traits::{
    Asset, AssetStorage, AssetUpdate, Clock, MediaDownloader, MediaFile, RecordId, RecordStore,
    TempFile,
};
use chrono::FixedOffset;
use core_runtime::config::CoreConfig;
use core_runtime::logging::strip_path;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use crate::error::MediaError;
use crate::hooks::PullHooks;
use crate::sanitizer::parse_timestamp;

/// What resolving a media file did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Created(RecordId),
    Replaced(RecordId),
    Unchanged(RecordId),
}

impl Resolution {
    pub fn asset_id(&self) -> RecordId {
        match self {
            Resolution::Created(id) | Resolution::Replaced(id) | Resolution::Unchanged(id) => *id,
        }
    }
}

pub struct MediaResolver {
    record_store: Arc<dyn RecordStore>,
    downloader: Arc<dyn MediaDownloader>,
    assets: Arc<dyn AssetStorage>,
    clock: Arc<dyn Clock>,
    hooks: Arc<dyn PullHooks>,
    replace_data_on_update: bool,
    local_offset: FixedOffset,
}

impl MediaResolver {
    pub fn new(config: &CoreConfig, hooks: Arc<dyn PullHooks>) -> Self {
        Self {
            record_store: Arc::clone(&config.record_store),
            downloader: Arc::clone(&config.media_downloader),
            assets: Arc::clone(&config.asset_storage),
            clock: Arc::clone(&config.clock),
            hooks,
            replace_data_on_update: config.features.replace_attachment_data_on_update,
            local_offset: config.local_offset(),
        }
    }

    /// Return the local asset for `media`, sideloading it when needed
    pub async fn resolve(
        &self,
        media: &MediaFile,
        parent: RecordId,
    ) -> Result<Resolution, MediaError> {
        let Some(asset) = self.record_store.find_asset_by_media_id(media.id).await? else {
            return self.sideload(media, parent).await.map(Resolution::Created);
        };

        let meta = self.record_store.get_record_item_metadata(asset.id).await?;
        if meta.is_empty() {
            return Ok(Resolution::Unchanged(asset.id));
        }

        let remote = media
            .updated_at
            .as_ref()
            .and_then(|ts| parse_timestamp(ts.as_str()));
        let stored = meta.get("updated_at").and_then(|ts| parse_timestamp(ts));

        let changed = match (remote, stored) {
            (Some(remote), Some(stored)) => remote > stored,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if !changed {
            debug!(media_id = %media.id, asset_id = %asset.id, "Media unchanged");
            return Ok(Resolution::Unchanged(asset.id));
        }

        self.resideload(media, &asset).await.map(Resolution::Replaced)
    }

    /// Download a new asset attached to `parent`
    pub async fn sideload(&self, media: &MediaFile, parent: RecordId) -> Result<RecordId, MediaError> {
        let temp = self.download(media).await?;

        let id = match self.assets.store_sideloaded(&temp, parent).await {
            Ok(id) => id,
            Err(e) => {
                self.discard(&temp).await;
                return Err(MediaError::Storage(e.to_string()));
            }
        };

        match self.assets.asset_url(id).await? {
            Some(url) if !url.is_empty() => {
                debug!(media_id = %media.id, asset_id = %id, "Sideloaded media");
                Ok(id)
            }
            _ => Err(MediaError::Storage(format!(
                "stored asset {} has no URL",
                id
            ))),
        }
    }

    /// Replace the file of an existing asset, keeping its id and parent
    pub async fn resideload(&self, media: &MediaFile, asset: &Asset) -> Result<RecordId, MediaError> {
        let time = self.upload_time(asset);
        let temp = self.download(media).await?;

        let stored = match self.assets.store_file(&temp, &time).await {
            Ok(stored) => stored,
            Err(e) => {
                self.discard(&temp).await;
                return Err(MediaError::Storage(e.to_string()));
            }
        };

        let replace_data = self
            .hooks
            .replace_attachment_data_on_update(self.replace_data_on_update, asset);
        let (title, description) = if replace_data {
            let (title, description) = self.regenerated_text(&stored.path).await;
            (Some(title), Some(description))
        } else {
            (None, None)
        };

        let update = AssetUpdate {
            id: asset.id,
            parent: asset.parent,
            mime_type: stored.mime_type.clone(),
            file: stored.path.clone(),
            title,
            description,
        };

        let id = match self.assets.update_asset(&update).await {
            Ok(id) => id,
            Err(e) => {
                self.discard(&temp).await;
                return Err(MediaError::Storage(e.to_string()));
            }
        };

        if let Err(e) = self.assets.regenerate_metadata(id, &stored.path).await {
            warn!(asset_id = %id, "Failed to regenerate asset metadata: {}", e);
        }

        debug!(media_id = %media.id, asset_id = %id, "Replaced media");
        Ok(id)
    }

    async fn download(&self, media: &MediaFile) -> Result<TempFile, MediaError> {
        let name = image_file_name(&media.filename)
            .ok_or_else(|| MediaError::InvalidMediaUrl(media.filename.clone()))?;
        if media.url.is_empty() {
            return Err(MediaError::InvalidMediaUrl(media.url.clone()));
        }

        self.downloader
            .download_to_temp(&media.url, &name)
            .await
            .map_err(|e| MediaError::Download {
                url: media.url.clone(),
                message: e.to_string(),
            })
    }

    async fn discard(&self, temp: &TempFile) {
        if let Err(e) = self.downloader.discard(temp).await {
            warn!(
                file = %strip_path(&temp.path.to_string_lossy()),
                "Failed to discard temp file: {}", e
            );
        }
    }

    /// The asset's creation time unless the host reports a zero year
    fn upload_time(&self, asset: &Asset) -> String {
        asset
            .created_at
            .as_deref()
            .filter(|created| {
                created
                    .get(..4)
                    .and_then(|year| year.parse::<u32>().ok())
                    .is_some_and(|year| year > 0)
            })
            .map(str::to_string)
            .unwrap_or_else(|| {
                self.clock
                    .now()
                    .with_timezone(&self.local_offset)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            })
    }

    /// Title and description for a replaced file
    async fn regenerated_text(&self, path: &Path) -> (String, String) {
        let mut title = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut description = String::new();

        match self.assets.read_image_metadata(path).await {
            Ok(Some(meta)) => {
                if !meta.title.trim().is_empty() && !is_numeric_slug(&meta.title) {
                    title = meta.title;
                }
                if !meta.caption.trim().is_empty() {
                    description = meta.caption;
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to read image metadata: {}", e),
        }

        (title, description)
    }
}

fn image_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)[^?]+\.(jpe?g|jpe|gif|png)\b").expect("image name pattern is a valid regex")
    })
}

/// File name to store a download under, or `None` for unsupported files.
///
/// Query strings are tolerated: `photo.JPG?w=200` yields `photo.JPG`.
pub fn image_file_name(file_name: &str) -> Option<String> {
    let matched = image_name_pattern().find(file_name)?.as_str();
    let base = matched
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(matched);
    Some(base.to_string())
}

/// Whether a title slugs to a bare number (camera defaults like `1234`)
fn is_numeric_slug(title: &str) -> bool {
    let slug: String = title
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    !slug.is_empty() && slug.parse::<f64>().is_ok()
}
