//! # Core Configuration Module
//!
//! Provides configuration management for the content sync core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every collaborator the pull engine talks to, together
//! with the policy flags that shape a pull. It enforces fail-fast validation so
//! that a missing bridge is reported before the first item is touched.
//!
//! ## Required Dependencies
//!
//! - `RemoteItemApi` - Fetch items, files and update item status
//! - `RecordStore` - Host record persistence and linkage metadata
//! - `TaxonomyStore` - Term lookup and creation
//! - `AssetStorage` - Permanent media storage
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `MediaDownloader` - Temp downloads (desktop default: reqwest)
//! - `Clock` - Time source (default: system clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .remote_api(Arc::new(MyRemoteApi))
//!     .record_store(Arc::new(MyRecordStore))
//!     .taxonomy_store(Arc::new(MyTaxonomyStore))
//!     .asset_storage(Arc::new(MyAssetStorage))
//!     .only_update_if_newer(false)
//!     .local_utc_offset_secs(2 * 3600)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    AssetStorage, Clock, MediaDownloader, RecordStore, RemoteItemApi, SystemClock, TaxonomyStore,
};
use chrono::{FixedOffset, Offset, Utc};
use std::sync::Arc;

/// Largest accepted distance from UTC for the host's local timezone
const MAX_UTC_OFFSET_SECS: i32 = 14 * 3600;

/// Core configuration for the content sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Remote content API client
    pub remote_api: Arc<dyn RemoteItemApi>,

    /// Host record storage
    pub record_store: Arc<dyn RecordStore>,

    /// Host taxonomy storage
    pub taxonomy_store: Arc<dyn TaxonomyStore>,

    /// Temporary media downloader
    pub media_downloader: Arc<dyn MediaDownloader>,

    /// Permanent media storage
    pub asset_storage: Arc<dyn AssetStorage>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Policy flags
    pub features: FeatureFlags,

    /// Host local timezone, seconds east of UTC
    pub local_utc_offset_secs: i32,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("remote_api", &"RemoteItemApi { ... }")
            .field("record_store", &"RecordStore { ... }")
            .field("taxonomy_store", &"TaxonomyStore { ... }")
            .field("media_downloader", &"MediaDownloader { ... }")
            .field("asset_storage", &"AssetStorage { ... }")
            .field("features", &self.features)
            .field("local_utc_offset_secs", &self.local_utc_offset_secs)
            .finish()
    }
}

/// Feature flags control pull policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Skip items whose remote update time is not newer than the stored one
    pub only_update_if_newer: bool,

    /// Regenerate asset title/description from embedded image metadata
    /// when a changed media file is re-downloaded
    pub replace_attachment_data_on_update: bool,

    /// Move the remote item to the mapping's follow-up status after a pull
    pub update_remote_status: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            only_update_if_newer: true,
            replace_attachment_data_on_update: false,
            update_remote_status: true,
        }
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.local_utc_offset_secs.abs() > MAX_UTC_OFFSET_SECS {
            return Err(Error::Config(format!(
                "Local UTC offset of {} seconds exceeds the maximum of {} seconds",
                self.local_utc_offset_secs, MAX_UTC_OFFSET_SECS
            )));
        }

        Ok(())
    }

    /// The host's local timezone as a fixed offset
    pub fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.local_utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}

fn capability_missing(collaborator: &'static str, hint: &str) -> Error {
    Error::MissingCollaborator {
        collaborator,
        hint: hint.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_media_downloader() -> Result<Arc<dyn MediaDownloader>> {
    use bridge_desktop::ReqwestMediaDownloader;

    let downloader = ReqwestMediaDownloader::new()?;
    let downloader: Arc<dyn MediaDownloader> = Arc::new(downloader);
    Ok(downloader)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_media_downloader() -> Result<Arc<dyn MediaDownloader>> {
    Err(capability_missing(
        "MediaDownloader",
        "MediaDownloader implementation is required to sideload media. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestMediaDownloader. \
         Other hosts: inject a downloader backed by the host's HTTP stack.",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    remote_api: Option<Arc<dyn RemoteItemApi>>,
    record_store: Option<Arc<dyn RecordStore>>,
    taxonomy_store: Option<Arc<dyn TaxonomyStore>>,
    media_downloader: Option<Arc<dyn MediaDownloader>>,
    asset_storage: Option<Arc<dyn AssetStorage>>,
    clock: Option<Arc<dyn Clock>>,
    features: FeatureFlags,
    local_utc_offset_secs: i32,
}

impl CoreConfigBuilder {
    pub fn remote_api(mut self, api: Arc<dyn RemoteItemApi>) -> Self {
        self.remote_api = Some(api);
        self
    }

    pub fn record_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.record_store = Some(store);
        self
    }

    pub fn taxonomy_store(mut self, store: Arc<dyn TaxonomyStore>) -> Self {
        self.taxonomy_store = Some(store);
        self
    }

    pub fn media_downloader(mut self, downloader: Arc<dyn MediaDownloader>) -> Self {
        self.media_downloader = Some(downloader);
        self
    }

    pub fn asset_storage(mut self, storage: Arc<dyn AssetStorage>) -> Self {
        self.asset_storage = Some(storage);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Skip pulls when the remote item is not newer than the stored record
    pub fn only_update_if_newer(mut self, enabled: bool) -> Self {
        self.features.only_update_if_newer = enabled;
        self
    }

    pub fn replace_attachment_data_on_update(mut self, enabled: bool) -> Self {
        self.features.replace_attachment_data_on_update = enabled;
        self
    }

    pub fn update_remote_status(mut self, enabled: bool) -> Self {
        self.features.update_remote_status = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Host local timezone in seconds east of UTC
    pub fn local_utc_offset_secs(mut self, offset: i32) -> Self {
        self.local_utc_offset_secs = offset;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// Returns an error with an actionable message if a required bridge is
    /// missing or a value is out of range.
    pub fn build(self) -> Result<CoreConfig> {
        let remote_api = self.remote_api.ok_or_else(|| {
            capability_missing(
                "RemoteItemApi",
                "RemoteItemApi implementation is required to fetch items. Use .remote_api() to set it.",
            )
        })?;

        let record_store = self.record_store.ok_or_else(|| {
            capability_missing(
                "RecordStore",
                "RecordStore implementation is required to persist records. Use .record_store() to set it.",
            )
        })?;

        let taxonomy_store = self.taxonomy_store.ok_or_else(|| {
            capability_missing(
                "TaxonomyStore",
                "TaxonomyStore implementation is required to resolve terms. Use .taxonomy_store() to set it.",
            )
        })?;

        let asset_storage = self.asset_storage.ok_or_else(|| {
            capability_missing(
                "AssetStorage",
                "AssetStorage implementation is required to store media. Use .asset_storage() to set it.",
            )
        })?;

        let media_downloader = match self.media_downloader {
            Some(downloader) => downloader,
            None => provide_default_media_downloader()?,
        };

        let config = CoreConfig {
            remote_api,
            record_store,
            taxonomy_store,
            media_downloader,
            asset_storage,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            features: self.features,
            local_utc_offset_secs: self.local_utc_offset_secs,
        };

        config.validate()?;

        Ok(config)
    }
}
