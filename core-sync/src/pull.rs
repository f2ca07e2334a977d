//! Pull Orchestrator
//!
//! Pulls one remote item into the host content store:
//!
//! 1. Validate the mapping and fetch the item snapshot
//! 2. Skip when the bound record already holds the latest changes
//! 3. Map the item onto a payload seeded from the existing record
//! 4. Persist the record and write item linkage metadata
//! 5. Sideload and place attachments, substitute tokens, re-persist
//! 6. Move the remote item to its follow-up status
//!
//! Config, fetch and persist failures abort the pull. Everything after the
//! first persist is best-effort and reported as skips.

use bridge_traits::{
    BridgeError, Item, ItemId, ItemMeta, Record, RecordId, RecordPayload, RecordStore,
    RemoteItemApi, RemoteTimestamp, SaveOptions,
};
use core_runtime::config::{CoreConfig, FeatureFlags};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::hooks::{DefaultHooks, PullHooks};
use crate::mapper::{group_files, FieldMapper, ItemFiles};
use crate::mapping::Mapping;
use crate::outcome::{PullOutcome, PullReport, Skip, SkipScope};
use crate::placement::PlacementEngine;
use crate::sanitizer::{fields, parse_timestamp, sanitize_text};

/// Tunables of the mapping pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullSettings {
    /// Native fields (and metadata keys) that concatenate mapped values
    pub append_fields: BTreeSet<String>,
    /// Taxonomy whose terms go to the payload's category list
    pub category_taxonomy: String,
    /// Class of images rendered for inline media
    pub inline_image_class: String,
}

impl Default for PullSettings {
    fn default() -> Self {
        Self {
            append_fields: [fields::CONTENT, fields::EXCERPT]
                .into_iter()
                .map(String::from)
                .collect(),
            category_taxonomy: "category".to_string(),
            inline_image_class: "attachment-full size-full gathercontent-image".to_string(),
        }
    }
}

impl PullSettings {
    pub fn can_append(&self, field: &str) -> bool {
        self.append_fields.contains(field)
    }
}

pub struct PullOrchestrator {
    config: CoreConfig,
    hooks: Arc<dyn PullHooks>,
    settings: PullSettings,
}

impl PullOrchestrator {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            hooks: Arc::new(DefaultHooks),
            settings: PullSettings::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn PullHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_settings(mut self, settings: PullSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn features(&self) -> FeatureFlags {
        self.config.features
    }

    fn remote(&self) -> &dyn RemoteItemApi {
        self.config.remote_api.as_ref()
    }

    fn store(&self) -> &dyn RecordStore {
        self.config.record_store.as_ref()
    }

    /// Pull the remote item `item_id` into the host record it is bound to,
    /// creating the record when none exists.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Config`] if the mapping is unusable
    /// - [`SyncError::Fetch`] if the item cannot be fetched
    /// - [`SyncError::Persist`] if the host store rejects the record
    /// - [`SyncError::Store`] if linkage metadata cannot be written
    #[instrument(skip_all, fields(item_id = %item_id, mapping_id = %mapping.id))]
    pub async fn pull(&self, mapping: &Mapping, item_id: ItemId) -> Result<PullOutcome> {
        mapping.validate()?;

        let item = self
            .remote()
            .get_item(item_id)
            .await
            .map_err(|e| SyncError::Fetch {
                item_id,
                message: e.to_string(),
            })?;

        let existing = self.store().find_record_by_item_id(item_id).await?;
        let payload = match &existing {
            Some(record) => {
                if self.has_latest_changes(&item, record).await? {
                    info!(
                        record_id = %record.id,
                        "Host has the most recent changes for {}", item.name
                    );
                    return Ok(PullOutcome::SkippedNotNewer {
                        record_id: record.id,
                        item_id,
                    });
                }
                RecordPayload::from_record(record)
            }
            None => RecordPayload::fresh(),
        };

        let mut skipped = Vec::new();
        let files = self.item_files(item_id, &mut skipped).await;

        let mapper = FieldMapper::new(&self.config, Arc::clone(&self.hooks), self.settings.clone());
        let mapped = mapper.map(&item, &files, mapping, payload).await;
        skipped.extend(mapped.skipped);
        let mut payload = mapped.payload;

        let has_title = payload
            .field(fields::TITLE)
            .is_some_and(|title| !title.is_empty());
        if !has_title && !item.name.is_empty() {
            payload.set_field(fields::TITLE, sanitize_text(&item.name));
        }

        let created = payload.is_new();
        let record_id = self
            .store()
            .create_or_update_record(&payload, SaveOptions::default())
            .await
            .map_err(|e| {
                error!("Failed to persist record: {}", e);
                persist_error(item_id, payload.id, e)
            })?;
        payload.id = Some(record_id);

        self.record_linkage(&item, record_id, mapping).await?;

        let mut attachments_placed = 0;
        let attachments = self.hooks.media_objects(mapped.attachments, &payload);
        if !attachments.is_empty() {
            let engine =
                PlacementEngine::new(&self.config, Arc::clone(&self.hooks), self.settings.clone());
            let placement = engine
                .place(&attachments, &payload, record_id, mapping.id)
                .await;
            attachments_placed = placement.placed;
            skipped.extend(placement.skipped);

            if !placement.replacements.is_empty() {
                placement.replacements.apply(&mut payload);

                let options = SaveOptions {
                    create_revision: false,
                };
                if let Err(e) = self.store().create_or_update_record(&payload, options).await {
                    warn!(record_id = %record_id, "Failed to re-persist record: {}", e);
                    skipped.push(Skip::new(SkipScope::Repersist, e.to_string()));
                }
            }
        }

        let remote_status = self.update_remote_status(&item, mapping, &mut skipped).await;

        info!(
            record_id = %record_id,
            created,
            attachments = attachments_placed,
            skipped = skipped.len(),
            "Pulled item"
        );

        Ok(PullOutcome::Pulled(PullReport {
            item_id,
            record_id,
            created,
            attachments_placed,
            remote_status,
            skipped,
        }))
    }

    /// Whether the stored record is at least as recent as the item
    async fn has_latest_changes(&self, item: &Item, record: &Record) -> Result<bool> {
        let meta = self.store().get_record_item_metadata(record.id).await?;
        let not_newer = is_not_newer(item.updated_at.as_ref(), meta.get("updated_at"));

        Ok(not_newer
            && self
                .hooks
                .only_update_if_newer(self.config.features.only_update_if_newer, item, record))
    }

    /// Item files grouped by element; a listing failure means no files
    async fn item_files(&self, item_id: ItemId, skipped: &mut Vec<Skip>) -> ItemFiles {
        match self.remote().get_item_files(item_id).await {
            Ok(files) => {
                debug!(count = files.len(), "Fetched item files");
                group_files(files)
            }
            Err(e) => {
                warn!("Failed to list item files: {}", e);
                skipped.push(Skip::new(SkipScope::ItemFiles, e.to_string()));
                ItemFiles::new()
            }
        }
    }

    async fn record_linkage(
        &self,
        item: &Item,
        record_id: RecordId,
        mapping: &Mapping,
    ) -> Result<()> {
        self.store().bind_item_id(record_id, item.id).await?;
        self.store().bind_mapping_id(record_id, mapping.id).await?;

        let mut meta = ItemMeta::new();
        if let Some(created) = &item.created_at {
            meta.insert("created_at".to_string(), created.as_str().to_string());
        }
        if let Some(updated) = &item.updated_at {
            meta.insert("updated_at".to_string(), updated.as_str().to_string());
        }
        self.store().set_record_item_metadata(record_id, &meta).await?;
        Ok(())
    }

    async fn update_remote_status(
        &self,
        item: &Item,
        mapping: &Mapping,
        skipped: &mut Vec<Skip>,
    ) -> Option<String> {
        if !self.config.features.update_remote_status {
            return None;
        }
        let status = mapping.next_remote_status(item)?;

        match self.remote().set_item_status(item.id, status).await {
            Ok(()) => Some(status.to_string()),
            Err(e) => {
                warn!(status, "Failed to update remote item status: {}", e);
                skipped.push(Skip::new(SkipScope::StatusUpdate, e.to_string()));
                None
            }
        }
    }
}

/// Both timestamps known and the remote one not strictly newer
fn is_not_newer(remote: Option<&RemoteTimestamp>, stored: Option<&String>) -> bool {
    let remote = remote.and_then(|ts| parse_timestamp(ts.as_str()));
    let stored = stored.and_then(|ts| parse_timestamp(ts));

    match (remote, stored) {
        (Some(remote), Some(stored)) => remote <= stored,
        _ => false,
    }
}

fn persist_error(item_id: ItemId, record_id: Option<RecordId>, err: BridgeError) -> SyncError {
    let code = err.code().map(str::to_string);
    let message = match err {
        BridgeError::Rejected { message, .. } => message,
        other => other.to_string(),
    };
    SyncError::Persist {
        item_id,
        record_id,
        code,
        message,
    }
}
