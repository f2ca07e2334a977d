//! In-memory collaborators shared by the pull integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{
    Asset, AssetStorage, AssetUpdate, ChoiceOption, Element, ElementType, FixedClock,
    ImageAttributes, ImageMetadata, Item, ItemId, ItemMeta, ItemStatus, MappingId,
    MediaDownloader, MediaFile, MediaId, Record, RecordId, RecordPayload, RecordStore,
    RemoteItemApi, SaveOptions, StoredFile, Tab, TaxonomyStore, TempFile, TermId, TermRef,
};
use chrono::{TimeZone, Utc};
use core_runtime::config::CoreConfig;
use core_sync::{Mapping, PullOrchestrator};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Remote API
// ============================================================================

#[derive(Default)]
pub struct FakeRemote {
    pub items: Mutex<BTreeMap<ItemId, Item>>,
    pub files: Mutex<Vec<MediaFile>>,
    pub fail_files: Mutex<bool>,
    pub fail_status: Mutex<bool>,
    pub status_updates: Mutex<Vec<(ItemId, String)>>,
}

impl FakeRemote {
    pub fn add_item(&self, item: Item) {
        self.items.lock().unwrap().insert(item.id, item);
    }

    pub fn add_file(&self, file: MediaFile) {
        self.files.lock().unwrap().push(file);
    }
}

#[async_trait]
impl RemoteItemApi for FakeRemote {
    async fn get_item(&self, id: ItemId) -> Result<Item> {
        self.items
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(format!("item {}", id)))
    }

    async fn get_item_files(&self, id: ItemId) -> Result<Vec<MediaFile>> {
        if *self.fail_files.lock().unwrap() {
            return Err(BridgeError::OperationFailed("files endpoint down".to_string()));
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|file| file.item_id == id)
            .cloned()
            .collect())
    }

    async fn set_item_status(&self, id: ItemId, status_id: &str) -> Result<()> {
        if *self.fail_status.lock().unwrap() {
            return Err(BridgeError::OperationFailed("status rejected".to_string()));
        }
        self.status_updates
            .lock()
            .unwrap()
            .push((id, status_id.to_string()));
        Ok(())
    }
}

// ============================================================================
// Host record store
// ============================================================================

pub struct FakeStore {
    next_id: AtomicU64,
    pub records: Mutex<BTreeMap<RecordId, Record>>,
    pub item_bindings: Mutex<BTreeMap<ItemId, RecordId>>,
    pub mapping_bindings: Mutex<BTreeMap<RecordId, MappingId>>,
    pub item_meta: Mutex<BTreeMap<RecordId, ItemMeta>>,
    pub assets: Mutex<BTreeMap<MediaId, Asset>>,
    pub primary_visual: Mutex<BTreeMap<RecordId, RecordId>>,
    pub saves: Mutex<Vec<(RecordPayload, SaveOptions)>>,
    pub reject_with: Mutex<Option<(String, String)>>,
}

impl Default for FakeStore {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(100),
            records: Mutex::default(),
            item_bindings: Mutex::default(),
            mapping_bindings: Mutex::default(),
            item_meta: Mutex::default(),
            assets: Mutex::default(),
            primary_visual: Mutex::default(),
            saves: Mutex::default(),
            reject_with: Mutex::default(),
        }
    }
}

impl FakeStore {
    /// Seed a record bound to `item_id` with stored linkage metadata
    pub fn seed_record(
        &self,
        item_id: ItemId,
        fields: &[(&str, &str)],
        updated_at: Option<&str>,
    ) -> RecordId {
        let id = RecordId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let fields: BTreeMap<String, String> = fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.records.lock().unwrap().insert(
            id,
            Record {
                id,
                record_type: "post".to_string(),
                fields,
            },
        );
        self.item_bindings.lock().unwrap().insert(item_id, id);
        if let Some(updated_at) = updated_at {
            let mut meta = ItemMeta::new();
            meta.insert("updated_at".to_string(), updated_at.to_string());
            self.item_meta.lock().unwrap().insert(id, meta);
        }
        id
    }

    pub fn record(&self, id: RecordId) -> Option<Record> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn last_save(&self) -> Option<(RecordPayload, SaveOptions)> {
        self.saves.lock().unwrap().last().cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn meta(&self, id: RecordId) -> ItemMeta {
        self.item_meta
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn find_record_by_item_id(&self, item_id: ItemId) -> Result<Option<Record>> {
        let bound = self.item_bindings.lock().unwrap().get(&item_id).copied();
        Ok(bound.and_then(|id| self.record(id)))
    }

    async fn create_or_update_record(
        &self,
        payload: &RecordPayload,
        options: SaveOptions,
    ) -> Result<RecordId> {
        if let Some((code, message)) = self.reject_with.lock().unwrap().clone() {
            return Err(BridgeError::Rejected { code, message });
        }

        let id = payload
            .id
            .unwrap_or_else(|| RecordId(self.next_id.fetch_add(1, Ordering::SeqCst)));
        let record = Record {
            id,
            record_type: payload.field("type").unwrap_or("post").to_string(),
            fields: payload.fields.clone(),
        };
        self.records.lock().unwrap().insert(id, record);
        self.saves.lock().unwrap().push((payload.clone(), options));
        Ok(id)
    }

    async fn get_record_item_metadata(&self, id: RecordId) -> Result<ItemMeta> {
        Ok(self.meta(id))
    }

    async fn set_record_item_metadata(&self, id: RecordId, meta: &ItemMeta) -> Result<()> {
        self.item_meta.lock().unwrap().insert(id, meta.clone());
        Ok(())
    }

    async fn bind_item_id(&self, id: RecordId, item_id: ItemId) -> Result<()> {
        self.item_bindings.lock().unwrap().insert(item_id, id);
        Ok(())
    }

    async fn bind_mapping_id(&self, id: RecordId, mapping_id: MappingId) -> Result<()> {
        self.mapping_bindings.lock().unwrap().insert(id, mapping_id);
        Ok(())
    }

    async fn set_primary_visual(&self, id: RecordId, asset_id: RecordId) -> Result<()> {
        self.primary_visual.lock().unwrap().insert(id, asset_id);
        Ok(())
    }

    async fn find_asset_by_media_id(&self, media_id: MediaId) -> Result<Option<Asset>> {
        Ok(self.assets.lock().unwrap().get(&media_id).cloned())
    }

    async fn bind_media_id(&self, asset_id: RecordId, media_id: MediaId) -> Result<()> {
        self.assets.lock().unwrap().insert(
            media_id,
            Asset {
                id: asset_id,
                parent: None,
                created_at: Some("2024-01-01 00:00:00".to_string()),
                title: String::new(),
                description: String::new(),
            },
        );
        Ok(())
    }

    fn supports_formats(&self, record_type: &str) -> bool {
        record_type == "post"
    }
}

// ============================================================================
// Taxonomies
// ============================================================================

pub struct FakeTaxonomies {
    next_id: AtomicU64,
    pub hierarchical: BTreeSet<String>,
    pub terms: Mutex<BTreeMap<(String, String), TermId>>,
}

impl FakeTaxonomies {
    pub fn new(hierarchical: &[&str]) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            hierarchical: hierarchical.iter().map(|t| t.to_string()).collect(),
            terms: Mutex::default(),
        }
    }

    pub fn term_count(&self) -> usize {
        self.terms.lock().unwrap().len()
    }
}

#[async_trait]
impl TaxonomyStore for FakeTaxonomies {
    async fn is_hierarchical(&self, taxonomy: &str) -> Result<bool> {
        Ok(self.hierarchical.contains(taxonomy))
    }

    async fn term_exists(&self, taxonomy: &str, term: &TermRef) -> Result<Option<TermId>> {
        let terms = self.terms.lock().unwrap();
        Ok(match term {
            TermRef::Name(label) => terms.get(&(taxonomy.to_string(), label.clone())).copied(),
            TermRef::Id(id) => terms
                .iter()
                .find(|((tax, _), existing)| tax == taxonomy && *existing == id)
                .map(|(_, id)| *id),
        })
    }

    async fn insert_term(&self, taxonomy: &str, label: &str) -> Result<TermId> {
        let id = TermId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.terms
            .lock()
            .unwrap()
            .insert((taxonomy.to_string(), label.to_string()), id);
        Ok(id)
    }
}

// ============================================================================
// Media
// ============================================================================

#[derive(Default)]
pub struct FakeDownloader {
    pub downloads: Mutex<Vec<String>>,
    pub failing_urls: Mutex<BTreeSet<String>>,
    pub discarded: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl MediaDownloader for FakeDownloader {
    async fn download_to_temp(&self, url: &str, file_name: &str) -> Result<TempFile> {
        if self.failing_urls.lock().unwrap().contains(url) {
            return Err(BridgeError::OperationFailed(format!("HTTP 404 for {}", url)));
        }
        self.downloads.lock().unwrap().push(url.to_string());
        Ok(TempFile {
            path: PathBuf::from(format!("/tmp/dl_{}", file_name)),
            name: file_name.to_string(),
        })
    }

    async fn discard(&self, file: &TempFile) -> Result<()> {
        self.discarded.lock().unwrap().push(file.path.clone());
        Ok(())
    }
}

pub struct FakeAssets {
    next_id: AtomicU64,
    pub updates: Mutex<Vec<AssetUpdate>>,
}

impl Default for FakeAssets {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(500),
            updates: Mutex::default(),
        }
    }
}

#[async_trait]
impl AssetStorage for FakeAssets {
    async fn store_sideloaded(&self, _file: &TempFile, _parent: RecordId) -> Result<RecordId> {
        Ok(RecordId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn asset_url(&self, id: RecordId) -> Result<Option<String>> {
        Ok(Some(format!("https://host.example.com/uploads/{}.png", id)))
    }

    async fn attachment_page_url(&self, id: RecordId) -> Result<Option<String>> {
        Ok(Some(format!("https://host.example.com/?attachment_id={}", id)))
    }

    async fn store_file(&self, file: &TempFile, _time: &str) -> Result<StoredFile> {
        Ok(StoredFile {
            path: PathBuf::from(format!("/uploads/{}", file.name)),
            url: format!("https://host.example.com/uploads/{}", file.name),
            mime_type: "image/png".to_string(),
        })
    }

    async fn read_image_metadata(&self, _path: &Path) -> Result<Option<ImageMetadata>> {
        Ok(None)
    }

    async fn update_asset(&self, update: &AssetUpdate) -> Result<RecordId> {
        self.updates.lock().unwrap().push(update.clone());
        Ok(update.id)
    }

    async fn regenerate_metadata(&self, _id: RecordId, _path: &Path) -> Result<()> {
        Ok(())
    }

    async fn render_image(&self, id: RecordId, attributes: &ImageAttributes) -> Result<String> {
        let gcid = attributes.extra.get("data-gcid").cloned().unwrap_or_default();
        Ok(format!(
            r#"<img src="asset-{}" size="{}" class="{}" data-gcid="{}">"#,
            id, attributes.size, attributes.class, gcid
        ))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub remote: Arc<FakeRemote>,
    pub store: Arc<FakeStore>,
    pub taxonomies: Arc<FakeTaxonomies>,
    pub downloader: Arc<FakeDownloader>,
    pub assets: Arc<FakeAssets>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            remote: Arc::new(FakeRemote::default()),
            store: Arc::new(FakeStore::default()),
            taxonomies: Arc::new(FakeTaxonomies::new(&["category"])),
            downloader: Arc::new(FakeDownloader::default()),
            assets: Arc::new(FakeAssets::default()),
        }
    }

    pub fn config(&self) -> core_runtime::config::CoreConfigBuilder {
        CoreConfig::builder()
            .remote_api(self.remote.clone())
            .record_store(self.store.clone())
            .taxonomy_store(self.taxonomies.clone())
            .media_downloader(self.downloader.clone())
            .asset_storage(self.assets.clone())
            .clock(Arc::new(FixedClock(
                Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            )))
    }

    pub fn orchestrator(&self) -> PullOrchestrator {
        PullOrchestrator::new(self.config().build().unwrap())
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn item(id: u64, updated_at: &str, elements: Vec<Element>) -> Item {
    Item {
        id: ItemId(id),
        name: "Launch <b>post</b>".to_string(),
        status: Some(ItemStatus {
            id: "931".to_string(),
            name: "Ready".to_string(),
        }),
        created_at: Some("2024-01-01 09:00:00".into()),
        updated_at: Some(updated_at.into()),
        config: vec![Tab {
            name: "tab1".to_string(),
            label: "Content".to_string(),
            elements,
        }],
    }
}

fn element(name: &str, kind: ElementType, value: serde_json::Value) -> Element {
    Element {
        name: name.to_string(),
        label: name.to_string(),
        kind,
        value,
        plain_text: false,
        subtitle: None,
        options: Vec::new(),
    }
}

pub fn text(name: &str, value: &str) -> Element {
    element(name, ElementType::Text, json!(value))
}

pub fn files(name: &str) -> Element {
    element(name, ElementType::Files, serde_json::Value::Null)
}

pub fn checkbox(name: &str, options: &[(&str, bool)]) -> Element {
    let mut el = element(name, ElementType::ChoiceCheckbox, serde_json::Value::Null);
    el.options = options
        .iter()
        .map(|(label, selected)| ChoiceOption {
            name: label.to_lowercase(),
            label: label.to_string(),
            selected: *selected,
        })
        .collect();
    el
}

pub fn media_file(id: u64, item_id: u64, field: &str, filename: &str) -> MediaFile {
    MediaFile {
        id: MediaId(id),
        user_id: 77,
        item_id: ItemId(item_id),
        field: field.to_string(),
        media_type: "image".to_string(),
        url: format!("https://cdn.example.com/{}/{}", id, filename),
        filename: filename.to_string(),
        size: 4096,
        created_at: Some("2024-01-01 09:00:00".into()),
        updated_at: Some("2024-01-01 09:30:00".into()),
    }
}

/// Mapping with the given element destinations as `(element, type, value)`
pub fn mapping(destinations: &[(&str, &str, &str)]) -> Mapping {
    let destinations: serde_json::Map<String, serde_json::Value> = destinations
        .iter()
        .map(|(element, kind, value)| {
            (
                element.to_string(),
                json!({ "type": kind, "value": value }),
            )
        })
        .collect();

    serde_json::from_value(json!({
        "id": 12,
        "record_type": "post",
        "defaults": { "author": "1", "status": "draft" },
        "status_map": { "931": { "local": "pending", "after": "932" } },
        "destinations": destinations
    }))
    .unwrap()
}
