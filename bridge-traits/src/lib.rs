//! # Host Bridge Traits
//!
//! Collaborator contracts that the pull engine consumes but does not implement.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync core and the systems on
//! either side of it: the remote content-management API the items come from,
//! and the host content store the records are written into. Each trait is a
//! capability the core requires; hosts ship concrete adapters.
//!
//! ## Traits
//!
//! ### Remote side
//! - [`RemoteItemApi`](remote::RemoteItemApi) - Fetch items and files, update item status
//!
//! ### Host side
//! - [`RecordStore`](store::RecordStore) - Create/update records, linkage metadata, primary visual
//! - [`TaxonomyStore`](store::TaxonomyStore) - Term lookup and creation
//! - [`MediaDownloader`](media::MediaDownloader) - Download remote files to temporary storage
//! - [`AssetStorage`](media::AssetStorage) - Permanent media storage and rendering
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. When
//! the host store refuses a write it should answer with
//! [`BridgeError::Rejected`] so the core can surface the host's code and
//! message to the operator.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so that independent pulls
//! can share one set of adapters across tasks.

pub mod error;
pub mod media;
pub mod remote;
pub mod store;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use media::{
    AssetStorage, AssetUpdate, ImageAttributes, ImageMetadata, MediaDownloader, StoredFile,
    TempFile,
};
pub use remote::{
    ChoiceOption, Element, ElementType, Item, ItemId, ItemStatus, MediaFile, MediaId,
    RemoteItemApi, RemoteTimestamp, Tab,
};
pub use store::{
    Asset, ItemMeta, MappingId, Record, RecordId, RecordPayload, RecordStore, SaveOptions,
    TaxonomyStore, TermId, TermRef,
};
pub use time::{Clock, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
