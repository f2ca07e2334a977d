//! # Content Pull Sync Module
//!
//! Pulls structured content items from a remote content-management API into
//! host records.
//!
//! ## Overview
//!
//! A pull maps every element of an item onto a record payload, persists the
//! record, sideloads referenced media and places it (primary visual, inline
//! images, galleries, metadata), then optionally advances the item's remote
//! workflow status.
//!
//! ## Components
//!
//! - **Field Sanitizer** (`sanitizer`): Type-specific cleaning of native field values
//! - **Term Resolver** (`terms`): Resolves term labels/ids, creating missing terms
//! - **Media Resolver** (`media_resolver`): Sideload / re-sideload decisions and protocol
//! - **Field Mapper** (`mapper`): Routes element values into native, taxonomy, meta and media sinks
//! - **Attachment Placement Engine** (`placement`): Places sideloaded media and builds substitutions
//! - **Pull Orchestrator** (`pull`): Freshness check, persistence and the end-to-end pull
//! - **Hooks** (`hooks`): Host extension points with identity defaults

pub mod error;
pub mod hooks;
pub mod mapper;
pub mod mapping;
pub mod media_resolver;
pub mod outcome;
pub mod placement;
pub mod pull;
pub mod sanitizer;
pub mod terms;

pub use error::{FieldError, MediaError, Result, SyncError};
pub use hooks::{DefaultHooks, PullHooks};
pub use mapper::{AttachmentGroup, FieldMapper, MappingResult, MediaReference};
pub use mapping::{Destination, Mapping, MappingDefaults, MediaDestination, StatusTransition};
pub use media_resolver::{MediaResolver, Resolution};
pub use outcome::{PullOutcome, PullReport, Skip, SkipScope, StepOutcome};
pub use placement::{PlacementEngine, SubstitutionMap};
pub use pull::{PullOrchestrator, PullSettings};
pub use sanitizer::{FieldContext, FieldSanitizer};
pub use terms::TermResolver;
