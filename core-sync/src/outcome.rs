//! Outcomes of a pull and of its best-effort steps.
//!
//! Per-element and per-attachment failures never abort a pull. They are
//! recorded as [`Skip`] entries on the [`PullReport`] so an operator can see
//! what was left out.

use bridge_traits::{ItemId, MediaId, RecordId};
use std::fmt;

/// Result of one best-effort step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome<T> {
    Applied(T),
    Skipped(String),
}

/// Where a skipped step happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipScope {
    /// Mapping of the named element
    Element(String),
    /// Sideload or placement of a media file
    Attachment(MediaId),
    /// Listing the item's files
    ItemFiles,
    /// Setting the record's primary visual
    PrimaryVisual,
    /// Re-persisting the record after substitution
    Repersist,
    /// Moving the remote item to its follow-up status
    StatusUpdate,
}

impl fmt::Display for SkipScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipScope::Element(name) => write!(f, "element {}", name),
            SkipScope::Attachment(id) => write!(f, "media {}", id),
            SkipScope::ItemFiles => write!(f, "item files"),
            SkipScope::PrimaryVisual => write!(f, "primary visual"),
            SkipScope::Repersist => write!(f, "re-persist"),
            SkipScope::StatusUpdate => write!(f, "status update"),
        }
    }
}

/// A step that was skipped, with the reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    pub scope: SkipScope,
    pub reason: String,
}

impl Skip {
    pub fn new(scope: SkipScope, reason: impl Into<String>) -> Self {
        Self {
            scope,
            reason: reason.into(),
        }
    }
}

/// Summary of a completed pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub item_id: ItemId,
    pub record_id: RecordId,
    /// Whether the pull created the record
    pub created: bool,
    /// Media files sideloaded and placed
    pub attachments_placed: usize,
    /// Remote status the item was moved to
    pub remote_status: Option<String>,
    pub skipped: Vec<Skip>,
}

/// Outcome of [`PullOrchestrator::pull`](crate::pull::PullOrchestrator::pull)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Pulled(PullReport),
    /// The host record already has the most recent changes
    SkippedNotNewer { record_id: RecordId, item_id: ItemId },
}

impl PullOutcome {
    pub fn record_id(&self) -> RecordId {
        match self {
            PullOutcome::Pulled(report) => report.record_id,
            PullOutcome::SkippedNotNewer { record_id, .. } => *record_id,
        }
    }

    pub fn report(&self) -> Option<&PullReport> {
        match self {
            PullOutcome::Pulled(report) => Some(report),
            PullOutcome::SkippedNotNewer { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_scope_display() {
        assert_eq!(SkipScope::Element("el1".to_string()).to_string(), "element el1");
        assert_eq!(SkipScope::Attachment(MediaId(9)).to_string(), "media 9");
    }

    #[test]
    fn test_outcome_record_id() {
        let outcome = PullOutcome::SkippedNotNewer {
            record_id: RecordId(4),
            item_id: ItemId(8),
        };
        assert_eq!(outcome.record_id(), RecordId(4));
        assert!(outcome.report().is_none());
    }
}
