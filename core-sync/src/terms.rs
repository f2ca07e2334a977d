//! Term Resolver
//!
//! Turns element values into taxonomy terms. In hierarchical taxonomies
//! labels are resolved to canonical ids, creating missing terms on the way.

use bridge_traits::{ElementType, TaxonomyStore, TermId, TermRef};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::FieldError;
use crate::sanitizer::sanitize_text;

pub struct TermResolver {
    taxonomies: Arc<dyn TaxonomyStore>,
}

impl TermResolver {
    pub fn new(taxonomies: Arc<dyn TaxonomyStore>) -> Self {
        Self { taxonomies }
    }

    /// Resolve the terms an element value names in `taxonomy`
    pub async fn resolve(
        &self,
        taxonomy: &str,
        kind: ElementType,
        value: &Value,
    ) -> Result<Vec<TermRef>, FieldError> {
        let candidates = term_candidates(kind, value);
        if candidates.is_empty() {
            return Ok(candidates);
        }

        let hierarchical = self
            .taxonomies
            .is_hierarchical(taxonomy)
            .await
            .map_err(|e| term_error(taxonomy, e))?;
        if !hierarchical {
            return Ok(candidates);
        }

        let mut resolved = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let existing = self
                .taxonomies
                .term_exists(taxonomy, &candidate)
                .await
                .map_err(|e| term_error(taxonomy, e))?;

            match (existing, candidate) {
                (Some(id), _) => resolved.push(TermRef::Id(id)),
                (None, TermRef::Id(id)) => {
                    debug!(taxonomy, term_id = %id, "Dropping unknown term id");
                }
                (None, TermRef::Name(label)) => {
                    match self.taxonomies.insert_term(taxonomy, &label).await {
                        Ok(id) => resolved.push(TermRef::Id(id)),
                        Err(e) => {
                            warn!(taxonomy, label = %label, "Failed to create term: {}", e);
                            resolved.push(TermRef::Name(label));
                        }
                    }
                }
            }
        }

        Ok(resolved)
    }
}

fn term_error(taxonomy: &str, err: bridge_traits::BridgeError) -> FieldError {
    FieldError::Term {
        taxonomy: taxonomy.to_string(),
        message: err.to_string(),
    }
}

/// Candidate terms before resolution.
///
/// Text elements hold a comma separated list; other elements already carry
/// a list of labels or ids. Only JSON numbers count as ids.
pub fn term_candidates(kind: ElementType, value: &Value) -> Vec<TermRef> {
    if kind == ElementType::Text {
        let text = match value {
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        return sanitize_text(&text)
            .split(',')
            .map(|piece| TermRef::Name(piece.trim().to_string()))
            .collect();
    }

    match value {
        Value::Array(values) => values.iter().filter_map(term_ref).collect(),
        Value::Null => Vec::new(),
        other => term_ref(other).into_iter().collect(),
    }
}

fn term_ref(value: &Value) -> Option<TermRef> {
    match value {
        Value::Number(number) => number.as_u64().map(|id| TermRef::Id(TermId(id))),
        Value::String(label) => Some(TermRef::Name(label.clone())),
        _ => None,
    }
}

/// Whether a resolved term should be kept
pub fn is_meaningful(term: &TermRef) -> bool {
    match term {
        TermRef::Id(TermId(id)) => *id != 0,
        TermRef::Name(label) => !label.is_empty() && label != "0",
    }
}
