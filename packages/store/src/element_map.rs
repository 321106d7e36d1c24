//! Element identity map upsert.
//!
//! ```text
//! stored: primary=#old  fallbacks=[.a]
//! upsert: selector=#new fallbacks=[.b, .a]
//! result: primary=#new  fallbacks=[.a, #old, .b]
//! ```

use crate::tables::{next_id, Tables};
use chrono::{DateTime, Utc};
use dve_model::{
    compute_confidence, sha256_hex, ConfidenceInputs, ElementMap, RevisionId,
    MAX_FALLBACK_SELECTORS,
};
use tracing::debug;

/// Identity signal reported by the editor for one element
#[derive(Debug, Clone, Default)]
pub struct ElementMapUpsert {
    pub element_key: String,
    pub selector: String,
    pub fallback_selectors: Vec<String>,
    pub fingerprint_hash: Option<String>,
    pub anchor_hash: Option<String>,
}

impl ElementMapUpsert {
    pub fn new(element_key: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            element_key: element_key.into(),
            selector: selector.into(),
            ..Default::default()
        }
    }

    pub fn with_fallbacks<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_selectors = fallbacks.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint_hash = Some(fingerprint.into());
        self
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Append `extra` to `list`, trimming, skipping blanks and duplicates, capped.
fn merge_fallbacks<'a>(list: &mut Vec<String>, extra: impl IntoIterator<Item = &'a str>) {
    for candidate in extra {
        let candidate = candidate.trim();
        if candidate.is_empty() || list.iter().any(|s| s == candidate) {
            continue;
        }
        list.push(candidate.to_string());
    }
    list.truncate(MAX_FALLBACK_SELECTORS);
}

impl Tables {
    /// Create or merge the identity row for `(revision_id, element_key)`.
    pub fn upsert_element_map(
        &mut self,
        revision_id: RevisionId,
        upsert: &ElementMapUpsert,
        now: DateTime<Utc>,
    ) -> ElementMap {
        let key = upsert.element_key.trim();
        let selector = upsert.selector.trim();
        let fingerprint = non_blank(upsert.fingerprint_hash.as_deref());
        let anchor = non_blank(upsert.anchor_hash.as_deref());

        let index = match self
            .element_maps
            .iter()
            .position(|m| m.revision_id == revision_id && m.element_key == key)
        {
            Some(index) => index,
            None => {
                self.element_maps.push(ElementMap {
                    id: next_id(&mut self.sequences.element_map),
                    revision_id,
                    element_key: key.to_string(),
                    primary_selector: String::new(),
                    fallback_selectors: Vec::new(),
                    fingerprint_hash: String::new(),
                    anchor_hash: String::new(),
                    confidence: 0.0,
                    last_resolved_selector: None,
                    last_resolved_at_utc: None,
                    created_at_utc: now,
                });
                debug!(revision_id, element_key = key, "created element map");
                self.element_maps.len() - 1
            }
        };

        let map = &mut self.element_maps[index];

        if !selector.is_empty() && map.primary_selector != selector {
            let previous = std::mem::replace(&mut map.primary_selector, selector.to_string());
            if !previous.trim().is_empty() {
                merge_fallbacks(&mut map.fallback_selectors, [previous.as_str()]);
            }
        }
        merge_fallbacks(
            &mut map.fallback_selectors,
            upsert.fallback_selectors.iter().map(String::as_str),
        );
        // The primary never doubles as its own fallback.
        let primary = map.primary_selector.clone();
        map.fallback_selectors.retain(|s| *s != primary);

        if let Some(fingerprint) = fingerprint {
            map.fingerprint_hash = fingerprint.to_string();
        } else if map.fingerprint_hash.is_empty() && !map.primary_selector.is_empty() {
            map.fingerprint_hash = sha256_hex(map.primary_selector.as_bytes());
        }
        if let Some(anchor) = anchor {
            map.anchor_hash = anchor.to_string();
        } else if map.anchor_hash.is_empty() && !map.primary_selector.is_empty() {
            map.anchor_hash = sha256_hex(map.element_key.as_bytes());
        }

        if !selector.is_empty() {
            map.mark_resolved(selector, now);
        }

        map.confidence = compute_confidence(ConfidenceInputs {
            has_selector: !map.primary_selector.is_empty(),
            fallback_count: map.fallback_selectors.len(),
            has_fingerprint: !map.fingerprint_hash.is_empty(),
        });

        map.clone()
    }
}
