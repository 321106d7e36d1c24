//! Overlay-specific preflight diagnostics.

use crate::preflight::PreflightReport;
use dve_model::{ConfidenceBucket, ElementMap, RevisionId, LOW_CONFIDENCE};
use dve_store::Tables;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceBuckets {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDiagnostics {
    pub unresolved_elements: usize,
    pub unresolved_bindings: usize,
    pub invalid_sections: usize,
    pub low_confidence_count: usize,
    pub confidence_buckets: ConfidenceBuckets,
}

impl OverlayDiagnostics {
    /// Diagnostics for one revision; no revision means an empty overlay.
    pub fn compute(tables: &Tables, revision_id: Option<RevisionId>) -> Self {
        let Some(revision_id) = revision_id else {
            return Self::default();
        };

        let maps = tables.element_maps_for(revision_id);
        let by_key: HashMap<String, &ElementMap> = maps
            .iter()
            .map(|m| (m.element_key.to_ascii_lowercase(), *m))
            .collect();
        let resolved = |key: &str| {
            by_key
                .get(&key.to_ascii_lowercase())
                .is_some_and(|m| m.is_resolved())
        };

        let mut diagnostics = Self {
            unresolved_elements: maps.iter().filter(|m| !m.is_resolved()).count(),
            unresolved_bindings: tables
                .action_bindings
                .iter()
                .filter(|b| b.revision_id == revision_id && !resolved(&b.element_key))
                .count(),
            invalid_sections: tables
                .section_instances
                .iter()
                .filter(|s| s.revision_id == revision_id)
                .filter_map(|s| s.target_key())
                .filter(|key| !resolved(key))
                .count(),
            low_confidence_count: maps.iter().filter(|m| m.confidence < LOW_CONFIDENCE).count(),
            confidence_buckets: ConfidenceBuckets::default(),
        };

        for map in &maps {
            match ConfidenceBucket::of(map.confidence) {
                ConfidenceBucket::High => diagnostics.confidence_buckets.high += 1,
                ConfidenceBucket::Medium => diagnostics.confidence_buckets.medium += 1,
                ConfidenceBucket::Low => diagnostics.confidence_buckets.low += 1,
            }
        }
        diagnostics
    }

    /// One warning per non-zero count
    pub fn warnings(&self) -> Vec<String> {
        [
            ("Overlay unresolved mapped elements", self.unresolved_elements),
            ("Overlay unresolved bindings", self.unresolved_bindings),
            ("Overlay invalid section targets", self.invalid_sections),
            ("Overlay low-confidence selectors", self.low_confidence_count),
        ]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(label, count)| format!("{}: {}.", label, count))
        .collect()
    }
}

/// Page preflight merged with overlay diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightOutcome {
    pub safe: bool,
    pub score: i32,
    pub blockers: Vec<String>,
    pub warnings: Vec<String>,
    pub dve_diagnostics: OverlayDiagnostics,
}

impl PreflightOutcome {
    pub fn new(report: PreflightReport, diagnostics: OverlayDiagnostics) -> Self {
        let mut warnings = report.warnings;
        warnings.extend(diagnostics.warnings());
        Self {
            safe: report.safe,
            score: report.score,
            blockers: report.blockers,
            warnings,
            dve_diagnostics: diagnostics,
        }
    }

    pub fn report(&self) -> PreflightReport {
        PreflightReport {
            safe: self.safe,
            score: self.score,
            blockers: self.blockers.clone(),
            warnings: self.warnings.clone(),
        }
    }
}
