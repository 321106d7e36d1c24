//! Style-rule diff between two revisions.

use crate::error::{PublishError, PublishResult};
use dve_model::RevisionId;
use dve_store::Tables;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionDiff {
    pub from: RevisionId,
    pub to: RevisionId,
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Always empty: a changed value shows up as one removal plus one addition
    pub changed: Vec<String>,
}

/// Tuples of `left` absent from `right`, compared case-insensitively,
/// distinct, in first-appearance order
fn except(left: &[String], right: &[String]) -> Vec<String> {
    let right: Vec<String> = right.iter().map(|t| t.to_lowercase()).collect();
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for tuple in left {
        let folded = tuple.to_lowercase();
        if right.contains(&folded) || seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        out.push(tuple.clone());
    }
    out
}

/// Diff the style rules of two revisions of the same project.
pub fn diff_revisions(tables: &Tables, from: RevisionId, to: RevisionId) -> PublishResult<RevisionDiff> {
    let (Some(from_rev), Some(to_rev)) = (tables.revision(from), tables.revision(to)) else {
        return Err(PublishError::not_found("Revisions not found."));
    };
    if from_rev.project_id != to_rev.project_id {
        return Err(PublishError::not_found("Revisions not found."));
    }

    let tuples = |revision_id| -> Vec<String> {
        tables
            .rules_for(revision_id)
            .into_iter()
            .map(|rule| rule.diff_tuple())
            .collect()
    };
    let from_rules = tuples(from);
    let to_rules = tuples(to);

    Ok(RevisionDiff {
        from,
        to,
        added: except(&to_rules, &from_rules),
        removed: except(&from_rules, &to_rules),
        changed: Vec::new(),
    })
}
