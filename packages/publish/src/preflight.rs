//! Generic page preflight.
//!
//! `BasicPreflight` runs a registry of structural checks over the parsed
//! page. Blockers make the page unsafe; warnings only lower the score.

use dve_dom::{parse_document, Document};
use serde::{Deserialize, Serialize};

pub const BLOCKER_PENALTY: i32 = 40;
pub const WARNING_PENALTY: i32 = 5;

/// Safety verdict for one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreflightReport {
    pub safe: bool,
    pub score: i32,
    pub blockers: Vec<String>,
    pub warnings: Vec<String>,
}

/// Evaluates a page before publish
pub trait PreflightEvaluator: Send + Sync {
    /// `html` is `None` when the page does not exist on disk
    fn evaluate(&self, page_path: &str, html: Option<&str>) -> PreflightReport;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingLevel {
    Blocker,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub level: FindingLevel,
    pub check: &'static str,
    pub message: String,
}

impl Finding {
    pub fn blocker(check: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: FindingLevel::Blocker,
            check,
            message: message.into(),
        }
    }

    pub fn warning(check: &'static str, message: impl Into<String>) -> Self {
        Self {
            level: FindingLevel::Warning,
            check,
            message: message.into(),
        }
    }
}

/// One structural check over a parsed page
pub trait PreflightCheck: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(&self, doc: &Document) -> Vec<Finding>;
}

pub struct RequireBody;

impl PreflightCheck for RequireBody {
    fn name(&self) -> &'static str {
        "require-body"
    }

    fn check(&self, doc: &Document) -> Vec<Finding> {
        match doc.body() {
            Some(_) => Vec::new(),
            None => vec![Finding::blocker(self.name(), "Page has no <body> element.")],
        }
    }
}

pub struct RequireTitle;

impl PreflightCheck for RequireTitle {
    fn name(&self) -> &'static str {
        "require-title"
    }

    fn check(&self, doc: &Document) -> Vec<Finding> {
        let has_title = doc
            .first_by_tag("title")
            .is_some_and(|title| !doc.text_content(title).trim().is_empty());
        if has_title {
            Vec::new()
        } else {
            vec![Finding::warning(self.name(), "Page has no <title>.")]
        }
    }
}

pub struct NoScriptUrls;

const URL_ATTRIBUTES: &[&str] = &["href", "src", "action", "formaction"];

impl PreflightCheck for NoScriptUrls {
    fn name(&self) -> &'static str {
        "no-script-urls"
    }

    fn check(&self, doc: &Document) -> Vec<Finding> {
        let count = doc
            .elements()
            .into_iter()
            .filter(|&node| {
                URL_ATTRIBUTES.iter().any(|attr| {
                    doc.attr(node, attr).is_some_and(|value| {
                        value.trim_start().to_ascii_lowercase().starts_with("javascript:")
                    })
                })
            })
            .count();
        if count == 0 {
            return Vec::new();
        }
        vec![Finding::warning(
            self.name(),
            format!("Page uses javascript: URLs on {} element(s).", count),
        )]
    }
}

pub struct BasicPreflight {
    checks: Vec<Box<dyn PreflightCheck>>,
}

impl BasicPreflight {
    pub fn new() -> Self {
        Self {
            checks: vec![Box::new(RequireBody), Box::new(RequireTitle), Box::new(NoScriptUrls)],
        }
    }

    pub fn with_check(mut self, check: Box<dyn PreflightCheck>) -> Self {
        self.checks.push(check);
        self
    }
}

impl Default for BasicPreflight {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BasicPreflight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.checks.iter().map(|c| c.name()).collect();
        f.debug_struct("BasicPreflight").field("checks", &names).finish()
    }
}

impl PreflightEvaluator for BasicPreflight {
    fn evaluate(&self, page_path: &str, html: Option<&str>) -> PreflightReport {
        let findings = match html.filter(|h| !h.trim().is_empty()) {
            None => vec![Finding::blocker(
                "page-content",
                format!("Page '{}' is empty or missing.", page_path),
            )],
            Some(html) => {
                let doc = parse_document(html);
                self.checks.iter().flat_map(|check| check.check(&doc)).collect()
            }
        };

        let (blockers, warnings): (Vec<Finding>, Vec<Finding>) = findings
            .into_iter()
            .partition(|f| f.level == FindingLevel::Blocker);
        let score = 100 - BLOCKER_PENALTY * blockers.len() as i32 - WARNING_PENALTY * warnings.len() as i32;

        PreflightReport {
            safe: blockers.is_empty(),
            score: score.max(0),
            blockers: blockers.into_iter().map(|f| f.message).collect(),
            warnings: warnings.into_iter().map(|f| f.message).collect(),
        }
    }
}
