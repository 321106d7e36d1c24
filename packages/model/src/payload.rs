//! Typed payloads for section markup and action behavior.
//!
//! Behavior arrives as free-form JSON from the editor. It is decoded into the
//! variant matching the binding's action type; anything that does not fit is
//! kept verbatim as [`ActionBehavior::Opaque`].

use crate::types::ActionType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Markup, stylesheet and script carried by one section instance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionMarkup {
    pub html: String,
    pub css: String,
    pub js: String,
}

impl SectionMarkup {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = css.into();
        self
    }

    pub fn with_js(mut self, js: impl Into<String>) -> Self {
        self.js = js.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct NavigateBehavior {
    pub open_in_new_tab: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct WorkflowBehavior {
    pub prevent_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct HybridBehavior {
    pub open_in_new_tab: bool,
    pub prevent_default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
}

/// Behavior flags for an action binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionBehavior {
    Navigate(NavigateBehavior),
    Workflow(WorkflowBehavior),
    Hybrid(HybridBehavior),
    Opaque(Value),
}

impl ActionBehavior {
    /// Decode raw behavior JSON for a binding of `action_type`.
    pub fn decode(action_type: ActionType, raw: Option<Value>) -> Self {
        let raw = match raw {
            None | Some(Value::Null) => Value::Object(Default::default()),
            Some(value) => value,
        };

        let typed = match action_type {
            ActionType::Navigate => serde_json::from_value(raw.clone()).map(Self::Navigate),
            ActionType::Workflow => serde_json::from_value(raw.clone()).map(Self::Workflow),
            ActionType::Hybrid => serde_json::from_value(raw.clone()).map(Self::Hybrid),
        };

        typed.unwrap_or(Self::Opaque(raw))
    }

    pub fn default_for(action_type: ActionType) -> Self {
        Self::decode(action_type, None)
    }

    pub fn open_in_new_tab(&self) -> bool {
        match self {
            Self::Navigate(b) => b.open_in_new_tab,
            Self::Hybrid(b) => b.open_in_new_tab,
            Self::Workflow(_) => false,
            Self::Opaque(value) => flag(value, "openInNewTab"),
        }
    }

    pub fn prevent_default(&self) -> bool {
        match self {
            Self::Workflow(b) => b.prevent_default,
            Self::Hybrid(b) => b.prevent_default,
            Self::Navigate(_) => false,
            Self::Opaque(value) => flag(value, "preventDefault"),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_navigate() {
        let behavior = ActionBehavior::decode(ActionType::Navigate, Some(json!({"openInNewTab": true})));
        assert_eq!(
            behavior,
            ActionBehavior::Navigate(NavigateBehavior { open_in_new_tab: true })
        );
        assert!(behavior.open_in_new_tab());
    }

    #[test]
    fn test_missing_behavior_is_default_variant() {
        let behavior = ActionBehavior::default_for(ActionType::Workflow);
        assert_eq!(behavior, ActionBehavior::Workflow(WorkflowBehavior::default()));
    }

    #[test]
    fn test_unknown_fields_fall_back_to_opaque() {
        let raw = json!({"openInNewTab": true, "confetti": "yes"});
        let behavior = ActionBehavior::decode(ActionType::Navigate, Some(raw.clone()));
        assert_eq!(behavior, ActionBehavior::Opaque(raw));
        assert!(behavior.open_in_new_tab());
    }

    #[test]
    fn test_hybrid_flags() {
        let behavior = ActionBehavior::decode(
            ActionType::Hybrid,
            Some(json!({"openInNewTab": false, "preventDefault": true})),
        );
        assert!(behavior.prevent_default());
        assert!(!behavior.open_in_new_tab());
    }

    #[test]
    fn test_section_markup_defaults() {
        let markup: SectionMarkup = serde_json::from_value(json!({"html": "<p>x</p>"})).unwrap();
        assert_eq!(markup, SectionMarkup::new("<p>x</p>"));
        assert!(markup.css.is_empty());
    }
}
