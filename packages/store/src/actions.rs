//! Action registry: which fields and triggers each action type accepts.

use dve_model::{ActionType, TriggerEvent};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub key: ActionType,
    pub required_fields: &'static [&'static str],
    pub optional_fields: &'static [&'static str],
    pub allowed_trigger_events: &'static [TriggerEvent],
    pub runtime_handler_key: &'static str,
    pub supports_simulation: bool,
}

const OPTIONAL: &[&str] = &["triggerEvent", "behavior"];
const ALL_TRIGGERS: &[TriggerEvent] = &[TriggerEvent::Auto, TriggerEvent::Click, TriggerEvent::Submit];

pub static ACTION_REGISTRY: &[ActionDefinition] = &[
    ActionDefinition {
        key: ActionType::Navigate,
        required_fields: &["navigateUrl"],
        optional_fields: OPTIONAL,
        allowed_trigger_events: ALL_TRIGGERS,
        runtime_handler_key: "navigate",
        supports_simulation: true,
    },
    ActionDefinition {
        key: ActionType::Workflow,
        required_fields: &["workflowId"],
        optional_fields: OPTIONAL,
        allowed_trigger_events: ALL_TRIGGERS,
        runtime_handler_key: "workflow",
        supports_simulation: true,
    },
    ActionDefinition {
        key: ActionType::Hybrid,
        required_fields: &["workflowId", "navigateUrl"],
        optional_fields: OPTIONAL,
        allowed_trigger_events: ALL_TRIGGERS,
        runtime_handler_key: "hybrid",
        supports_simulation: true,
    },
];

/// Definition for a raw action type string, case-insensitive
pub fn action_definition(raw: &str) -> Option<&'static ActionDefinition> {
    let action_type: ActionType = raw.parse().ok()?;
    ACTION_REGISTRY.iter().find(|d| d.key == action_type)
}

impl ActionDefinition {
    pub fn allows(&self, trigger: TriggerEvent) -> bool {
        self.allowed_trigger_events.contains(&trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_action_type_is_registered() {
        for action_type in ActionType::ALL {
            let definition = action_definition(action_type.as_str()).unwrap();
            assert!(definition.supports_simulation);
            assert!(definition.allows(TriggerEvent::Submit));
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(action_definition(" Hybrid ").unwrap().required_fields.len(), 2);
        assert!(action_definition("teleport").is_none());
        assert!(action_definition("").is_none());
    }
}
