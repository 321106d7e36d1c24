//! Patch rows upserted and removed by natural key.
//!
//! | Row             | Natural key                                        |
//! |-----------------|----------------------------------------------------|
//! | PatchRule       | revision, element key, breakpoint, state, property |
//! | TextPatch       | revision, element key, text mode                   |
//! | SectionInstance | revision, instance id                              |
//! | ActionBinding   | revision, element key                              |
//!
//! Later writes overwrite earlier ones; there is no merge.

use crate::error::{StoreError, StoreResult};
use crate::tables::{next_id, Tables};
use chrono::{DateTime, Utc};
use dve_model::{
    ActionBehavior, ActionBinding, ActionType, Breakpoint, InsertMode, InteractionState,
    PatchRule, RevisionId, SectionInstance, SectionMarkup, TextMode, TextPatch, TriggerEvent,
};

pub const STYLE_RULE_TYPE: &str = "style";

#[derive(Debug, Clone, PartialEq)]
pub struct StylePatch {
    pub element_key: String,
    pub breakpoint: Breakpoint,
    pub state: InteractionState,
    pub property: String,
    pub value: String,
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionPatch {
    /// Existing instance to overwrite; `None` appends a new one
    pub instance_id: Option<i64>,
    pub template_id: String,
    pub insert_mode: InsertMode,
    pub target_element_key: Option<String>,
    pub markup: SectionMarkup,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BindingPatch {
    pub element_key: String,
    pub action_type: ActionType,
    pub workflow_id: Option<String>,
    pub navigate_url: Option<String>,
    pub trigger_event: TriggerEvent,
    pub behavior: ActionBehavior,
}

impl Tables {
    pub fn upsert_rule(&mut self, revision_id: RevisionId, patch: &StylePatch, now: DateTime<Utc>) -> PatchRule {
        let existing = self.rules.iter_mut().find(|r| {
            r.revision_id == revision_id
                && r.element_key == patch.element_key
                && r.breakpoint == patch.breakpoint
                && r.state == patch.state
                && r.property == patch.property
        });
        if let Some(rule) = existing {
            rule.value = patch.value.clone();
            rule.priority = patch.priority;
            return rule.clone();
        }

        let rule = PatchRule {
            id: next_id(&mut self.sequences.rule),
            revision_id,
            element_key: patch.element_key.clone(),
            rule_type: STYLE_RULE_TYPE.to_string(),
            breakpoint: patch.breakpoint,
            state: patch.state,
            property: patch.property.clone(),
            value: patch.value.clone(),
            priority: patch.priority,
            created_at_utc: now,
        };
        self.rules.push(rule.clone());
        rule
    }

    pub fn remove_rule(
        &mut self,
        revision_id: RevisionId,
        element_key: &str,
        breakpoint: Breakpoint,
        state: InteractionState,
        property: &str,
    ) -> StoreResult<PatchRule> {
        let index = self
            .rules
            .iter()
            .position(|r| {
                r.revision_id == revision_id
                    && r.element_key == element_key
                    && r.breakpoint == breakpoint
                    && r.state == state
                    && r.property == property
            })
            .ok_or_else(|| {
                StoreError::not_found(format!(
                    "Style rule '{}' on '{}' ({}, {}) not found.",
                    property, element_key, breakpoint, state
                ))
            })?;
        Ok(self.rules.remove(index))
    }

    pub fn upsert_text(
        &mut self,
        revision_id: RevisionId,
        element_key: &str,
        text_mode: TextMode,
        content: &str,
        now: DateTime<Utc>,
    ) -> TextPatch {
        let existing = self.text_patches.iter_mut().find(|t| {
            t.revision_id == revision_id && t.element_key == element_key && t.text_mode == text_mode
        });
        if let Some(patch) = existing {
            patch.content = content.to_string();
            return patch.clone();
        }

        let patch = TextPatch {
            id: next_id(&mut self.sequences.text_patch),
            revision_id,
            element_key: element_key.to_string(),
            text_mode,
            content: content.to_string(),
            created_at_utc: now,
        };
        self.text_patches.push(patch.clone());
        patch
    }

    pub fn remove_text(
        &mut self,
        revision_id: RevisionId,
        element_key: &str,
        text_mode: TextMode,
    ) -> StoreResult<TextPatch> {
        let index = self
            .text_patches
            .iter()
            .position(|t| {
                t.revision_id == revision_id && t.element_key == element_key && t.text_mode == text_mode
            })
            .ok_or_else(|| {
                StoreError::not_found(format!("Text patch '{}' ({}) not found.", element_key, text_mode))
            })?;
        Ok(self.text_patches.remove(index))
    }

    /// Overwrite the instance named by `patch.instance_id` when it belongs to
    /// this revision, otherwise append a new instance.
    pub fn upsert_section(
        &mut self,
        revision_id: RevisionId,
        patch: &SectionPatch,
        now: DateTime<Utc>,
    ) -> SectionInstance {
        let existing = patch.instance_id.and_then(|id| {
            self.section_instances
                .iter_mut()
                .find(|s| s.revision_id == revision_id && s.id == id)
        });
        if let Some(section) = existing {
            section.template_id = patch.template_id.clone();
            section.insert_mode = patch.insert_mode;
            section.target_element_key = patch.target_element_key.clone();
            section.markup = patch.markup.clone();
            return section.clone();
        }

        let section = SectionInstance {
            id: next_id(&mut self.sequences.section),
            revision_id,
            template_id: patch.template_id.clone(),
            insert_mode: patch.insert_mode,
            target_element_key: patch.target_element_key.clone(),
            markup: patch.markup.clone(),
            created_at_utc: now,
        };
        self.section_instances.push(section.clone());
        section
    }

    pub fn remove_section(&mut self, revision_id: RevisionId, instance_id: i64) -> StoreResult<SectionInstance> {
        let index = self
            .section_instances
            .iter()
            .position(|s| s.revision_id == revision_id && s.id == instance_id)
            .ok_or_else(|| StoreError::not_found(format!("Section instance {} not found.", instance_id)))?;
        Ok(self.section_instances.remove(index))
    }

    pub fn upsert_binding(
        &mut self,
        revision_id: RevisionId,
        patch: &BindingPatch,
        now: DateTime<Utc>,
    ) -> ActionBinding {
        let existing = self
            .action_bindings
            .iter_mut()
            .find(|b| b.revision_id == revision_id && b.element_key == patch.element_key);
        if let Some(binding) = existing {
            binding.action_type = patch.action_type;
            binding.workflow_id = patch.workflow_id.clone();
            binding.navigate_url = patch.navigate_url.clone();
            binding.trigger_event = patch.trigger_event;
            binding.behavior = patch.behavior.clone();
            return binding.clone();
        }

        let binding = ActionBinding {
            id: next_id(&mut self.sequences.binding),
            revision_id,
            element_key: patch.element_key.clone(),
            action_type: patch.action_type,
            workflow_id: patch.workflow_id.clone(),
            navigate_url: patch.navigate_url.clone(),
            trigger_event: patch.trigger_event,
            behavior: patch.behavior.clone(),
            created_at_utc: now,
        };
        self.action_bindings.push(binding.clone());
        binding
    }

    pub fn remove_binding(&mut self, revision_id: RevisionId, element_key: &str) -> StoreResult<ActionBinding> {
        let index = self
            .action_bindings
            .iter()
            .position(|b| b.revision_id == revision_id && b.element_key == element_key)
            .ok_or_else(|| StoreError::not_found(format!("Action binding '{}' not found.", element_key)))?;
        Ok(self.action_bindings.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(value: &str) -> StylePatch {
        StylePatch {
            element_key: "hero".into(),
            breakpoint: Breakpoint::Desktop,
            state: InteractionState::Base,
            property: "color".into(),
            value: value.into(),
            priority: 0,
        }
    }

    #[test]
    fn test_rule_upsert_overwrites_value() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let first = tables.upsert_rule(1, &color("red"), now);
        let second = tables.upsert_rule(1, &color("blue"), now);
        assert_eq!(first.id, second.id);
        assert_eq!(tables.rules.len(), 1);
        assert_eq!(tables.rules[0].value, "blue");
        assert_eq!(tables.rules[0].rule_type, "style");

        let hover = StylePatch {
            state: InteractionState::Hover,
            ..color("green")
        };
        tables.upsert_rule(1, &hover, now);
        assert_eq!(tables.rules.len(), 2);
    }

    #[test]
    fn test_text_is_unique_per_mode() {
        let mut tables = Tables::default();
        let now = Utc::now();
        tables.upsert_text(1, "hero", TextMode::Plain, "a", now);
        tables.upsert_text(1, "hero", TextMode::Plain, "b", now);
        tables.upsert_text(1, "hero", TextMode::Html, "<b>c</b>", now);
        assert_eq!(tables.text_patches.len(), 2);
        assert_eq!(tables.text_patches[0].content, "b");

        tables.remove_text(1, "hero", TextMode::Html).unwrap();
        assert!(tables.remove_text(1, "hero", TextMode::Html).is_err());
    }

    #[test]
    fn test_section_upsert_by_instance_id() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let mut patch = SectionPatch {
            instance_id: None,
            template_id: "hero-banner".into(),
            insert_mode: InsertMode::After,
            target_element_key: Some("hero".into()),
            markup: SectionMarkup::new("<section>1</section>"),
        };
        let created = tables.upsert_section(1, &patch, now);
        tables.upsert_section(1, &patch, now);
        assert_eq!(tables.section_instances.len(), 2);

        patch.instance_id = Some(created.id);
        patch.markup = SectionMarkup::new("<section>2</section>");
        let updated = tables.upsert_section(1, &patch, now);
        assert_eq!(updated.id, created.id);
        assert_eq!(tables.section_instances.len(), 2);

        // An id from another revision never matches.
        let other = tables.upsert_section(2, &patch, now);
        assert_ne!(other.id, created.id);
    }

    #[test]
    fn test_binding_is_unique_per_element() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let mut patch = BindingPatch {
            element_key: "cta".into(),
            action_type: ActionType::Navigate,
            workflow_id: None,
            navigate_url: Some("/a".into()),
            trigger_event: TriggerEvent::Auto,
            behavior: ActionBehavior::default_for(ActionType::Navigate),
        };
        tables.upsert_binding(1, &patch, now);
        patch.navigate_url = Some("/b".into());
        tables.upsert_binding(1, &patch, now);
        assert_eq!(tables.action_bindings.len(), 1);
        assert_eq!(tables.action_bindings[0].navigate_url.as_deref(), Some("/b"));

        tables.remove_binding(1, "cta").unwrap();
        assert!(matches!(tables.remove_binding(1, "cta"), Err(StoreError::NotFound(_))));
    }
}
