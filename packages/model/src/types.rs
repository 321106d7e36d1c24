//! Closed vocabularies used by overlay rows.
//!
//! Requests carry these as loose strings. `parse_or_default` trims and
//! lowercases, maps an empty value to the default variant and rejects
//! anything unknown.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type ProjectId = i64;
pub type RevisionId = i64;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal, default = $default:ident) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Lenient parse for request fields: blank means the default.
            pub fn parse_or_default(raw: Option<&str>) -> ModelResult<Self> {
                match raw.map(str::trim) {
                    None | Some("") => Ok($name::$default),
                    Some(value) => value.parse(),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(ModelError::unknown($kind, other)),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Deployment environment a revision belongs to
    Environment ("environment", default = Draft) {
        Draft => "draft",
        Staging => "staging",
        Live => "live",
    }
}

string_enum! {
    RevisionStatus ("revision status", default = Draft) {
        Draft => "draft",
        Published => "published",
    }
}

string_enum! {
    /// Viewport bucket a style rule targets
    Breakpoint ("breakpoint", default = Desktop) {
        Desktop => "desktop",
        Tablet => "tablet",
        Mobile => "mobile",
    }
}

string_enum! {
    /// Interaction state a style rule targets
    InteractionState ("state", default = Base) {
        Base => "base",
        Hover => "hover",
        Focus => "focus",
        Active => "active",
    }
}

string_enum! {
    TextMode ("text mode", default = Plain) {
        Plain => "plain",
        Html => "html",
    }
}

string_enum! {
    /// Where a section instance lands relative to its target
    InsertMode ("insert mode", default = After) {
        Before => "before",
        After => "after",
        InsideStart => "inside-start",
        InsideEnd => "inside-end",
    }
}

string_enum! {
    ActionType ("action type", default = Navigate) {
        Navigate => "navigate",
        Workflow => "workflow",
        Hybrid => "hybrid",
    }
}

string_enum! {
    /// DOM event that fires an action binding. `Auto` picks by element tag.
    TriggerEvent ("trigger event", default = Auto) {
        Auto => "auto",
        Click => "click",
        Submit => "submit",
    }
}

impl Breakpoint {
    /// Media query wrapping rules for this breakpoint; desktop is unwrapped.
    pub fn media_query(&self) -> Option<&'static str> {
        match self {
            Breakpoint::Desktop => None,
            Breakpoint::Tablet => Some("(min-width: 768px) and (max-width: 1024px)"),
            Breakpoint::Mobile => Some("(max-width: 767px)"),
        }
    }
}

impl InteractionState {
    pub fn pseudo_class(&self) -> &'static str {
        match self {
            InteractionState::Base => "",
            InteractionState::Hover => ":hover",
            InteractionState::Focus => ":focus",
            InteractionState::Active => ":active",
        }
    }
}

impl ActionType {
    pub fn navigates(&self) -> bool {
        matches!(self, ActionType::Navigate | ActionType::Hybrid)
    }

    pub fn runs_workflow(&self) -> bool {
        matches!(self, ActionType::Workflow | ActionType::Hybrid)
    }
}

impl TriggerEvent {
    /// Concrete DOM event type for an element with the given tag name
    pub fn event_type_for(&self, tag: &str) -> &'static str {
        match self {
            TriggerEvent::Click => "click",
            TriggerEvent::Submit => "submit",
            TriggerEvent::Auto if tag.eq_ignore_ascii_case("form") => "submit",
            TriggerEvent::Auto => "click",
        }
    }
}
