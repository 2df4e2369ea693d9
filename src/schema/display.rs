//! Field types for display schemas (index columns, show rows, CSV columns).

use crate::schema::{Extras, Field};
use serde_json::Value;

pub const STRING_TEMPLATE: &str = "display_string";
pub const BADGE_TEMPLATE: &str = "display_badge";
pub const RICH_TEXT_TEMPLATE: &str = "display_rich_text";
pub const ACTIONS_TEMPLATE: &str = "display_actions";

#[derive(Clone, Copy, Debug, Default)]
pub struct DisplayTypes;

impl DisplayTypes {
    pub fn string(&self) -> Field {
        Field::new(STRING_TEMPLATE, Extras::new())
    }

    /// Value rendered as a badge; `colors` maps values to badge colors.
    pub fn badge(&self, colors: impl Into<Value>) -> Field {
        Field::new(BADGE_TEMPLATE, Extras::new().with("colors", colors))
    }

    pub fn rich_text(&self) -> Field {
        Field::new(RICH_TEXT_TEMPLATE, Extras::new())
    }

    /// Column holding the per-record action menu.
    pub fn actions(&self) -> Field {
        Field::new(ACTIONS_TEMPLATE, Extras::new().with("label", "Actions"))
    }

    pub fn manual(&self, template: impl Into<String>, extras: Extras) -> Field {
        Field::new(template, extras)
    }
}
