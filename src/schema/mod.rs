//! Declarative display and form schemas, resolved per request against the
//! active action and output format.
//!
//! A base `Schema` is declared once and shared read-only. `Schema::apply` always
//! returns a new `ResolvedSchema`; the base is never modified.

mod builder;
pub mod display;
mod field;
pub mod form;

pub use builder::{Fields, FieldsBuilder};
pub use display::DisplayTypes;
pub use field::{Extras, Field};
pub use form::{FormTypes, PermittedAttributes};

use crate::action::{Action, ActionKind};
use crate::format::Format;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    Display,
    Form,
}

/// Host policy deciding which fields apply to an action/format pair.
/// `path` is the field name, dotted for nested fields (`members.name`).
pub trait FieldPolicy: Send + Sync {
    fn includes(&self, path: &str, field: &Field, action: &Action, format: Format) -> bool;
}

impl<F> FieldPolicy for F
where
    F: Fn(&str, &Field, &Action, Format) -> bool + Send + Sync,
{
    fn includes(&self, path: &str, field: &Field, action: &Action, format: Format) -> bool {
        self(path, field, action, format)
    }
}

/// Every field applies everywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllFields;

impl FieldPolicy for AllFields {
    fn includes(&self, _path: &str, _field: &Field, _action: &Action, _format: Format) -> bool {
        true
    }
}

/// Per-field action/format lists. `None` means unrestricted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldVisibility {
    pub actions: Option<Vec<ActionKind>>,
    pub formats: Option<Vec<Format>>,
}

/// Visibility declared in configuration, keyed by field path.
#[derive(Clone, Debug, Default)]
pub struct DeclaredVisibility {
    rules: HashMap<String, FieldVisibility>,
}

impl DeclaredVisibility {
    pub fn new() -> Self {
        DeclaredVisibility::default()
    }

    pub fn restrict(&mut self, path: impl Into<String>, visibility: FieldVisibility) {
        self.rules.insert(path.into(), visibility);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl FieldPolicy for DeclaredVisibility {
    fn includes(&self, path: &str, _field: &Field, action: &Action, format: Format) -> bool {
        let Some(rule) = self.rules.get(path) else { return true };
        let action_ok = rule.actions.as_ref().map(|a| a.contains(&action.kind)).unwrap_or(true);
        let format_ok = rule.formats.as_ref().map(|f| f.contains(&format)).unwrap_or(true);
        action_ok && format_ok
    }
}

#[derive(Clone)]
pub struct Schema {
    flavor: Flavor,
    fields: Fields,
    policy: Arc<dyn FieldPolicy>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("flavor", &self.flavor)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Schema {
    pub fn display(declare: impl FnOnce(&mut FieldsBuilder, &DisplayTypes)) -> Self {
        let fields = FieldsBuilder::nested(declare, &DisplayTypes);
        Schema::from_fields(Flavor::Display, fields)
    }

    pub fn form(declare: impl FnOnce(&mut FieldsBuilder, &FormTypes)) -> Self {
        let fields = FieldsBuilder::nested(declare, &FormTypes);
        Schema::from_fields(Flavor::Form, fields)
    }

    pub fn from_fields(flavor: Flavor, fields: Fields) -> Self {
        Schema {
            flavor,
            fields,
            policy: Arc::new(AllFields),
        }
    }

    pub fn with_policy(mut self, policy: impl FieldPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Request-scoped copy of the fields that apply to `action` and `format`, in declared order.
    pub fn apply(&self, action: &Action, format: Format) -> ResolvedSchema {
        ResolvedSchema {
            flavor: self.flavor,
            action: *action,
            format,
            fields: self.select(&self.fields, None, action, format),
        }
    }

    fn select(&self, fields: &Fields, prefix: Option<&str>, action: &Action, format: Format) -> Fields {
        fields
            .iter()
            .filter_map(|(name, field)| {
                let path = match prefix {
                    Some(p) => format!("{}.{}", p, name),
                    None => name.to_string(),
                };
                if !self.policy.includes(&path, field, action, format) {
                    return None;
                }
                let nested = field.nested().map(|n| self.select(n, Some(&path), action, format));
                Some((name.to_string(), field.with_nested_fields(nested)))
            })
            .collect()
    }

    /// Submitted attribute whitelist implied by this schema's fields.
    pub fn permitted_attributes(&self) -> PermittedAttributes {
        PermittedAttributes::from_fields(&self.fields)
    }
}

/// A schema resolved for one request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResolvedSchema {
    pub flavor: Flavor,
    pub action: Action,
    pub format: Format,
    pub fields: Fields,
}
