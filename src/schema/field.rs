//! A single declarative field: renderer template, extras, optional nested fields.

use crate::inflect::{humanize, singularize};
use crate::schema::Fields;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Free-form field configuration (`label`, `reader`, `collection`, ...).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Extras(BTreeMap<String, Value>);

impl Extras {
    pub fn new() -> Self {
        Extras(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Entries of `other` override entries of `self`.
    pub fn merged(mut self, other: Extras) -> Self {
        self.0.extend(other.0);
        self
    }
}

impl From<serde_json::Map<String, Value>> for Extras {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        Extras(map.into_iter().collect())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Field {
    template: String,
    extras: Extras,
    #[serde(skip_serializing_if = "Option::is_none")]
    nested: Option<Fields>,
}

impl Field {
    pub fn new(template: impl Into<String>, extras: Extras) -> Self {
        Field {
            template: template.into(),
            extras,
            nested: None,
        }
    }

    pub fn with_nested(template: impl Into<String>, extras: Extras, nested: Fields) -> Self {
        Field {
            template: template.into(),
            extras,
            nested: Some(nested),
        }
    }

    /// Identifier of the partial that renders this field.
    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn extras(&self) -> &Extras {
        &self.extras
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    pub fn nested(&self) -> Option<&Fields> {
        self.nested.as_ref()
    }

    pub fn reader(&self) -> Option<&str> {
        self.extras.get("reader").and_then(Value::as_str)
    }

    /// Explicit `label`, else the singular humanized `reader`, else none.
    pub fn label(&self) -> Option<String> {
        if let Some(label) = self.extras.get("label") {
            return Some(match label {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
        }
        self.reader().map(|r| humanize(&singularize(r)))
    }

    pub(crate) fn with_nested_fields(&self, nested: Option<Fields>) -> Field {
        Field {
            template: self.template.clone(),
            extras: self.extras.clone(),
            nested,
        }
    }
}
