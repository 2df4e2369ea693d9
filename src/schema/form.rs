//! Field types for form schemas (`new` and `edit`), and the attribute whitelist
//! a form schema implies for submitted values.

use crate::schema::{Extras, Field, Fields, FieldsBuilder};
use serde_json::{Map, Value};

pub const TEXT_TEMPLATE: &str = "form_field_text";
pub const TEXTAREA_TEMPLATE: &str = "form_field_textarea";
pub const SELECT_TEMPLATE: &str = "form_field_select";
pub const CHECKBOX_TEMPLATE: &str = "form_field_checkbox";
pub const HAS_MANY_TEMPLATE: &str = "form_generic_has_many";

/// Suffix of the submitted key carrying a nested group's rows.
pub const NESTED_ATTRIBUTES_SUFFIX: &str = "_attributes";

#[derive(Clone, Copy, Debug, Default)]
pub struct FormTypes;

impl FormTypes {
    pub fn generic(&self, template: impl Into<String>, extras: Extras) -> Field {
        Field::new(template, extras)
    }

    pub fn text(&self) -> Field {
        Field::new(TEXT_TEMPLATE, Extras::new())
    }

    pub fn textarea(&self) -> Field {
        Field::new(TEXTAREA_TEMPLATE, Extras::new())
    }

    /// Select box; `collection` is a list of values or `[label, value]` pairs.
    pub fn select(&self, collection: impl Into<Value>) -> Field {
        Field::new(SELECT_TEMPLATE, Extras::new().with("collection", collection))
    }

    pub fn checkbox(&self) -> Field {
        Field::new(CHECKBOX_TEMPLATE, Extras::new())
    }

    /// Nested group of fields for a has-many association read through `reader`.
    /// `declare` fills a builder of its own; its fields become the group's nested list.
    pub fn has_many(
        &self,
        reader: impl Into<String>,
        extras: Extras,
        declare: impl FnOnce(&mut FieldsBuilder, &FormTypes),
    ) -> Field {
        let nested = FieldsBuilder::nested(declare, self);
        Field::with_nested(HAS_MANY_TEMPLATE, extras.with("reader", reader.into()), nested)
    }
}

/// Attribute names a form accepts. Nested groups accept `<reader>_attributes`
/// as a list of rows limited to the group's own fields.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PermittedAttributes {
    pub scalars: Vec<String>,
    pub nested: Vec<(String, PermittedAttributes)>,
}

impl PermittedAttributes {
    pub fn from_fields(fields: &Fields) -> Self {
        let mut permitted = PermittedAttributes::default();
        for (name, field) in fields.iter() {
            match field.nested() {
                Some(nested) => {
                    let reader = field.reader().unwrap_or(name);
                    permitted.nested.push((
                        format!("{}{}", reader, NESTED_ATTRIBUTES_SUFFIX),
                        PermittedAttributes::from_fields(nested),
                    ));
                }
                None => permitted.scalars.push(name.to_string()),
            }
        }
        permitted
    }

    /// Keeps only permitted keys of `submitted`.
    pub fn filter(&self, submitted: &Map<String, Value>) -> Map<String, Value> {
        let mut out = Map::new();
        for (key, value) in submitted {
            if self.scalars.iter().any(|s| s == key) {
                out.insert(key.clone(), value.clone());
                continue;
            }
            let Some((_, nested)) = self.nested.iter().find(|(k, _)| k == key) else {
                tracing::debug!(attribute = %key, "dropping unpermitted attribute");
                continue;
            };
            if let Value::Array(rows) = value {
                let rows = rows
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|row| Value::Object(nested.filter_row(row)))
                    .collect();
                out.insert(key.clone(), Value::Array(rows));
            }
        }
        out
    }

    fn filter_row(&self, row: &Map<String, Value>) -> Map<String, Value> {
        let mut out = self.filter(row);
        for key in ["id", "_destroy"] {
            if let Some(v) = row.get(key) {
                out.insert(key.to_string(), v.clone());
            }
        }
        out
    }
}
