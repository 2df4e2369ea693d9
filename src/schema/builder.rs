//! Ordered field maps and the explicit builder used to declare them.

use crate::schema::Field;
use indexmap::IndexMap;
use serde::Serialize;

/// Ordered name -> field map. Insertion order is the render order.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(IndexMap<String, Field>);

impl Fields {
    /// Inserts or replaces a field. A replaced field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        self.0.insert(name.into(), field);
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Field)> for Fields {
    fn from_iter<I: IntoIterator<Item = (String, Field)>>(iter: I) -> Self {
        Fields(iter.into_iter().collect())
    }
}

/// Collects field declarations. Nested groups get their own child builder, so
/// insertions made while declaring a group never reach the enclosing builder.
#[derive(Debug, Default)]
pub struct FieldsBuilder {
    fields: Fields,
}

impl FieldsBuilder {
    pub fn new() -> Self {
        FieldsBuilder::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) -> &mut Self {
        self.fields.insert(name, field);
        self
    }

    /// Runs `declare` against a fresh child builder and returns what it collected.
    pub fn nested<T>(declare: impl FnOnce(&mut FieldsBuilder, &T), types: &T) -> Fields {
        let mut child = FieldsBuilder::new();
        declare(&mut child, types);
        child.finish()
    }

    pub fn finish(self) -> Fields {
        self.fields
    }
}
