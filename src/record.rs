//! Records handed between the pipeline and the storage collaborator.

use serde::Serialize;
use serde_json::{Map, Value};

/// Parent resource a record is scoped under (nested routes).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ParentRef {
    pub resource: String,
    pub id: String,
}

/// Route-bound location of the record(s) a request addresses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Scope {
    pub resource: String,
    pub id: Option<String>,
    pub parent: Option<ParentRef>,
}

impl Scope {
    pub fn collection(resource: impl Into<String>) -> Self {
        Scope {
            resource: resource.into(),
            id: None,
            parent: None,
        }
    }

    pub fn member(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Scope {
            resource: resource.into(),
            id: Some(id.into()),
            parent: None,
        }
    }

    pub fn under(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub resource: String,
    pub id: Option<Value>,
    pub attributes: Map<String, Value>,
    pub errors: Vec<FieldError>,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentRef>,
}

impl Record {
    /// Unpersisted record with no attributes.
    pub fn new(resource: impl Into<String>) -> Self {
        Record {
            resource: resource.into(),
            id: None,
            attributes: Map::new(),
            errors: Vec::new(),
            persisted: false,
            parent: None,
        }
    }

    /// Persisted record from a stored row; the id is read from `pk`.
    pub fn from_row(resource: impl Into<String>, pk: &str, row: Map<String, Value>) -> Self {
        let id = row.get(pk).filter(|v| !v.is_null()).cloned();
        Record {
            resource: resource.into(),
            id,
            attributes: row,
            errors: Vec::new(),
            persisted: true,
            parent: None,
        }
    }

    pub fn get(&self, attr: &str) -> Option<&Value> {
        self.attributes.get(attr)
    }

    pub fn set(&mut self, attr: impl Into<String>, value: Value) {
        self.attributes.insert(attr.into(), value);
    }

    pub fn id_string(&self) -> Option<String> {
        self.id.as_ref().and_then(value_to_param)
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn errors_on(&self, field: &str) -> Vec<&str> {
        self.errors
            .iter()
            .filter(|e| e.field == field)
            .map(|e| e.message.as_str())
            .collect()
    }
}

/// Render a scalar JSON value as a path/query parameter.
pub fn value_to_param(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_row_reads_id() {
        let row = json!({ "id": 7, "name": "Picard" });
        let record = Record::from_row("members", "id", row.as_object().unwrap().clone());
        assert!(record.persisted);
        assert_eq!(record.id_string().as_deref(), Some("7"));
        assert_eq!(record.get("name"), Some(&json!("Picard")));
    }

    #[test]
    fn test_errors_on_field() {
        let mut record = Record::new("members");
        record.add_error("name", "is required");
        record.add_error("rank", "is invalid");
        assert!(!record.is_valid());
        assert_eq!(record.errors_on("name"), vec!["is required"]);
        assert!(record.errors_on("position").is_empty());
    }
}
