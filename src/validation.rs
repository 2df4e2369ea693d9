//! Record validation from declared per-attribute rules. Errors are collected on
//! the record so the form can be re-rendered with them.

use crate::record::Record;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

pub struct RecordValidator;

impl RecordValidator {
    /// Replaces the record's errors with the result of checking every rule.
    /// Returns whether the record is valid.
    pub fn validate<'a>(record: &mut Record, rules: impl IntoIterator<Item = (&'a String, &'a ValidationRule)>) -> bool {
        record.errors.clear();
        for (attr, rule) in rules {
            let val = record.get(attr).cloned().unwrap_or(Value::Null);
            if rule.required == Some(true) && is_blank(&val) {
                record.add_error(attr.as_str(), "can't be blank");
                continue;
            }
            if let Err(message) = validate_value(&val, rule) {
                record.add_error(attr.as_str(), message);
            }
        }
        record.errors.sort_by(|a, b| a.field.cmp(&b.field));
        record.is_valid()
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn validate_value(v: &Value, rule: &ValidationRule) -> Result<(), String> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        validate_format(v, format)?;
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(format!("is too long (maximum is {} characters)", max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(format!("is too short (minimum is {} characters)", min));
            }
        }
        if let Some(pattern) = &rule.pattern {
            let re = Regex::new(pattern).map_err(|_| "has an invalid pattern rule".to_string())?;
            if !re.is_match(s) {
                return Err("is invalid".into());
            }
        }
    }
    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            return Err("is not included in the list".into());
        }
    }
    let number = v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()));
    if let (Some(min), Some(n)) = (rule.minimum, number) {
        if n < min {
            return Err(format!("must be greater than or equal to {}", min));
        }
    }
    if let (Some(max), Some(n)) = (rule.maximum, number) {
        if n > max {
            return Err(format!("must be less than or equal to {}", max));
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(v: &Value, format: &str) -> Result<(), String> {
    let Some(s) = v.as_str() else { return Ok(()) };
    match format.to_lowercase().as_str() {
        "email" => {
            if !s.contains('@') || s.len() < 3 {
                return Err("must be a valid email".into());
            }
        }
        "uuid" => {
            if uuid::Uuid::parse_str(s).is_err() {
                return Err("must be a valid UUID".into());
            }
        }
        _ => {}
    }
    Ok(())
}
