//! Config validation: referential integrity and declaration consistency.

use crate::config::{ActionConfig, FormFieldConfig, ResourceConfig, SiteConfig};
use crate::error::ConfigError;
use std::collections::HashSet;

const COLLECTION_BUILTINS: &[&str] = &["new"];
const MEMBER_BUILTINS: &[&str] = &["show", "edit", "destroy"];
const RESERVED_SEGMENTS: &[&str] = &["new", "edit"];

pub fn validate(config: &SiteConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for r in &config.resources {
        validate_segment(&r.name)?;
        if !names.insert(r.name.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(r.name.clone()));
        }
    }

    for r in &config.resources {
        if let Some(parent) = &r.parent {
            if !names.contains(parent.resource.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "parent resource",
                    id: parent.resource.clone(),
                });
            }
        }
        for reference in &r.references {
            if !names.contains(reference.resource.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "referenced resource",
                    id: reference.resource.clone(),
                });
            }
        }
        validate_actions(r, &r.collection_actions, COLLECTION_BUILTINS)?;
        validate_actions(r, &r.member_actions, MEMBER_BUILTINS)?;
        validate_form_fields(r, &r.form)?;
        validate_listing_columns(r)?;
    }
    Ok(())
}

fn validate_segment(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name.contains('/') || RESERVED_SEGMENTS.contains(&name) {
        return Err(ConfigError::Validation(format!("invalid resource name '{}'", name)));
    }
    Ok(())
}

fn validate_actions(r: &ResourceConfig, actions: &[ActionConfig], builtins: &[&str]) -> Result<(), ConfigError> {
    for action in actions {
        if let ActionConfig::Builtin(name) = action {
            if !builtins.contains(&name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "resource {}: unknown built-in action '{}'",
                    r.name, name
                )));
            }
        }
    }
    Ok(())
}

fn validate_form_fields(r: &ResourceConfig, fields: &[FormFieldConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for f in fields {
        if !seen.insert(f.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "resource {}: duplicate form field '{}'",
                r.name, f.name
            )));
        }
        let is_group = f.kind.as_deref() == Some("has_many");
        if is_group {
            if f.reader.as_deref().map(str::is_empty).unwrap_or(false) {
                return Err(ConfigError::Validation(format!(
                    "resource {}: has_many field '{}' has an empty reader",
                    r.name, f.name
                )));
            }
            validate_form_fields(r, &f.fields)?;
        } else if !f.fields.is_empty() {
            return Err(ConfigError::Validation(format!(
                "resource {}: only has_many fields may declare nested fields ('{}')",
                r.name, f.name
            )));
        }
    }
    Ok(())
}

/// With a storage binding, every listing field must be a stored column.
fn validate_listing_columns(r: &ResourceConfig) -> Result<(), ConfigError> {
    let Some(storage) = &r.storage else { return Ok(()) };
    let columns: HashSet<&str> = storage.columns.iter().map(|c| c.name.as_str()).collect();
    let listing = &r.listing;
    let fields = listing
        .searchable
        .iter()
        .chain(listing.sortable.iter())
        .chain(listing.filterable.keys())
        .chain(listing.default_sort.iter().map(|s| &s.field));
    for field in fields {
        if !columns.contains(field.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "column",
                id: format!("{}.{}", r.name, field),
            });
        }
    }
    Ok(())
}
