//! Raw host declarations matching the JSON site configuration.

use crate::action::ActionKind;
use crate::actions::LinkMethod;
use crate::format::Format;
use crate::link::ParentLink;
use crate::listing::ListingPolicy;
use crate::validation::ValidationRule;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Path prefix of every admin route, e.g. "admin".
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub csv_enabled: bool,
    /// Version the deployed admin assets were built for.
    #[serde(default)]
    pub asset_version: Option<String>,
    pub resources: Vec<ResourceConfig>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnDelete {
    #[default]
    Restrict,
    Cascade,
    Nullify,
}

/// Foreign key from this resource to another one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    pub column: String,
    pub resource: String,
    #[serde(default)]
    pub on_delete: OnDelete,
    /// Constraint name; defaults to `fk_<resource>_<column>`.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DisplayFieldConfig {
    pub name: String,
    /// One of string, badge, rich_text, actions. Ignored when `template` is set.
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub extras: Map<String, Value>,
    #[serde(default)]
    pub actions: Option<Vec<ActionKind>>,
    #[serde(default)]
    pub formats: Option<Vec<Format>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormFieldConfig {
    pub name: String,
    /// One of text, textarea, select, checkbox, has_many. Ignored when `template` is set
    /// (except has_many, which always uses the nested group renderer).
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub extras: Map<String, Value>,
    #[serde(default)]
    pub collection: Option<Value>,
    /// has_many only: association reader, defaults to `name`.
    #[serde(default)]
    pub reader: Option<String>,
    /// has_many only: nested fields.
    #[serde(default)]
    pub fields: Vec<FormFieldConfig>,
    #[serde(default)]
    pub actions: Option<Vec<ActionKind>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VisibleWhen {
    pub field: String,
    pub equals: Value,
}

/// Built-in action by name ("new", "show", "edit", "destroy") or a custom link.
/// Custom hrefs may use `{collection}`, and for member actions `{path}` and `{id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionConfig {
    Builtin(String),
    Custom {
        label: String,
        href: String,
        #[serde(default)]
        method: LinkMethod,
        #[serde(default)]
        confirm: Option<String>,
        #[serde(default)]
        visible_when: Option<VisibleWhen>,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageColumnConfig {
    pub name: String,
    /// PostgreSQL type used to cast bound text values (e.g. "timestamptz", "uuid").
    #[serde(default, rename = "type")]
    pub pg_type: Option<String>,
    #[serde(default)]
    pub has_default: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    pub columns: Vec<StorageColumnConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Plural path segment, e.g. "members".
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub parent: Option<ParentLink>,
    #[serde(default)]
    pub references: Vec<ReferenceConfig>,
    #[serde(default)]
    pub display: Vec<DisplayFieldConfig>,
    #[serde(default)]
    pub form: Vec<FormFieldConfig>,
    #[serde(default)]
    pub listing: ListingPolicy,
    #[serde(default = "default_collection_actions")]
    pub collection_actions: Vec<ActionConfig>,
    #[serde(default = "default_member_actions")]
    pub member_actions: Vec<ActionConfig>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
    #[serde(default)]
    pub storage: Option<StorageConfig>,
}

fn default_collection_actions() -> Vec<ActionConfig> {
    vec![ActionConfig::Builtin("new".into())]
}

fn default_member_actions() -> Vec<ActionConfig> {
    ["show", "edit", "destroy"]
        .into_iter()
        .map(|name| ActionConfig::Builtin(name.into()))
        .collect()
}
