//! Resolved site model: declarations validated and built into the structures
//! the pipeline reads. Shared read-only for the life of the process.

use crate::actions::{CollectionAction, MemberAction};
use crate::config::OnDelete;
use crate::format::FormatGate;
use crate::link::{LinkResolver, ParentLink};
use crate::listing::ListingPolicy;
use crate::record::Record;
use crate::schema::Schema;
use crate::validation::ValidationRule;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Foreign key from the owning resource to `resource`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    pub column: String,
    pub resource: String,
    pub on_delete: OnDelete,
    pub constraint: String,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub pg_type: Option<String>,
    /// Whether the column has a DB default (e.g. serial ids, NOW()).
    pub has_default: bool,
}

/// Table a resource is stored in, for SQL-backed stores.
#[derive(Clone, Debug)]
pub struct StorageBinding {
    pub schema_name: String,
    pub table_name: String,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Clone, Debug)]
pub struct Resource {
    /// Plural path segment, e.g. "members".
    pub name: String,
    pub title: String,
    pub singular_title: String,
    pub primary_key: String,
    pub parent: Option<ParentLink>,
    pub references: Vec<Reference>,
    pub listing: ListingPolicy,
    pub validation: HashMap<String, ValidationRule>,
    pub storage: Option<StorageBinding>,
    pub links: LinkResolver,
    display: Schema,
    form: Schema,
    collection_actions: Vec<CollectionAction>,
    member_actions: Vec<MemberAction>,
}

impl Resource {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        singular_title: impl Into<String>,
        namespace: Option<String>,
        display: Schema,
        form: Schema,
    ) -> Self {
        let name = name.into();
        Resource {
            links: LinkResolver::new(namespace, name.clone(), None),
            name,
            title: title.into(),
            singular_title: singular_title.into(),
            primary_key: "id".into(),
            parent: None,
            references: Vec::new(),
            listing: ListingPolicy::default(),
            validation: HashMap::new(),
            storage: None,
            display,
            form,
            collection_actions: Vec::new(),
            member_actions: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: ParentLink) -> Self {
        self.links.parent = Some(parent.clone());
        self.parent = Some(parent);
        self
    }

    pub fn display_schema(&self) -> &Schema {
        &self.display
    }

    pub fn form_schema(&self) -> &Schema {
        &self.form
    }

    pub fn collection_actions(&self) -> &[CollectionAction] {
        &self.collection_actions
    }

    /// Member action entries for `record`. Resolvable entries are resolved by the caller.
    pub fn member_actions(&self, _record: &Record) -> &[MemberAction] {
        &self.member_actions
    }

    pub fn set_display_schema(&mut self, schema: Schema) {
        self.display = schema;
    }

    pub fn set_form_schema(&mut self, schema: Schema) {
        self.form = schema;
    }

    pub fn push_collection_action(&mut self, action: CollectionAction) {
        self.collection_actions.push(action);
    }

    pub fn push_member_action(&mut self, action: MemberAction) {
        self.member_actions.push(action);
    }
}

#[derive(Clone, Debug, Default)]
pub struct AdminSite {
    pub namespace: Option<String>,
    pub format_gate: FormatGate,
    /// Advisory notice shown on every rendered page.
    pub notice: Option<String>,
    resources: IndexMap<String, Resource>,
}

impl AdminSite {
    pub fn new(namespace: Option<String>, format_gate: FormatGate, notice: Option<String>) -> Self {
        AdminSite {
            namespace,
            format_gate,
            notice,
            resources: IndexMap::new(),
        }
    }

    pub fn insert(&mut self, resource: Resource) {
        self.resources.insert(resource.name.clone(), resource);
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }

    /// Declaration-time access; once the site is shared it is read-only.
    pub fn resource_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.resources.get_mut(name)
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    /// Every (resource, reference) pair pointing at `target`.
    pub fn references_to<'a>(&'a self, target: &'a str) -> impl Iterator<Item = (&'a Resource, &'a Reference)> + 'a {
        self.resources
            .values()
            .flat_map(move |r| r.references.iter().filter(move |f| f.resource == target).map(move |f| (r, f)))
    }
}
