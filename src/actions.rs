//! Collection and member action menus. Entries are either static or resolved
//! against a record at render time.

use crate::link::LinkResolver;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMethod {
    #[default]
    Get,
    Post,
    Delete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActionSpec {
    pub label: String,
    pub href: String,
    pub method: LinkMethod,
    /// Set by a resolver when the action does not apply; rendering decides what to do with it.
    pub hidden: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

impl ActionSpec {
    pub fn link(label: impl Into<String>, href: impl Into<String>) -> Self {
        ActionSpec {
            label: label.into(),
            href: href.into(),
            method: LinkMethod::Get,
            hidden: false,
            confirm: None,
        }
    }

    pub fn with_method(mut self, method: LinkMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_confirm(mut self, message: impl Into<String>) -> Self {
        self.confirm = Some(message.into());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

pub type CollectionResolver = Arc<dyn Fn() -> ActionSpec + Send + Sync>;
pub type MemberResolver = Arc<dyn Fn(&Record) -> ActionSpec + Send + Sync>;

#[derive(Clone)]
pub enum ActionEntry<R> {
    Static(ActionSpec),
    Resolvable(R),
}

pub type CollectionAction = ActionEntry<CollectionResolver>;
pub type MemberAction = ActionEntry<MemberResolver>;

impl<R> fmt::Debug for ActionEntry<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionEntry::Static(spec) => f.debug_tuple("Static").field(spec).finish(),
            ActionEntry::Resolvable(_) => f.write_str("Resolvable(..)"),
        }
    }
}

impl CollectionAction {
    pub fn resolvable(resolver: impl Fn() -> ActionSpec + Send + Sync + 'static) -> Self {
        ActionEntry::Resolvable(Arc::new(resolver))
    }
}

impl MemberAction {
    pub fn resolvable(resolver: impl Fn(&Record) -> ActionSpec + Send + Sync + 'static) -> Self {
        ActionEntry::Resolvable(Arc::new(resolver))
    }
}

pub fn resolve_collection_actions(entries: &[CollectionAction]) -> Vec<ActionSpec> {
    entries
        .iter()
        .map(|entry| match entry {
            ActionEntry::Static(spec) => spec.clone(),
            ActionEntry::Resolvable(resolve) => resolve(),
        })
        .collect()
}

/// Resolves each entry for `record`, in declared order. Nothing is cached: each
/// call runs the resolvers again.
pub fn resolve_member_actions(entries: &[MemberAction], record: &Record) -> Vec<ActionSpec> {
    entries
        .iter()
        .map(|entry| match entry {
            ActionEntry::Static(spec) => spec.clone(),
            ActionEntry::Resolvable(resolve) => resolve(record),
        })
        .collect()
}

/// "New" link to the resource's collection.
pub fn new_action(links: &LinkResolver, singular_title: &str) -> CollectionAction {
    let href = format!("{}/new", links.collection_path(None).to_path());
    ActionEntry::Static(ActionSpec::link(format!("New {}", singular_title), href))
}

pub fn show_action(links: LinkResolver) -> MemberAction {
    MemberAction::resolvable(move |record| ActionSpec::link("View", links.canonical_path(record).to_path()))
}

pub fn edit_action(links: LinkResolver) -> MemberAction {
    MemberAction::resolvable(move |record| {
        ActionSpec::link("Edit", format!("{}/edit", links.canonical_path(record).to_path()))
            .hidden(!record.persisted)
    })
}

pub fn destroy_action(links: LinkResolver) -> MemberAction {
    MemberAction::resolvable(move |record| {
        ActionSpec::link("Delete", links.canonical_path(record).to_path())
            .with_method(LinkMethod::Delete)
            .with_confirm("Really delete?")
            .hidden(!record.persisted)
    })
}
