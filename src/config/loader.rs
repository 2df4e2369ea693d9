//! Load the site configuration from a JSON file and build the resolved site.

use crate::actions::{self, ActionEntry, ActionSpec, CollectionAction, MemberAction};
use crate::config::resolved::{AdminSite, ColumnInfo, Reference, Resource, StorageBinding};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use crate::format::FormatGate;
use crate::inflect::{singularize, titleize};
use crate::link::LinkResolver;
use crate::notice::asset_version_warning;
use crate::record::{value_to_param, Record};
use crate::recordset::loose_eq;
use crate::schema::{
    DeclaredVisibility, DisplayTypes, Extras, Field, FieldVisibility, FieldsBuilder, Flavor, FormTypes, Schema,
};
use std::path::Path;

/// Build the resolved site from its configuration (validates first).
pub fn resolve(config: &SiteConfig) -> Result<AdminSite, ConfigError> {
    validate(config)?;
    let namespace = config
        .namespace
        .as_deref()
        .map(|ns| ns.trim_matches('/').to_string())
        .filter(|ns| !ns.is_empty());
    let mut site = AdminSite::new(
        namespace.clone(),
        FormatGate::new(config.csv_enabled),
        asset_version_warning(config.asset_version.as_deref()),
    );
    if let Some(notice) = &site.notice {
        tracing::warn!("{}", notice);
    }

    for rc in &config.resources {
        let resource = resolve_resource(rc, namespace.clone())?;
        tracing::debug!(resource = %resource.name, "resolved resource");
        site.insert(resource);
    }
    Ok(site)
}

fn resolve_resource(rc: &ResourceConfig, namespace: Option<String>) -> Result<Resource, ConfigError> {
    let title = rc.title.clone().unwrap_or_else(|| titleize(&rc.name));
    let singular_title = titleize(&singularize(&rc.name));
    let mut resource = Resource::new(
        rc.name.clone(),
        title,
        singular_title,
        namespace,
        display_schema(&rc.display),
        form_schema(&rc.form),
    );
    if let Some(parent) = &rc.parent {
        resource = resource.with_parent(parent.clone());
    }
    if let Some(pk) = &rc.primary_key {
        resource.primary_key = pk.clone();
    }
    resource.references = rc
        .references
        .iter()
        .map(|r| Reference {
            column: r.column.clone(),
            resource: r.resource.clone(),
            on_delete: r.on_delete,
            constraint: r
                .name
                .clone()
                .unwrap_or_else(|| format!("fk_{}_{}", rc.name, r.column)),
        })
        .collect();
    resource.listing = rc.listing.clone();
    resource.validation = rc.validation.clone();
    resource.storage = rc.storage.as_ref().map(|s| StorageBinding {
        schema_name: s.schema.clone().unwrap_or_else(|| "public".into()),
        table_name: s.table.clone().unwrap_or_else(|| rc.name.clone()),
        columns: s
            .columns
            .iter()
            .map(|c| ColumnInfo {
                name: c.name.clone(),
                pg_type: c.pg_type.clone(),
                has_default: c.has_default,
            })
            .collect(),
    });

    for action in &rc.collection_actions {
        let entry = collection_action(action, &resource.links, &resource.singular_title);
        resource.push_collection_action(entry);
    }
    for action in &rc.member_actions {
        let entry = member_action(action, &resource.links);
        resource.push_member_action(entry);
    }
    Ok(resource)
}

fn display_schema(fields: &[DisplayFieldConfig]) -> Schema {
    let mut visibility = DeclaredVisibility::new();
    let schema = Schema::display(|builder, ty| {
        for f in fields {
            builder.insert(f.name.clone(), display_field(f, ty));
            if f.actions.is_some() || f.formats.is_some() {
                visibility.restrict(
                    f.name.clone(),
                    FieldVisibility {
                        actions: f.actions.clone(),
                        formats: f.formats.clone(),
                    },
                );
            }
        }
    });
    with_visibility(schema, visibility)
}

fn display_field(f: &DisplayFieldConfig, ty: &DisplayTypes) -> Field {
    let extras = Extras::from(f.extras.clone());
    if let Some(template) = &f.template {
        return ty.manual(template.clone(), extras);
    }
    let base = match f.kind.as_deref() {
        Some("badge") => ty.badge(f.extras.get("colors").cloned().unwrap_or_default()),
        Some("rich_text") => ty.rich_text(),
        Some("actions") => ty.actions(),
        _ => ty.string(),
    };
    with_extras(base, extras)
}

fn form_schema(fields: &[FormFieldConfig]) -> Schema {
    let mut visibility = DeclaredVisibility::new();
    let form = FieldsBuilder::nested(|builder, ty| declare_form_fields(builder, ty, fields, None, &mut visibility), &FormTypes);
    with_visibility(Schema::from_fields(Flavor::Form, form), visibility)
}

fn declare_form_fields(
    builder: &mut FieldsBuilder,
    ty: &FormTypes,
    fields: &[FormFieldConfig],
    prefix: Option<&str>,
    visibility: &mut DeclaredVisibility,
) {
    for f in fields {
        let path = match prefix {
            Some(p) => format!("{}.{}", p, f.name),
            None => f.name.clone(),
        };
        if let Some(actions) = &f.actions {
            visibility.restrict(
                path.clone(),
                FieldVisibility {
                    actions: Some(actions.clone()),
                    formats: None,
                },
            );
        }
        let extras = Extras::from(f.extras.clone());
        let field = match f.kind.as_deref() {
            Some("has_many") => {
                let reader = f.reader.clone().unwrap_or_else(|| f.name.clone());
                ty.has_many(reader, extras, |nested, ty| {
                    declare_form_fields(nested, ty, &f.fields, Some(&path), visibility)
                })
            }
            _ if f.template.is_some() => ty.generic(f.template.clone().unwrap_or_default(), extras),
            Some("textarea") => with_extras(ty.textarea(), extras),
            Some("checkbox") => with_extras(ty.checkbox(), extras),
            Some("select") => with_extras(ty.select(f.collection.clone().unwrap_or_default()), extras),
            _ => with_extras(ty.text(), extras),
        };
        builder.insert(f.name.clone(), field);
    }
}

fn with_extras(field: Field, extras: Extras) -> Field {
    if extras.is_empty() {
        return field;
    }
    match field.nested() {
        Some(nested) => Field::with_nested(field.template(), field.extras().clone().merged(extras), nested.clone()),
        None => Field::new(field.template(), field.extras().clone().merged(extras)),
    }
}

fn with_visibility(schema: Schema, visibility: DeclaredVisibility) -> Schema {
    if visibility.is_empty() {
        schema
    } else {
        schema.with_policy(visibility)
    }
}

fn collection_action(action: &ActionConfig, links: &LinkResolver, singular_title: &str) -> CollectionAction {
    match action {
        ActionConfig::Builtin(_) => actions::new_action(links, singular_title),
        ActionConfig::Custom {
            label,
            href,
            method,
            confirm,
            ..
        } => {
            let mut spec = ActionSpec::link(label.clone(), href.clone()).with_method(*method);
            spec.confirm = confirm.clone();
            if !href.contains('{') {
                return ActionEntry::Static(spec);
            }
            let collection = links.collection_path(None).to_path();
            CollectionAction::resolvable(move || {
                let mut resolved = spec.clone();
                resolved.href = resolved.href.replace("{collection}", &collection);
                resolved
            })
        }
    }
}

fn member_action(action: &ActionConfig, links: &LinkResolver) -> MemberAction {
    match action {
        ActionConfig::Builtin(name) => match name.as_str() {
            "show" => actions::show_action(links.clone()),
            "edit" => actions::edit_action(links.clone()),
            _ => actions::destroy_action(links.clone()),
        },
        ActionConfig::Custom {
            label,
            href,
            method,
            confirm,
            visible_when,
        } => {
            let mut spec = ActionSpec::link(label.clone(), href.clone()).with_method(*method);
            spec.confirm = confirm.clone();
            if !href.contains('{') && visible_when.is_none() {
                return ActionEntry::Static(spec);
            }
            let links = links.clone();
            let visible_when = visible_when.clone();
            MemberAction::resolvable(move |record: &Record| {
                let mut resolved = spec.clone();
                resolved.href = expand_member_href(&resolved.href, &links, record);
                if let Some(cond) = &visible_when {
                    let value = record.get(&cond.field).cloned().unwrap_or_default();
                    resolved.hidden = !loose_eq(&value, &cond.equals);
                }
                resolved
            })
        }
    }
}

fn expand_member_href(href: &str, links: &LinkResolver, record: &Record) -> String {
    href.replace("{path}", &links.canonical_path(record).to_path())
        .replace("{collection}", &links.collection_path(record.parent.as_ref()).to_path())
        .replace("{id}", &record.id.as_ref().and_then(value_to_param).unwrap_or_default())
}

/// Read the site configuration from a JSON file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<SiteConfig, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let config: SiteConfig = serde_json::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
    tracing::info!(path = %path.display(), resources = config.resources.len(), "loaded site config");
    Ok(config)
}

/// Apply `ADMIN_NAMESPACE`, `ADMIN_CSV_ENABLED` and `ADMIN_ASSET_VERSION` from the environment.
pub fn apply_env_overrides(config: &mut SiteConfig) {
    if let Ok(ns) = std::env::var("ADMIN_NAMESPACE") {
        config.namespace = Some(ns);
    }
    if let Ok(flag) = std::env::var("ADMIN_CSV_ENABLED") {
        config.csv_enabled = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
    }
    if let Ok(version) = std::env::var("ADMIN_ASSET_VERSION") {
        config.asset_version = Some(version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionKind};
    use crate::actions::resolve_member_actions;
    use crate::format::Format;
    use serde_json::json;

    fn config() -> SiteConfig {
        serde_json::from_value(json!({
            "namespace": "/admin/",
            "resources": [
                {
                    "name": "ships",
                    "display": [
                        { "name": "name" },
                        { "name": "registry", "formats": ["csv"] },
                        { "name": "actions", "kind": "actions", "formats": ["html"] }
                    ],
                    "form": [
                        { "name": "name" },
                        { "name": "members", "kind": "has_many", "fields": [
                            { "name": "name" },
                            { "name": "rank", "kind": "select", "collection": ["captain", "ensign"] }
                        ]}
                    ]
                },
                {
                    "name": "members",
                    "parent": { "resource": "ships", "foreign_key": "ship_id" },
                    "references": [{ "column": "ship_id", "resource": "ships" }],
                    "form": [
                        { "name": "name", "extras": { "label": "Full name" } },
                        { "name": "password", "actions": ["new", "create"] }
                    ],
                    "member_actions": [
                        "show",
                        { "label": "Promote", "href": "{path}/promote", "method": "post",
                          "visible_when": { "field": "rank", "equals": "ensign" } }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_resolve_builds_resources() {
        let site = resolve(&config()).unwrap();
        assert_eq!(site.namespace.as_deref(), Some("admin"));
        let ships = site.resource("ships").unwrap();
        assert_eq!(ships.title, "Ships");
        assert_eq!(ships.singular_title, "Ship");
        assert_eq!(ships.collection_actions().len(), 1);
        assert_eq!(ships.member_actions(&Record::new("ships")).len(), 3);

        let members = site.resource("members").unwrap();
        assert_eq!(members.references[0].constraint, "fk_members_ship_id");
        assert_eq!(site.references_to("ships").count(), 1);
    }

    #[test]
    fn test_display_visibility_from_config() {
        let site = resolve(&config()).unwrap();
        let display = site.resource("ships").unwrap().display_schema();
        let html = display.apply(&Action::default_for(ActionKind::Index), Format::Html);
        assert_eq!(html.fields.names(), vec!["name", "actions"]);
        let csv = display.apply(&Action::default_for(ActionKind::Index), Format::Csv);
        assert_eq!(csv.fields.names(), vec!["name", "registry"]);
    }

    #[test]
    fn test_form_fields_from_config() {
        let site = resolve(&config()).unwrap();
        let form = site.resource("ships").unwrap().form_schema();
        let members = form.fields().get("members").unwrap();
        assert_eq!(members.label().as_deref(), Some("Member"));
        assert_eq!(members.nested().unwrap().names(), vec!["name", "rank"]);
        assert_eq!(
            members.nested().unwrap().get("rank").unwrap().get("collection"),
            Some(&json!(["captain", "ensign"]))
        );

        let member_form = site.resource("members").unwrap().form_schema();
        assert_eq!(member_form.fields().get("name").unwrap().label().as_deref(), Some("Full name"));
        let on_new = member_form.apply(&Action::explicit(ActionKind::New), Format::Html);
        assert_eq!(on_new.fields.names(), vec!["name", "password"]);
        let on_edit = member_form.apply(&Action::explicit(ActionKind::Edit), Format::Html);
        assert_eq!(on_edit.fields.names(), vec!["name"]);
    }

    #[test]
    fn test_configured_member_action_resolves_per_record() {
        let site = resolve(&config()).unwrap();
        let members = site.resource("members").unwrap();
        let ensign = Record::from_row(
            "members",
            "id",
            json!({ "id": 4, "ship_id": 1, "rank": "ensign" }).as_object().unwrap().clone(),
        );
        let captain = Record::from_row(
            "members",
            "id",
            json!({ "id": 5, "ship_id": 1, "rank": "captain" }).as_object().unwrap().clone(),
        );
        let for_ensign = resolve_member_actions(members.member_actions(&ensign), &ensign);
        assert_eq!(for_ensign[0].href, "/admin/ships/1/members/4");
        assert_eq!(for_ensign[1].href, "/admin/ships/1/members/4/promote");
        assert!(!for_ensign[1].hidden);
        let for_captain = resolve_member_actions(members.member_actions(&captain), &captain);
        assert!(for_captain[1].hidden);
    }

    #[test]
    fn test_validate_rejects_unknown_parent() {
        let mut cfg = config();
        cfg.resources[1].parent = Some(crate::link::ParentLink {
            resource: "stations".into(),
            foreign_key: "station_id".into(),
        });
        assert!(matches!(resolve(&cfg), Err(ConfigError::MissingReference { .. })));
    }

    #[test]
    fn test_validate_rejects_duplicate_names_and_unknown_builtins() {
        let mut cfg = config();
        cfg.resources[1].name = "ships".into();
        assert!(matches!(resolve(&cfg), Err(ConfigError::DuplicatePathSegment(_))));

        let mut cfg = config();
        cfg.resources[0].member_actions = vec![ActionConfig::Builtin("archive".into())];
        assert!(matches!(resolve(&cfg), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validate_listing_against_storage_columns() {
        let mut cfg = config();
        cfg.resources[0].storage = Some(StorageConfig {
            schema: None,
            table: None,
            columns: vec![StorageColumnConfig {
                name: "name".into(),
                pg_type: None,
                has_default: false,
            }],
        });
        cfg.resources[0].listing.sortable = vec!["registry".into()];
        assert!(matches!(resolve(&cfg), Err(ConfigError::MissingReference { kind: "column", .. })));
    }
}
