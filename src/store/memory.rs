//! In-process store. One write lock covers a whole save or destroy, including
//! cascades, so each is atomic with respect to other requests.

use crate::config::{AdminSite, OnDelete, Resource};
use crate::error::StoreError;
use crate::record::{value_to_param, Record, Scope};
use crate::recordset::RecordSet;
use crate::store::Store;
use crate::validation::RecordValidator;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

type Row = Map<String, Value>;

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    rows: IndexMap<String, Row>,
}

impl Table {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Keep generated ids ahead of explicitly supplied numeric ids.
    fn observe_id(&mut self, id: &Value) {
        if let Some(n) = id.as_i64().or_else(|| id.as_str().and_then(|s| s.parse().ok())) {
            self.next_id = self.next_id.max(n);
        }
    }
}

pub struct MemoryStore {
    site: Arc<AdminSite>,
    tables: RwLock<HashMap<String, Table>>,
}

impl MemoryStore {
    pub fn new(site: Arc<AdminSite>) -> Self {
        MemoryStore {
            site,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Build, assign and save one row, for fixtures and demos.
    pub async fn seed(&self, resource: &str, attributes: Value) -> Result<Record, StoreError> {
        let resource = self
            .site
            .resource(resource)
            .ok_or_else(|| StoreError::Unsupported(format!("unknown resource '{}'", resource)))?;
        let mut record = self.build(resource, &Scope::collection(&resource.name));
        if let Value::Object(attrs) = attributes {
            self.assign(&mut record, attrs);
        }
        if !self.save(resource, &mut record).await? {
            return Err(StoreError::Unsupported(format!(
                "seed row for '{}' is invalid: {:?}",
                resource.name, record.errors
            )));
        }
        Ok(record)
    }

    pub async fn count(&self, resource: &str) -> usize {
        self.tables.read().await.get(resource).map(|t| t.rows.len()).unwrap_or(0)
    }

    fn in_parent_scope(resource: &Resource, scope: &Scope, row: &Row) -> bool {
        match (&resource.parent, &scope.parent) {
            (Some(link), Some(parent)) => {
                row.get(&link.foreign_key).and_then(value_to_param).as_deref() == Some(parent.id.as_str())
            }
            _ => true,
        }
    }

    fn to_record(resource: &Resource, scope: &Scope, row: &Row) -> Record {
        let mut record = Record::from_row(&resource.name, &resource.primary_key, row.clone());
        record.parent = scope.parent.clone();
        record
    }

    /// Rows to delete and foreign keys to clear when `(resource, id)` is destroyed.
    /// Fails on the first restricting reference; nothing is changed in that case.
    fn plan_destroy(
        &self,
        tables: &HashMap<String, Table>,
        resource: &str,
        id: &str,
        deletes: &mut Vec<(String, String)>,
        nullify: &mut Vec<(String, String, String)>,
        seen: &mut HashSet<(String, String)>,
    ) -> Result<(), StoreError> {
        if !seen.insert((resource.to_string(), id.to_string())) {
            return Ok(());
        }
        for (child, reference) in self.site.references_to(resource) {
            let Some(table) = tables.get(&child.name) else { continue };
            let dependents: Vec<String> = table
                .rows
                .iter()
                .filter(|(_, row)| row.get(&reference.column).and_then(value_to_param).as_deref() == Some(id))
                .map(|(child_id, _)| child_id.clone())
                .collect();
            if dependents.is_empty() {
                continue;
            }
            match reference.on_delete {
                OnDelete::Restrict => {
                    return Err(StoreError::IntegrityConstraint {
                        constraint: reference.constraint.clone(),
                    })
                }
                OnDelete::Nullify => {
                    for child_id in dependents {
                        nullify.push((child.name.clone(), child_id, reference.column.clone()));
                    }
                }
                OnDelete::Cascade => {
                    for child_id in dependents {
                        self.plan_destroy(tables, &child.name, &child_id, deletes, nullify, seen)?;
                    }
                }
            }
        }
        deletes.push((resource.to_string(), id.to_string()));
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_one(&self, resource: &Resource, scope: &Scope) -> Result<Option<Record>, StoreError> {
        let Some(id) = &scope.id else { return Ok(None) };
        let tables = self.tables.read().await;
        let row = tables
            .get(&resource.name)
            .and_then(|t| t.rows.get(id))
            .filter(|row| Self::in_parent_scope(resource, scope, row));
        Ok(row.map(|row| Self::to_record(resource, scope, row)))
    }

    async fn find_many(&self, resource: &Resource, set: &RecordSet) -> Result<Vec<Record>, StoreError> {
        let tables = self.tables.read().await;
        let records: Vec<Record> = tables
            .get(&resource.name)
            .map(|t| {
                t.rows
                    .values()
                    .filter(|row| Self::in_parent_scope(resource, &set.scope, row))
                    .map(|row| Self::to_record(resource, &set.scope, row))
                    .collect()
            })
            .unwrap_or_default();
        Ok(set.evaluate(records))
    }

    async fn save(&self, resource: &Resource, record: &mut Record) -> Result<bool, StoreError> {
        if !RecordValidator::validate(record, &resource.validation) {
            tracing::debug!(resource = %resource.name, errors = record.errors.len(), "record invalid");
            return Ok(false);
        }
        let mut tables = self.tables.write().await;
        let table = tables.entry(resource.name.clone()).or_default();
        let pk = resource.primary_key.as_str();

        if record.persisted {
            let Some(id) = record.id_string() else { return Ok(false) };
            let Some(row) = table.rows.get_mut(&id) else {
                record.add_error("base", "no longer exists");
                return Ok(false);
            };
            for (k, v) in &record.attributes {
                if k != pk {
                    row.insert(k.clone(), v.clone());
                }
            }
            record.attributes = row.clone();
            return Ok(true);
        }

        let id = match record.get(pk).filter(|v| !v.is_null()).cloned() {
            Some(id) => {
                table.observe_id(&id);
                id
            }
            None => Value::from(table.allocate_id()),
        };
        let Some(key) = value_to_param(&id) else {
            record.add_error(pk, "is invalid");
            return Ok(false);
        };
        if table.rows.contains_key(&key) {
            record.add_error(pk, "has already been taken");
            return Ok(false);
        }
        record.set(pk, id.clone());
        table.rows.insert(key, record.attributes.clone());
        record.id = Some(id);
        record.persisted = true;
        Ok(true)
    }

    async fn destroy(&self, resource: &Resource, record: &mut Record) -> Result<bool, StoreError> {
        let Some(id) = record.id_string().filter(|_| record.persisted) else {
            return Ok(false);
        };
        let mut tables = self.tables.write().await;
        let exists = tables
            .get(&resource.name)
            .map(|t| t.rows.contains_key(&id))
            .unwrap_or(false);
        if !exists {
            return Ok(false);
        }

        let (mut deletes, mut nullify, mut seen) = (Vec::new(), Vec::new(), HashSet::new());
        self.plan_destroy(&tables, &resource.name, &id, &mut deletes, &mut nullify, &mut seen)?;

        for (name, child_id, column) in nullify {
            if let Some(row) = tables.get_mut(&name).and_then(|t| t.rows.get_mut(&child_id)) {
                row.insert(column, Value::Null);
            }
        }
        for (name, row_id) in &deletes {
            if let Some(t) = tables.get_mut(name) {
                t.rows.shift_remove(row_id);
            }
        }
        tracing::debug!(resource = %resource.name, id = %id, rows = deletes.len(), "destroyed");
        record.persisted = false;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, SiteConfig};
    use crate::record::ParentRef;
    use crate::recordset::{Condition, FilterOperator, Sort, SortDirection};
    use serde_json::json;

    fn site(on_delete: &str) -> Arc<AdminSite> {
        let config: SiteConfig = serde_json::from_value(json!({
            "resources": [
                { "name": "ships", "validation": { "name": { "required": true } } },
                {
                    "name": "members",
                    "parent": { "resource": "ships", "foreign_key": "ship_id" },
                    "references": [{ "column": "ship_id", "resource": "ships", "on_delete": on_delete }]
                }
            ]
        }))
        .unwrap();
        Arc::new(resolve(&config).unwrap())
    }

    async fn seeded(on_delete: &str) -> (Arc<AdminSite>, MemoryStore) {
        let site = site(on_delete);
        let store = MemoryStore::new(site.clone());
        store.seed("ships", json!({ "name": "Enterprise" })).await.unwrap();
        store.seed("ships", json!({ "name": "Voyager" })).await.unwrap();
        store.seed("members", json!({ "name": "Picard", "ship_id": 1, "age": 59 })).await.unwrap();
        store.seed("members", json!({ "name": "Riker", "ship_id": 1, "age": 40 })).await.unwrap();
        store.seed("members", json!({ "name": "Janeway", "ship_id": 2, "age": 45 })).await.unwrap();
        (site, store)
    }

    fn under_ship(id: &str) -> Scope {
        Scope::collection("members").under(ParentRef {
            resource: "ships".into(),
            id: id.into(),
        })
    }

    #[tokio::test]
    async fn test_save_assigns_ids_and_validates() {
        let site = site("restrict");
        let store = MemoryStore::new(site.clone());
        let ships = site.resource("ships").unwrap();

        let mut record = store.build(ships, &Scope::collection("ships"));
        assert!(!store.save(ships, &mut record).await.unwrap());
        assert_eq!(record.errors_on("name"), vec!["can't be blank"]);
        assert!(!record.persisted);

        store.assign(&mut record, json!({ "name": "Defiant" }).as_object().unwrap().clone());
        assert!(store.save(ships, &mut record).await.unwrap());
        assert!(record.persisted);
        assert_eq!(record.id, Some(json!(1)));
        assert_eq!(store.count("ships").await, 1);
    }

    #[tokio::test]
    async fn test_find_one_respects_parent_scope() {
        let (site, store) = seeded("restrict").await;
        let members = site.resource("members").unwrap();
        let mut scope = under_ship("1");
        scope.id = Some("3".into());
        assert!(store.find_one(members, &scope).await.unwrap().is_none());
        scope.id = Some("2".into());
        let riker = store.find_one(members, &scope).await.unwrap().unwrap();
        assert_eq!(riker.get("name"), Some(&json!("Riker")));
        assert_eq!(riker.parent.as_ref().map(|p| p.id.as_str()), Some("1"));
    }

    #[tokio::test]
    async fn test_find_many_evaluates_set_within_scope() {
        let (site, store) = seeded("restrict").await;
        let members = site.resource("members").unwrap();
        let set = RecordSet::new(under_ship("1")).ordered(Sort {
            field: "age".into(),
            direction: SortDirection::Asc,
        });
        let names: Vec<_> = store
            .find_many(members, &set)
            .await
            .unwrap()
            .iter()
            .map(|r| r.get("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec![json!("Riker"), json!("Picard")]);

        let set = RecordSet::new(Scope::collection("members")).narrow(Condition::Compare {
            field: "age".into(),
            op: FilterOperator::Gt,
            value: json!("42"),
        });
        assert_eq!(store.find_many(members, &set).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_build_presets_parent_foreign_key() {
        let (site, store) = seeded("restrict").await;
        let members = site.resource("members").unwrap();
        let mut record = store.build(members, &under_ship("2"));
        assert_eq!(record.get("ship_id"), Some(&json!("2")));
        store.assign(&mut record, json!({ "name": "Tuvok" }).as_object().unwrap().clone());
        assert!(store.save(members, &mut record).await.unwrap());
        let set = RecordSet::new(under_ship("2"));
        assert_eq!(store.find_many(members, &set).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_destroy_restricted_by_dependents() {
        let (site, store) = seeded("restrict").await;
        let ships = site.resource("ships").unwrap();
        let mut ship = store
            .find_one(ships, &Scope::member("ships", "1"))
            .await
            .unwrap()
            .unwrap();
        let err = store.destroy(ships, &mut ship).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::IntegrityConstraint { ref constraint } if constraint == "fk_members_ship_id"
        ));
        assert!(ship.persisted);
        assert_eq!(store.count("members").await, 3);
    }

    #[tokio::test]
    async fn test_destroy_cascade_and_nullify() {
        let (site, store) = seeded("cascade").await;
        let ships = site.resource("ships").unwrap();
        let mut ship = store.find_one(ships, &Scope::member("ships", "1")).await.unwrap().unwrap();
        assert!(store.destroy(ships, &mut ship).await.unwrap());
        assert!(!ship.persisted);
        assert_eq!(store.count("members").await, 1);

        let (site, store) = seeded("nullify").await;
        let ships = site.resource("ships").unwrap();
        let mut ship = store.find_one(ships, &Scope::member("ships", "1")).await.unwrap().unwrap();
        assert!(store.destroy(ships, &mut ship).await.unwrap());
        assert_eq!(store.count("members").await, 3);
    }

    #[tokio::test]
    async fn test_destroy_missing_row_is_false() {
        let (site, store) = seeded("restrict").await;
        let members = site.resource("members").unwrap();
        let mut picard = store.find_one(members, &Scope::member("members", "1")).await.unwrap().unwrap();
        let mut again = picard.clone();
        assert!(store.destroy(members, &mut picard).await.unwrap());
        assert!(!store.destroy(members, &mut again).await.unwrap());
    }
}
