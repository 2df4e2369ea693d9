//! Storage collaborator: loads, builds, saves and destroys records of a resource.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::config::Resource;
use crate::error::StoreError;
use crate::record::{Record, Scope};
use crate::recordset::RecordSet;
use async_trait::async_trait;
use serde_json::{Map, Value};

#[async_trait]
pub trait Store: Send + Sync {
    /// The record named by `scope.id`, within `scope.parent` when given.
    async fn find_one(&self, resource: &Resource, scope: &Scope) -> Result<Option<Record>, StoreError>;

    /// Evaluate a record set: parent scope, narrowing, sort, window.
    async fn find_many(&self, resource: &Resource, set: &RecordSet) -> Result<Vec<Record>, StoreError>;

    /// Unpersisted record in `scope`. A nested resource gets its parent foreign key preset.
    fn build(&self, resource: &Resource, scope: &Scope) -> Record {
        let mut record = Record::new(&resource.name);
        if let (Some(link), Some(parent)) = (&resource.parent, &scope.parent) {
            record.set(link.foreign_key.clone(), Value::String(parent.id.clone()));
            record.parent = Some(parent.clone());
        }
        record
    }

    fn assign(&self, record: &mut Record, attributes: Map<String, Value>) {
        for (k, v) in attributes {
            record.set(k, v);
        }
    }

    /// Validate and persist. `Ok(false)` when the record is invalid; errors are left on the record.
    async fn save(&self, resource: &Resource, record: &mut Record) -> Result<bool, StoreError>;

    /// Delete the record. `Ok(false)` when nothing was deleted; an
    /// `IntegrityConstraint` error when dependents still reference it.
    async fn destroy(&self, resource: &Resource, record: &mut Record) -> Result<bool, StoreError>;
}
