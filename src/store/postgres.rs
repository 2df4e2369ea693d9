//! PostgreSQL store on sqlx. Every resource it serves needs a storage binding.

use crate::config::Resource;
use crate::error::StoreError;
use crate::record::{Record, Scope};
use crate::recordset::RecordSet;
use crate::sql::{self, PgBindValue, QueryBuf, TableRef};
use crate::store::Store;
use crate::validation::RecordValidator;
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Column, PgPool, Row, TypeInfo};

const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(5).connect(database_url).await?;
        Ok(PgStore { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table(resource: &Resource) -> Result<TableRef<'_>, StoreError> {
        TableRef::of(resource)
            .ok_or_else(|| StoreError::Unsupported(format!("resource '{}' has no storage binding", resource.name)))
    }

    async fn fetch_optional(&self, q: &QueryBuf) -> Result<Option<Map<String, Value>>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| row_to_json(&r)))
    }

    async fn fetch_all(&self, q: &QueryBuf) -> Result<Vec<Map<String, Value>>, sqlx::Error> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from_json(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

/// SQLSTATE and constraint name of a database error.
fn db_error(e: &sqlx::Error) -> Option<(String, String)> {
    match e {
        sqlx::Error::Database(db) => Some((
            db.code().map(|c| c.into_owned()).unwrap_or_default(),
            db.constraint().unwrap_or_default().to_string(),
        )),
        _ => None,
    }
}

#[async_trait]
impl Store for PgStore {
    async fn find_one(&self, resource: &Resource, scope: &Scope) -> Result<Option<Record>, StoreError> {
        let Some(id) = &scope.id else { return Ok(None) };
        let table = Self::table(resource)?;
        let parent_id = scope.parent.as_ref().map(|p| p.id.as_str());
        let q = sql::select_by_id(&table, id, parent_id);
        let row = self.fetch_optional(&q).await?;
        Ok(row.map(|row| {
            let mut record = Record::from_row(&resource.name, &resource.primary_key, row);
            record.parent = scope.parent.clone();
            record
        }))
    }

    async fn find_many(&self, resource: &Resource, set: &RecordSet) -> Result<Vec<Record>, StoreError> {
        let table = Self::table(resource)?;
        let q = sql::select_set(&table, set);
        let rows = self.fetch_all(&q).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let mut record = Record::from_row(&resource.name, &resource.primary_key, row);
                record.parent = set.scope.parent.clone();
                record
            })
            .collect())
    }

    async fn save(&self, resource: &Resource, record: &mut Record) -> Result<bool, StoreError> {
        if !RecordValidator::validate(record, &resource.validation) {
            return Ok(false);
        }
        let table = Self::table(resource)?;
        let q = match record.id_string().filter(|_| record.persisted) {
            Some(id) => sql::update(&table, &id, &record.attributes),
            None => sql::insert(&table, &record.attributes),
        };
        match self.fetch_optional(&q).await {
            Ok(Some(row)) => {
                record.id = row.get(&resource.primary_key).cloned();
                record.attributes.extend(row);
                record.persisted = true;
                Ok(true)
            }
            Ok(None) => {
                record.add_error("base", "no longer exists");
                Ok(false)
            }
            Err(e) => match db_error(&e) {
                Some((code, constraint)) if code == UNIQUE_VIOLATION => {
                    tracing::debug!(constraint = %constraint, "unique violation");
                    record.add_error("base", "has already been taken");
                    Ok(false)
                }
                _ => Err(e.into()),
            },
        }
    }

    async fn destroy(&self, resource: &Resource, record: &mut Record) -> Result<bool, StoreError> {
        let Some(id) = record.id_string().filter(|_| record.persisted) else {
            return Ok(false);
        };
        let table = Self::table(resource)?;
        let q = sql::delete(&table, &id);
        match self.fetch_optional(&q).await {
            Ok(Some(_)) => {
                record.persisted = false;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => match db_error(&e) {
                Some((code, constraint)) if code == FOREIGN_KEY_VIOLATION => {
                    Err(StoreError::IntegrityConstraint { constraint })
                }
                _ => Err(e.into()),
            },
        }
    }
}

fn row_to_json(row: &PgRow) -> Map<String, Value> {
    row.columns()
        .iter()
        .map(|col| {
            let value = cell_to_value(row, col.ordinal(), col.type_info().name());
            (col.name().to_string(), value)
        })
        .collect()
}

fn cell<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(idx).ok().flatten()
}

/// Decode one cell by its reported column type. Unknown types fall back to text.
fn cell_to_value(row: &PgRow, idx: usize, type_name: &str) -> Value {
    let number = |f: Option<f64>| f.and_then(serde_json::Number::from_f64).map(Value::Number);
    let value = match type_name {
        "INT2" => cell::<i16>(row, idx).map(Value::from),
        "INT4" => cell::<i32>(row, idx).map(Value::from),
        "INT8" => cell::<i64>(row, idx).map(Value::from),
        "FLOAT4" => number(cell::<f32>(row, idx).map(f64::from)),
        "FLOAT8" => number(cell::<f64>(row, idx)),
        "BOOL" => cell::<bool>(row, idx).map(Value::Bool),
        "UUID" => cell::<uuid::Uuid>(row, idx).map(|u| Value::String(u.to_string())),
        "TIMESTAMPTZ" => cell::<chrono::DateTime<chrono::Utc>>(row, idx).map(|d| Value::String(d.to_rfc3339())),
        "TIMESTAMP" => cell::<chrono::NaiveDateTime>(row, idx)
            .map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "DATE" => cell::<chrono::NaiveDate>(row, idx).map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        "JSON" | "JSONB" => cell::<Value>(row, idx),
        _ => cell::<String>(row, idx).map(Value::String),
    };
    value.unwrap_or(Value::Null)
}
