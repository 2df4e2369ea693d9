//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a resource's storage binding.

use crate::config::{ColumnInfo, Resource, StorageBinding};
use crate::recordset::{Condition, FilterOperator, RecordSet};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// Escape LIKE wildcards in a user supplied term.
fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push `v` and return its placeholder, cast to the column type when one is declared.
    fn placeholder(&mut self, v: Value, column: Option<&ColumnInfo>) -> String {
        let n = self.push_param(v);
        match column.and_then(|c| c.pg_type.as_deref()) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// Table of one resource as seen by the builder: binding, primary key, and the
/// foreign key column naming the parent, if the resource is nested.
#[derive(Clone, Copy, Debug)]
pub struct TableRef<'a> {
    pub binding: &'a StorageBinding,
    pub pk: &'a str,
    pub parent_fk: Option<&'a str>,
}

impl<'a> TableRef<'a> {
    /// `None` when the resource has no storage binding.
    pub fn of(resource: &'a Resource) -> Option<Self> {
        Some(TableRef {
            binding: resource.storage.as_ref()?,
            pk: &resource.primary_key,
            parent_fk: resource.parent.as_ref().map(|p| p.foreign_key.as_str()),
        })
    }

    fn table(&self) -> String {
        qualified_table(&self.binding.schema_name, &self.binding.table_name)
    }

    fn column(&self, name: &str) -> Option<&'a ColumnInfo> {
        self.binding.columns.iter().find(|c| c.name == name)
    }

    /// SELECT list: custom enum (schema.typename) and numeric columns as text so rows decode.
    fn select_column_list(&self) -> String {
        self.binding
            .columns
            .iter()
            .map(|c| {
                let q = quoted(&c.name);
                let pg_type = c.pg_type.as_deref().unwrap_or("");
                if pg_type.contains('.') || pg_type == "numeric" {
                    format!("{}::text AS {}", q, q)
                } else {
                    q
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `pk = $n`, plus the parent scope when one is given.
    fn member_predicate(&self, q: &mut QueryBuf, id: &str, parent_id: Option<&str>) -> String {
        let ph = q.placeholder(Value::String(id.to_string()), self.column(self.pk));
        let mut parts = vec![format!("{} = {}", quoted(self.pk), ph)];
        if let Some(p) = self.parent_predicate(q, parent_id) {
            parts.push(p);
        }
        parts.join(" AND ")
    }

    fn parent_predicate(&self, q: &mut QueryBuf, parent_id: Option<&str>) -> Option<String> {
        let (fk, parent_id) = (self.parent_fk?, parent_id?);
        let ph = q.placeholder(Value::String(parent_id.to_string()), self.column(fk));
        Some(format!("{} = {}", quoted(fk), ph))
    }
}

/// SELECT one row by primary key, within the parent scope when given.
pub fn select_by_id(table: &TableRef<'_>, id: &str, parent_id: Option<&str>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let predicate = table.member_predicate(&mut q, id, parent_id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {}",
        table.select_column_list(),
        table.table(),
        predicate
    );
    q
}

fn compile_condition(table: &TableRef<'_>, q: &mut QueryBuf, condition: &Condition) -> Option<String> {
    match condition {
        Condition::Search { fields, term } => {
            let known: Vec<&String> = fields.iter().filter(|f| table.column(f).is_some()).collect();
            if known.is_empty() {
                return None;
            }
            let n = q.push_param(Value::String(like_pattern(term)));
            let ors: Vec<String> = known
                .iter()
                .map(|f| format!("{}::text ILIKE ${}", quoted(f), n))
                .collect();
            Some(format!("({})", ors.join(" OR ")))
        }
        Condition::Compare { field, op, value } => {
            let column = table.column(field)?;
            let col = quoted(field);
            let sql = match op {
                FilterOperator::Contains => {
                    let text = crate::recordset::value_text(value).unwrap_or_default();
                    let n = q.push_param(Value::String(like_pattern(&text)));
                    format!("{}::text ILIKE ${}", col, n)
                }
                FilterOperator::Eq | FilterOperator::Neq if column.pg_type.is_none() => {
                    let n = q.push_param(value.clone());
                    let cmp = if *op == FilterOperator::Eq { "=" } else { "IS DISTINCT FROM" };
                    format!("{}::text {} ${}", col, cmp, n)
                }
                _ => {
                    let ph = q.placeholder(value.clone(), Some(column));
                    let cmp = match op {
                        FilterOperator::Eq => "=",
                        FilterOperator::Neq => "IS DISTINCT FROM",
                        FilterOperator::Gt => ">",
                        FilterOperator::Gte => ">=",
                        FilterOperator::Lt => "<",
                        _ => "<=",
                    };
                    format!("{} {} {}", col, cmp, ph)
                }
            };
            Some(sql)
        }
    }
}

/// SELECT the rows of a record set: parent scope and narrowing conditions, then
/// ORDER BY (nulls first, pk as tie breaker), then LIMIT/OFFSET from the window.
/// Conditions and sort keys on unknown columns are skipped.
pub fn select_set(table: &TableRef<'_>, set: &RecordSet) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut where_parts = Vec::new();
    let parent_id = set.scope.parent.as_ref().map(|p| p.id.as_str());
    if let Some(p) = table.parent_predicate(&mut q, parent_id) {
        where_parts.push(p);
    }
    for condition in set.conditions() {
        if let Some(sql) = compile_condition(table, &mut q, condition) {
            where_parts.push(sql);
        }
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let mut order_parts = Vec::new();
    if let Some(sort) = set.order().filter(|s| table.column(&s.field).is_some()) {
        let nulls = match sort.direction {
            crate::recordset::SortDirection::Asc => "NULLS FIRST",
            crate::recordset::SortDirection::Desc => "NULLS LAST",
        };
        order_parts.push(format!("{} {} {}", quoted(&sort.field), sort.direction.as_sql(), nulls));
    }
    order_parts.push(quoted(table.pk));
    let order_clause = format!(" ORDER BY {}", order_parts.join(", "));

    let window_clause = set
        .window()
        .map(|w| format!(" LIMIT {} OFFSET {}", w.per_page.min(1000), w.offset()))
        .unwrap_or_default();

    q.sql = format!(
        "SELECT {} FROM {}{}{}{}",
        table.select_column_list(),
        table.table(),
        where_clause,
        order_clause,
        window_clause
    );
    q
}

/// INSERT: stored columns present in `attrs`. Columns with a DB default are omitted when
/// absent so the default applies; the primary key is only written when supplied.
pub fn insert(table: &TableRef<'_>, attrs: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &table.binding.columns {
        let val = attrs.get(&c.name).cloned();
        if val.is_none() && (c.has_default || c.name == table.pk) {
            continue;
        }
        let ph = q.placeholder(val.unwrap_or(Value::Null), Some(c));
        cols.push(quoted(&c.name));
        placeholders.push(ph);
    }
    let returning = table.select_column_list();
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table.table(), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table.table(),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only stored columns present in `attrs`. Touches `updated_at` when the table has one.
pub fn update(table: &TableRef<'_>, id: &str, attrs: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut sets = Vec::new();
    let mut touched = HashSet::new();
    for c in &table.binding.columns {
        if c.name == table.pk {
            continue;
        }
        let Some(v) = attrs.get(&c.name) else { continue };
        let rhs = q.placeholder(v.clone(), Some(c));
        sets.push(format!("{} = {}", quoted(&c.name), rhs));
        touched.insert(c.name.as_str());
    }
    if table.column("updated_at").is_some() && !touched.contains("updated_at") {
        sets.push(format!("{} = NOW()", quoted("updated_at")));
    }
    if sets.is_empty() {
        let predicate = table.member_predicate(&mut q, id, None);
        q.sql = format!(
            "SELECT {} FROM {} WHERE {}",
            table.select_column_list(),
            table.table(),
            predicate
        );
        return q;
    }
    let predicate = table.member_predicate(&mut q, id, None);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} RETURNING {}",
        table.table(),
        sets.join(", "),
        predicate,
        table.select_column_list()
    );
    q
}

/// DELETE by id. Returns the primary key of the deleted row, if any.
pub fn delete(table: &TableRef<'_>, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let predicate = table.member_predicate(&mut q, id, None);
    q.sql = format!(
        "DELETE FROM {} WHERE {} RETURNING {}",
        table.table(),
        predicate,
        quoted(table.pk)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnInfo;
    use crate::record::{ParentRef, Scope};
    use crate::recordset::{Sort, SortDirection, Window};
    use serde_json::json;

    fn binding() -> StorageBinding {
        let col = |name: &str, pg_type: Option<&str>, has_default: bool| ColumnInfo {
            name: name.into(),
            pg_type: pg_type.map(String::from),
            has_default,
        };
        StorageBinding {
            schema_name: "public".into(),
            table_name: "members".into(),
            columns: vec![
                col("id", Some("bigint"), true),
                col("ship_id", Some("bigint"), false),
                col("name", None, false),
                col("rank", None, false),
                col("age", Some("integer"), false),
                col("updated_at", Some("timestamptz"), true),
            ],
        }
    }

    fn table(binding: &StorageBinding) -> TableRef<'_> {
        TableRef {
            binding,
            pk: "id",
            parent_fk: Some("ship_id"),
        }
    }

    #[test]
    fn test_select_by_id_with_parent_scope() {
        let b = binding();
        let q = select_by_id(&table(&b), "4", Some("1"));
        assert!(q.sql.ends_with(r#"FROM "public"."members" WHERE "id" = $1::bigint AND "ship_id" = $2::bigint"#));
        assert_eq!(q.params, vec![json!("4"), json!("1")]);
    }

    #[test]
    fn test_select_set_compiles_conditions_sort_and_window() {
        let b = binding();
        let scope = Scope::collection("members").under(ParentRef {
            resource: "ships".into(),
            id: "1".into(),
        });
        let set = RecordSet::new(scope)
            .narrow(Condition::Search {
                fields: vec!["name".into(), "rank".into()],
                term: "50%".into(),
            })
            .narrow(Condition::Compare {
                field: "age".into(),
                op: FilterOperator::Gte,
                value: json!("30"),
            })
            .ordered(Sort {
                field: "name".into(),
                direction: SortDirection::Desc,
            })
            .windowed(Window { page: 3, per_page: 10 });
        let q = select_set(&table(&b), &set);
        assert!(q.sql.contains(
            r#"WHERE "ship_id" = $1::bigint AND ("name"::text ILIKE $2 OR "rank"::text ILIKE $2) AND "age" >= $3::integer"#
        ));
        assert!(q.sql.ends_with(r#"ORDER BY "name" DESC NULLS LAST, "id" LIMIT 10 OFFSET 20"#));
        assert_eq!(q.params, vec![json!("1"), json!("%50\\%%"), json!("30")]);
    }

    #[test]
    fn test_select_set_skips_unknown_columns() {
        let b = binding();
        let set = RecordSet::new(Scope::collection("members"))
            .narrow(Condition::Compare {
                field: "nope".into(),
                op: FilterOperator::Eq,
                value: json!("x"),
            })
            .ordered(Sort {
                field: "nope".into(),
                direction: SortDirection::Asc,
            });
        let q = select_set(&table(&b), &set);
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.ends_with(r#"ORDER BY "id""#));
        assert!(q.params.is_empty());
    }

    #[test]
    fn test_insert_omits_defaults_and_unknown_attributes() {
        let b = binding();
        let attrs = json!({ "name": "Data", "ship_id": 1, "bogus": true });
        let q = insert(&table(&b), attrs.as_object().unwrap());
        assert!(q.sql.starts_with(
            r#"INSERT INTO "public"."members" ("ship_id", "name", "rank", "age") VALUES ($1::bigint, $2, $3, $4::integer)"#
        ));
        assert_eq!(q.params, vec![json!(1), json!("Data"), Value::Null, Value::Null]);
    }

    #[test]
    fn test_update_touches_updated_at() {
        let b = binding();
        let attrs = json!({ "rank": "captain", "id": 9 });
        let q = update(&table(&b), "4", attrs.as_object().unwrap());
        assert!(q.sql.starts_with(
            r#"UPDATE "public"."members" SET "rank" = $1, "updated_at" = NOW() WHERE "id" = $2::bigint RETURNING"#
        ));
        assert_eq!(q.params, vec![json!("captain"), json!("4")]);
    }

    #[test]
    fn test_delete_returns_pk() {
        let b = binding();
        let q = delete(&table(&b), "4");
        assert_eq!(q.sql, r#"DELETE FROM "public"."members" WHERE "id" = $1::bigint RETURNING "id""#);
    }
}
