//! Lazy record queries: narrowing conditions, ordering and a page window.
//! Stores compile or evaluate a `RecordSet`; it never holds records itself.

use crate::record::{Record, Scope};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Neq,
    Contains,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl FilterOperator {
    pub fn parse(s: &str) -> Option<FilterOperator> {
        Some(match s.trim().to_ascii_lowercase().as_str() {
            "eq" => FilterOperator::Eq,
            "neq" | "ne" => FilterOperator::Neq,
            "contains" => FilterOperator::Contains,
            "gt" => FilterOperator::Gt,
            "gte" => FilterOperator::Gte,
            "lt" => FilterOperator::Lt,
            "lte" => FilterOperator::Lte,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Contains => "contains",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn parse(s: &str) -> Option<SortDirection> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// 1-based page of `per_page` records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Window {
    pub page: u32,
    pub per_page: u32,
}

impl Window {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Condition {
    /// Case-insensitive substring match on any of `fields`.
    Search { fields: Vec<String>, term: String },
    Compare {
        field: String,
        op: FilterOperator,
        value: Value,
    },
}

impl Condition {
    fn canonical_key(&self) -> (u8, String, &'static str, String) {
        match self {
            Condition::Search { fields, term } => (0, fields.join(","), "", term.clone()),
            Condition::Compare { field, op, value } => (1, field.clone(), op.as_str(), value.to_string()),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Condition::Search { fields, term } => {
                let needle = term.to_lowercase();
                fields.iter().any(|f| {
                    record
                        .get(f)
                        .and_then(value_text)
                        .map(|t| t.to_lowercase().contains(&needle))
                        .unwrap_or(false)
                })
            }
            Condition::Compare { field, op, value } => {
                let attr = record.get(field).unwrap_or(&Value::Null);
                match op {
                    FilterOperator::Eq => loose_eq(attr, value),
                    FilterOperator::Neq => !loose_eq(attr, value),
                    FilterOperator::Contains => match (value_text(attr), value_text(value)) {
                        (Some(a), Some(b)) => a.to_lowercase().contains(&b.to_lowercase()),
                        _ => false,
                    },
                    FilterOperator::Gt => compare_values(attr, value) == Some(Ordering::Greater),
                    FilterOperator::Gte => matches!(
                        compare_values(attr, value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    FilterOperator::Lt => compare_values(attr, value) == Some(Ordering::Less),
                    FilterOperator::Lte => matches!(
                        compare_values(attr, value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecordSet {
    pub scope: Scope,
    conditions: Vec<Condition>,
    order: Option<Sort>,
    window: Option<Window>,
}

impl RecordSet {
    pub fn new(scope: Scope) -> Self {
        RecordSet {
            scope,
            conditions: Vec::new(),
            order: None,
            window: None,
        }
    }

    /// Adds a narrowing condition. Conditions are kept in canonical order so the
    /// sequence in which they were added does not matter.
    pub fn narrow(mut self, condition: Condition) -> Self {
        let key = condition.canonical_key();
        match self.conditions.binary_search_by(|c| c.canonical_key().cmp(&key)) {
            Ok(_) => {}
            Err(pos) => self.conditions.insert(pos, condition),
        }
        self
    }

    /// Sets the ordering. Ordering is evaluated after every narrowing condition.
    pub fn ordered(mut self, sort: Sort) -> Self {
        self.order = Some(sort);
        self
    }

    pub fn windowed(mut self, window: Window) -> Self {
        self.window = Some(window);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order(&self) -> Option<&Sort> {
        self.order.as_ref()
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    /// Evaluates the set over already scoped records: narrow, then sort, then window.
    pub fn evaluate(&self, records: Vec<Record>) -> Vec<Record> {
        let mut out: Vec<Record> = records
            .into_iter()
            .filter(|r| self.conditions.iter().all(|c| c.matches(r)))
            .collect();
        if let Some(sort) = &self.order {
            out.sort_by(|a, b| {
                let ord = sort_cmp(a.get(&sort.field), b.get(&sort.field));
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        match self.window {
            Some(w) => out
                .into_iter()
                .skip(w.offset() as usize)
                .take(w.per_page as usize)
                .collect(),
            None => out,
        }
    }
}

/// Text form of a scalar value, used for search and substring filters.
pub fn value_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Equality tolerant of query-string values ("3" equals 3, "true" equals true).
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), _) | (_, Value::Number(_)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => value_text(a) == value_text(b),
    }
}

pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    if a.is_null() || b.is_null() {
        return None;
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return x.partial_cmp(&y);
    }
    Some(value_text(a)?.cmp(&value_text(b)?))
}

/// Sort order with nulls first.
fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(id: i64, name: &str, rank: &str, age: i64) -> Record {
        let row = json!({ "id": id, "name": name, "rank": rank, "age": age });
        Record::from_row("members", "id", row.as_object().unwrap().clone())
    }

    fn crew() -> Vec<Record> {
        vec![
            rec(1, "Jean-Luc Picard", "captain", 59),
            rec(2, "William Riker", "commander", 39),
            rec(3, "Data", "lieutenant_commander", 33),
            rec(4, "Wesley Crusher", "ensign", 17),
        ]
    }

    fn ids(records: &[Record]) -> Vec<i64> {
        records.iter().map(|r| r.id.as_ref().unwrap().as_i64().unwrap()).collect()
    }

    #[test]
    fn test_narrow_is_order_independent() {
        let search = Condition::Search {
            fields: vec!["name".into()],
            term: "r".into(),
        };
        let filter = Condition::Compare {
            field: "age".into(),
            op: FilterOperator::Gte,
            value: json!("30"),
        };
        let a = RecordSet::new(Scope::collection("members"))
            .narrow(search.clone())
            .narrow(filter.clone());
        let b = RecordSet::new(Scope::collection("members")).narrow(filter).narrow(search);
        assert_eq!(a, b);
    }

    #[test]
    fn test_duplicate_condition_is_kept_once() {
        let c = Condition::Compare {
            field: "rank".into(),
            op: FilterOperator::Eq,
            value: json!("ensign"),
        };
        let set = RecordSet::new(Scope::collection("members")).narrow(c.clone()).narrow(c);
        assert_eq!(set.conditions().len(), 1);
    }

    #[test]
    fn test_evaluate_narrows_then_sorts_then_windows() {
        let set = RecordSet::new(Scope::collection("members"))
            .ordered(Sort {
                field: "age".into(),
                direction: SortDirection::Desc,
            })
            .narrow(Condition::Compare {
                field: "age".into(),
                op: FilterOperator::Gt,
                value: json!("20"),
            })
            .windowed(Window { page: 1, per_page: 2 });
        assert_eq!(ids(&set.evaluate(crew())), vec![1, 2]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let set = RecordSet::new(Scope::collection("members")).narrow(Condition::Search {
            fields: vec!["name".into(), "rank".into()],
            term: "COMMANDER".into(),
        });
        assert_eq!(ids(&set.evaluate(crew())), vec![2, 3]);
    }

    #[test]
    fn test_loose_eq() {
        assert!(loose_eq(&json!(3), &json!("3")));
        assert!(loose_eq(&json!(true), &json!("true")));
        assert!(!loose_eq(&json!(null), &json!("")));
        assert!(loose_eq(&json!("ensign"), &json!("ensign")));
    }

    #[test]
    fn test_sort_puts_nulls_first() {
        let mut missing = rec(5, "Guinan", "civilian", 0);
        missing.attributes.insert("age".into(), Value::Null);
        let mut records = crew();
        records.push(missing);
        let set = RecordSet::new(Scope::collection("members")).ordered(Sort {
            field: "age".into(),
            direction: SortDirection::Asc,
        });
        assert_eq!(ids(&set.evaluate(records)), vec![5, 4, 3, 2, 1]);
    }
}
