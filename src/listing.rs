//! Listing state of an index request (text query, filters, sort, page) and
//! the transformations it applies to a `RecordSet`.

use crate::recordset::{Condition, FilterOperator, RecordSet, Sort, SortDirection, Window};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const QUERY_PARAM: &str = "q";
pub const SORT_PARAM: &str = "sort";
pub const DIRECTION_PARAM: &str = "dir";
pub const PAGE_PARAM: &str = "page";
const FILTER_PREFIX: &str = "filter[";

/// Host-declared listing policy of a resource.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ListingPolicy {
    /// Fields searched by the free-text query.
    #[serde(default)]
    pub searchable: Vec<String>,
    /// Filterable fields and the operators allowed on each.
    #[serde(default)]
    pub filterable: IndexMap<String, Vec<FilterOperator>>,
    #[serde(default)]
    pub sortable: Vec<String>,
    /// Sort used when the request names none (or names one that is not sortable).
    #[serde(default)]
    pub default_sort: Option<Sort>,
    /// Direction used when the request names a sort key without a direction.
    #[serde(default)]
    pub default_direction: SortDirection,
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueryForm {
    pub term: Option<String>,
    pub fields: Vec<String>,
}

impl QueryForm {
    pub fn from_params(params: &BTreeMap<String, String>, policy: &ListingPolicy) -> Self {
        let term = params
            .get(QUERY_PARAM)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        QueryForm {
            term,
            fields: policy.searchable.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterEntry {
    pub field: String,
    pub op: FilterOperator,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterForm {
    pub filters: Vec<FilterEntry>,
}

impl FilterForm {
    /// Reads `filter[<field>][<op>]=value` (and `filter[<field>]=value` as `eq`).
    /// Fields or operators the policy does not declare are ignored.
    pub fn from_params(params: &BTreeMap<String, String>, policy: &ListingPolicy) -> Self {
        let mut filters = Vec::new();
        for (key, value) in params {
            let Some((field, op)) = parse_filter_key(key) else { continue };
            if value.trim().is_empty() {
                continue;
            }
            let allowed = policy.filterable.get(field).map(|ops| ops.contains(&op)).unwrap_or(false);
            if !allowed {
                tracing::debug!(field = %field, op = op.as_str(), "ignoring undeclared filter");
                continue;
            }
            filters.push(FilterEntry {
                field: field.to_string(),
                op,
                value: value.trim().to_string(),
            });
        }
        FilterForm { filters }
    }
}

fn parse_filter_key(key: &str) -> Option<(&str, FilterOperator)> {
    let rest = key.strip_prefix(FILTER_PREFIX)?;
    let (field, rest) = rest.split_once(']')?;
    if field.is_empty() {
        return None;
    }
    if rest.is_empty() {
        return Some((field, FilterOperator::Eq));
    }
    let op = rest.strip_prefix('[')?.strip_suffix(']')?;
    Some((field, FilterOperator::parse(op)?))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SortForm {
    pub sort: Option<Sort>,
}

impl SortForm {
    pub fn from_params(params: &BTreeMap<String, String>, policy: &ListingPolicy) -> Self {
        let requested = params
            .get(SORT_PARAM)
            .map(|s| s.trim())
            .filter(|s| policy.sortable.iter().any(|f| f == s));
        let sort = match requested {
            Some(field) => {
                let direction = params
                    .get(DIRECTION_PARAM)
                    .and_then(|d| SortDirection::parse(d))
                    .unwrap_or(policy.default_direction);
                Some(Sort {
                    field: field.to_string(),
                    direction,
                })
            }
            None => policy.default_sort.clone(),
        };
        SortForm { sort }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PageForm {
    pub window: Option<Window>,
}

impl PageForm {
    pub fn from_params(params: &BTreeMap<String, String>, policy: &ListingPolicy) -> Self {
        let window = policy.per_page.filter(|n| *n > 0).map(|per_page| Window {
            page: params
                .get(PAGE_PARAM)
                .and_then(|p| p.trim().parse::<u32>().ok())
                .filter(|p| *p > 0)
                .unwrap_or(1),
            per_page,
        });
        PageForm { window }
    }
}

pub fn narrow_by_query(set: RecordSet, query: &QueryForm) -> RecordSet {
    match &query.term {
        Some(term) if !query.fields.is_empty() => set.narrow(Condition::Search {
            fields: query.fields.clone(),
            term: term.clone(),
        }),
        _ => set,
    }
}

pub fn narrow_by_filter(set: RecordSet, filter: &FilterForm) -> RecordSet {
    filter.filters.iter().fold(set, |set, f| {
        set.narrow(Condition::Compare {
            field: f.field.clone(),
            op: f.op,
            value: Value::String(f.value.clone()),
        })
    })
}

pub fn sort_by(set: RecordSet, sort: &SortForm) -> RecordSet {
    match &sort.sort {
        Some(s) => set.ordered(s.clone()),
        None => set,
    }
}

pub fn paginate(set: RecordSet, page: &PageForm) -> RecordSet {
    match page.window {
        Some(w) => set.windowed(w),
        None => set,
    }
}

/// Narrow by query and filter, then sort.
pub fn apply_queries(set: RecordSet, query: &QueryForm, filter: &FilterForm, sort: &SortForm) -> RecordSet {
    let narrowed = narrow_by_filter(narrow_by_query(set, query), filter);
    sort_by(narrowed, sort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Scope;
    use rstest::rstest;

    fn policy() -> ListingPolicy {
        let mut filterable = IndexMap::new();
        filterable.insert("rank".to_string(), vec![FilterOperator::Eq, FilterOperator::Neq]);
        filterable.insert("age".to_string(), vec![FilterOperator::Gte, FilterOperator::Lt]);
        ListingPolicy {
            searchable: vec!["name".into(), "position".into()],
            filterable,
            sortable: vec!["name".into(), "age".into()],
            default_sort: Some(Sort {
                field: "id".into(),
                direction: SortDirection::Desc,
            }),
            default_direction: SortDirection::Asc,
            per_page: Some(20),
        }
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[rstest]
    #[case("filter[rank]", Some(("rank", FilterOperator::Eq)))]
    #[case("filter[age][gte]", Some(("age", FilterOperator::Gte)))]
    #[case("filter[age][between]", None)]
    #[case("filter[]", None)]
    #[case("rank", None)]
    fn test_parse_filter_key(#[case] key: &str, #[case] expected: Option<(&str, FilterOperator)>) {
        assert_eq!(parse_filter_key(key), expected);
    }

    #[test]
    fn test_filter_form_keeps_declared_only() {
        let p = params(&[
            ("filter[rank]", "captain"),
            ("filter[rank][contains]", "cap"),
            ("filter[secret]", "x"),
            ("filter[age][gte]", "30"),
            ("filter[age][lt]", " "),
        ]);
        let form = FilterForm::from_params(&p, &policy());
        assert_eq!(
            form.filters,
            vec![
                FilterEntry {
                    field: "age".into(),
                    op: FilterOperator::Gte,
                    value: "30".into()
                },
                FilterEntry {
                    field: "rank".into(),
                    op: FilterOperator::Eq,
                    value: "captain".into()
                },
            ]
        );
    }

    #[test]
    fn test_sort_form_uses_host_default_direction() {
        let form = SortForm::from_params(&params(&[("sort", "name")]), &policy());
        assert_eq!(
            form.sort,
            Some(Sort {
                field: "name".into(),
                direction: SortDirection::Asc
            })
        );
        let form = SortForm::from_params(&params(&[("sort", "age"), ("dir", "desc")]), &policy());
        assert_eq!(form.sort.unwrap().direction, SortDirection::Desc);
    }

    #[test]
    fn test_sort_form_falls_back_to_default_sort() {
        let form = SortForm::from_params(&params(&[("sort", "password")]), &policy());
        assert_eq!(form.sort, policy().default_sort);
    }

    #[test]
    fn test_page_form() {
        let form = PageForm::from_params(&params(&[("page", "3")]), &policy());
        assert_eq!(form.window, Some(Window { page: 3, per_page: 20 }));
        let form = PageForm::from_params(&params(&[("page", "zero")]), &policy());
        assert_eq!(form.window.unwrap().page, 1);
        let form = PageForm::from_params(&params(&[]), &ListingPolicy::default());
        assert_eq!(form.window, None);
    }

    #[test]
    fn test_query_form_ignores_blank_term() {
        let form = QueryForm::from_params(&params(&[("q", "   ")]), &policy());
        assert_eq!(form.term, None);
    }

    #[test]
    fn test_apply_queries_equals_sort_after_narrowing() {
        let p = params(&[("q", "riker"), ("filter[rank][neq]", "ensign"), ("sort", "age")]);
        let (q, f, s) = (
            QueryForm::from_params(&p, &policy()),
            FilterForm::from_params(&p, &policy()),
            SortForm::from_params(&p, &policy()),
        );
        let base = RecordSet::new(Scope::collection("members"));

        let applied = apply_queries(base.clone(), &q, &f, &s);
        let query_first = sort_by(narrow_by_filter(narrow_by_query(base.clone(), &q), &f), &s);
        let filter_first = sort_by(narrow_by_query(narrow_by_filter(base.clone(), &f), &q), &s);
        let sorted_early = narrow_by_filter(narrow_by_query(sort_by(base, &s), &q), &f);

        assert_eq!(applied, query_first);
        assert_eq!(applied, filter_first);
        assert_eq!(applied, sorted_early);
        assert_eq!(applied.conditions().len(), 2);
    }
}
