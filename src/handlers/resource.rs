//! Resource handlers: one per resourceful route, all funnelled through the pipeline.

use crate::action::ActionKind;
use crate::config::Resource;
use crate::error::AppError;
use crate::inflect::singularize;
use crate::pipeline::{resolve_route, AdminRequest, Outcome, ResourceController, RouteParams};
use crate::state::AppState;
use axum::{
    extract::{OriginalUri, Path, RawQuery, State},
    Json,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Submitted attributes: the object under the singular resource key when present
/// (`{"member": {...}}`), otherwise the whole body.
fn submitted_attributes(resource: &Resource, body: Option<Value>) -> Result<Map<String, Value>, AppError> {
    match body {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(mut m)) => match m.remove(&singularize(&resource.name)) {
            Some(Value::Object(inner)) => Ok(inner),
            Some(other) => {
                m.insert(singularize(&resource.name), other);
                Ok(m)
            }
            None => Ok(m),
        },
        Some(_) => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Query pairs in the order received.
fn query_pairs(raw: Option<&str>) -> Result<Vec<(String, String)>, AppError> {
    match raw {
        None | Some("") => Ok(Vec::new()),
        Some(q) => serde_urlencoded::from_str(q).map_err(|e| AppError::BadRequest(format!("query string: {}", e))),
    }
}

async fn run(
    state: AppState,
    native: ActionKind,
    params: HashMap<String, String>,
    uri: OriginalUri,
    query: Option<String>,
    body: Option<Value>,
) -> Result<Outcome, AppError> {
    let route = RouteParams::from_map(&params);
    let (resource, scope) = resolve_route(&state.site, &route)?;
    let attributes = submitted_attributes(resource, body)?;
    let request = AdminRequest::new(uri.0.path(), scope)
        .with_query_pairs(query_pairs(query.as_deref())?)
        .with_attributes(attributes);
    ResourceController::new(&state.site, resource, state.store.as_ref(), native, request)
        .dispatch()
        .await
}

pub async fn index(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    uri: OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Outcome, AppError> {
    run(state, ActionKind::Index, params, uri, query, None).await
}

pub async fn show(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    uri: OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Outcome, AppError> {
    run(state, ActionKind::Show, params, uri, query, None).await
}

pub async fn new_form(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    uri: OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Outcome, AppError> {
    run(state, ActionKind::New, params, uri, query, None).await
}

pub async fn edit(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    uri: OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Outcome, AppError> {
    run(state, ActionKind::Edit, params, uri, query, None).await
}

pub async fn create(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    uri: OriginalUri,
    RawQuery(query): RawQuery,
    body: Option<Json<Value>>,
) -> Result<Outcome, AppError> {
    run(state, ActionKind::Create, params, uri, query, body.map(|Json(v)| v)).await
}

pub async fn update(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    uri: OriginalUri,
    RawQuery(query): RawQuery,
    body: Option<Json<Value>>,
) -> Result<Outcome, AppError> {
    run(state, ActionKind::Update, params, uri, query, body.map(|Json(v)| v)).await
}

pub async fn destroy(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    uri: OriginalUri,
    RawQuery(query): RawQuery,
) -> Result<Outcome, AppError> {
    run(state, ActionKind::Destroy, params, uri, query, None).await
}
