//! Request-to-presentation pipeline for one resource: classify the action, load
//! records, resolve schemas and action menus, and produce a page or a redirect.

use crate::action::{classify_on_route, Action, ActionContext, ActionKind};
use crate::actions::{resolve_collection_actions, resolve_member_actions, ActionSpec};
use crate::config::{AdminSite, Resource};
use crate::error::{AppError, StoreError};
use crate::format::{strip_format_location, Format, FORMAT_PARAM};
use crate::listing::{apply_queries, paginate, FilterForm, PageForm, QueryForm, SortForm};
use crate::record::{ParentRef, Record, Scope};
use crate::recordset::RecordSet;
use crate::schema::ResolvedSchema;
use crate::store::Store;
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Query parameter naming the action a page renders under. Only rendering actions can be
/// swapped this way; mutations always come from the route.
pub const ACTION_PARAM: &str = "action";

/// Route parameters of an admin request. `child` addresses a resource nested under `resource`/`id`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteParams {
    pub resource: String,
    pub id: Option<String>,
    pub child: Option<String>,
    pub child_id: Option<String>,
}

impl RouteParams {
    pub fn from_map(params: &std::collections::HashMap<String, String>) -> Self {
        RouteParams {
            resource: params.get("resource").cloned().unwrap_or_default(),
            id: params.get("id").cloned(),
            child: params.get("child").cloned(),
            child_id: params.get("child_id").cloned(),
        }
    }
}

/// Resolve route parameters to the addressed resource and its scope.
/// A child route must name a resource declared under the parent segment.
pub fn resolve_route<'s>(site: &'s AdminSite, route: &RouteParams) -> Result<(&'s Resource, Scope), AppError> {
    let top = site
        .resource(&route.resource)
        .ok_or_else(|| AppError::NotFound(format!("resource '{}'", route.resource)))?;
    let Some(child_name) = &route.child else {
        let scope = Scope {
            resource: top.name.clone(),
            id: route.id.clone(),
            parent: None,
        };
        return Ok((top, scope));
    };
    let child = site
        .resource(child_name)
        .filter(|c| c.parent.as_ref().map(|p| p.resource == top.name).unwrap_or(false))
        .ok_or_else(|| AppError::NotFound(format!("resource '{}' under '{}'", child_name, top.name)))?;
    let parent_id = route
        .id
        .clone()
        .ok_or_else(|| AppError::BadRequest("nested route without parent id".into()))?;
    let scope = Scope {
        resource: child.name.clone(),
        id: route.child_id.clone(),
        parent: Some(ParentRef {
            resource: top.name.clone(),
            id: parent_id,
        }),
    };
    Ok((child, scope))
}

/// Everything the pipeline reads from an incoming request.
#[derive(Clone, Debug)]
pub struct AdminRequest {
    pub path: String,
    pub scope: Scope,
    /// Query parameters by name (listing forms, format, action override). Last value wins.
    pub query: BTreeMap<String, String>,
    /// Query parameters as received, in order and with repeats.
    pub query_pairs: Vec<(String, String)>,
    /// Submitted attributes, not yet filtered.
    pub attributes: Map<String, Value>,
}

impl AdminRequest {
    pub fn new(path: impl Into<String>, scope: Scope) -> Self {
        AdminRequest {
            path: path.into(),
            scope,
            query: BTreeMap::new(),
            query_pairs: Vec::new(),
            attributes: Map::new(),
        }
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query_pairs = query.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        self.query = query;
        self
    }

    pub fn with_query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query = pairs.iter().cloned().collect();
        self.query_pairs = pairs;
        self
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn action_name(&self) -> Option<&str> {
        self.query.get(ACTION_PARAM).map(String::as_str)
    }

    pub fn format(&self) -> Format {
        Format::parse(self.query.get(FORMAT_PARAM).map(String::as_str))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    Index,
    Show,
    New,
    Edit,
}

#[derive(Debug, Serialize)]
pub struct ListedRecord {
    pub record: Record,
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Serialize)]
pub struct Listing {
    pub records: Vec<ListedRecord>,
    pub collection_actions: Vec<ActionSpec>,
    pub query: QueryForm,
    pub filter: FilterForm,
    pub sort: SortForm,
    pub page: PageForm,
}

/// Where a form submits to.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct FormTarget {
    pub href: String,
    pub method: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PageBody {
    Listing(Listing),
    Member { record: Record, actions: Vec<ActionSpec> },
    Form { record: Record, submit: FormTarget },
}

/// A renderable page. The rendering engine picks templates from `view` and the schema's fields.
#[derive(Debug, Serialize)]
pub struct Page {
    #[serde(skip)]
    pub status: StatusCode,
    pub view: View,
    pub title: String,
    pub action: Action,
    pub format: Format,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub schema: ResolvedSchema,
    pub body: PageBody,
}

#[derive(Debug)]
pub enum Outcome {
    Render(Box<Page>),
    Redirect { location: String, flash: Option<String> },
}

impl Outcome {
    pub fn redirect(location: impl Into<String>) -> Self {
        Outcome::Redirect {
            location: location.into(),
            flash: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Render(page) => page.status,
            Outcome::Redirect { .. } => StatusCode::FOUND,
        }
    }
}

/// Runs one request against one resource. Holds the request's single active action.
pub struct ResourceController<'a> {
    site: &'a AdminSite,
    resource: &'a Resource,
    store: &'a dyn Store,
    request: AdminRequest,
    context: ActionContext,
    format: Format,
}

impl<'a> ResourceController<'a> {
    /// `native` is the action the route maps to; the request may name another rendering action.
    pub fn new(
        site: &'a AdminSite,
        resource: &'a Resource,
        store: &'a dyn Store,
        native: ActionKind,
        request: AdminRequest,
    ) -> Self {
        let action = classify_on_route(native, request.action_name());
        let format = request.format();
        ResourceController {
            site,
            resource,
            store,
            request,
            context: ActionContext::new(action),
            format,
        }
    }

    pub fn current_action(&self) -> &Action {
        self.context.current()
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// Run the operation the active action names.
    pub async fn dispatch(mut self) -> Result<Outcome, AppError> {
        let kind = self.current_action().kind;
        tracing::debug!(resource = %self.resource.name, action = %kind, format = self.format.as_str(), "dispatch");
        match kind {
            ActionKind::Index => self.index().await,
            ActionKind::Show => self.show().await,
            ActionKind::New => self.new_form().await,
            ActionKind::Create => self.create().await,
            ActionKind::Edit => self.edit().await,
            ActionKind::Update => self.update().await,
            ActionKind::Destroy => self.destroy().await,
        }
    }

    pub async fn index(&mut self) -> Result<Outcome, AppError> {
        if !self.site.format_gate.is_non_default_format_allowed(self.format) {
            let location = strip_format_location(&self.request.path, &self.request.query_pairs);
            tracing::debug!(format = self.format.as_str(), location = %location, "format not allowed");
            return Ok(Outcome::redirect(location));
        }
        let policy = &self.resource.listing;
        let query = QueryForm::from_params(&self.request.query, policy);
        let filter = FilterForm::from_params(&self.request.query, policy);
        let sort = SortForm::from_params(&self.request.query, policy);
        let page = PageForm::from_params(&self.request.query, policy);
        let set = apply_queries(self.records_scope(), &query, &filter, &sort);
        let records = self.load_records(&paginate(set, &page)).await?;

        let records = records
            .into_iter()
            .map(|record| ListedRecord {
                actions: self.resolved_member_actions(&record),
                record,
            })
            .collect();
        let listing = Listing {
            records,
            collection_actions: self.resolved_collection_actions(),
            query,
            filter,
            sort,
            page,
        };
        Ok(self.render(View::Index, self.resource.title.clone(), self.display_schema(), PageBody::Listing(listing)))
    }

    pub async fn show(&mut self) -> Result<Outcome, AppError> {
        let record = self.load_record().await?;
        let actions = self.resolved_member_actions(&record);
        let title = self.member_title(&record);
        Ok(self.render(View::Show, title, self.display_schema(), PageBody::Member { record, actions }))
    }

    pub async fn new_form(&mut self) -> Result<Outcome, AppError> {
        let record = self.build_record();
        Ok(Outcome::Render(Box::new(form_page(
            self.site,
            self.resource,
            *self.current_action(),
            self.format,
            record,
            StatusCode::OK,
        ))))
    }

    pub async fn edit(&mut self) -> Result<Outcome, AppError> {
        let record = self.load_record().await?;
        Ok(Outcome::Render(Box::new(form_page(
            self.site,
            self.resource,
            *self.current_action(),
            self.format,
            record,
            StatusCode::OK,
        ))))
    }

    pub async fn create(&mut self) -> Result<Outcome, AppError> {
        let mut record = self.build_record();
        self.set_record_attributes(&mut record);
        self.persist(record, ActionKind::New).await
    }

    pub async fn update(&mut self) -> Result<Outcome, AppError> {
        let mut record = self.load_record().await?;
        self.set_record_attributes(&mut record);
        self.persist(record, ActionKind::Edit).await
    }

    /// Every outcome redirects to the record's canonical location; only the flash differs.
    pub async fn destroy(&mut self) -> Result<Outcome, AppError> {
        let mut record = self.load_record().await?;
        let flash = match self.destroy_record(&mut record).await {
            Ok(true) => None,
            Ok(false) => Some("Couldn't delete record".to_string()),
            Err(e @ StoreError::IntegrityConstraint { .. }) => Some(format!("Couldn't delete record: {}", e)),
            Err(e) => return Err(e.into()),
        };
        if let Some(message) = &flash {
            tracing::info!(resource = %self.resource.name, id = ?record.id_string(), "{}", message);
        }
        Ok(Outcome::Redirect {
            location: self.resource.links.canonical_path(&record).to_path(),
            flash,
        })
    }

    /// Save, then redirect on success or re-render the form pinned to `form_kind`.
    async fn persist(&mut self, mut record: Record, form_kind: ActionKind) -> Result<Outcome, AppError> {
        if self.save_record(&mut record).await? {
            tracing::info!(resource = %self.resource.name, id = ?record.id_string(), "saved");
            let location = self.resource.links.canonical_path(&record).to_path();
            return Ok(Outcome::redirect(location));
        }
        tracing::debug!(resource = %self.resource.name, errors = ?record.errors, "save rejected");
        let (site, resource, format) = (self.site, self.resource, self.format);
        let page = self.context.with_action(form_kind, |ctx| {
            form_page(site, resource, *ctx.current(), format, record, StatusCode::BAD_REQUEST)
        });
        Ok(Outcome::Render(Box::new(page)))
    }

    fn records_scope(&self) -> RecordSet {
        let mut scope = self.request.scope.clone();
        scope.id = None;
        RecordSet::new(scope)
    }

    pub async fn load_record(&self) -> Result<Record, AppError> {
        let scope = &self.request.scope;
        let id = scope.id.as_deref().unwrap_or_default();
        self.store
            .find_one(self.resource, scope)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} '{}'", self.resource.singular_title, id)))
    }

    pub async fn load_records(&self, set: &RecordSet) -> Result<Vec<Record>, AppError> {
        Ok(self.store.find_many(self.resource, set).await?)
    }

    pub fn build_record(&self) -> Record {
        let mut scope = self.request.scope.clone();
        scope.id = None;
        self.store.build(self.resource, &scope)
    }

    /// Assign submitted attributes the submitting form permits; the rest are dropped.
    /// A create is checked against the `new` form, an update against the `edit` form.
    pub fn set_record_attributes(&self, record: &mut Record) {
        let form_kind = match self.current_action().kind {
            ActionKind::Create => ActionKind::New,
            ActionKind::Update => ActionKind::Edit,
            other => other,
        };
        let form = self.resource.form_schema().apply(&Action::explicit(form_kind), self.format);
        let permitted = crate::schema::PermittedAttributes::from_fields(&form.fields);
        let attributes = permitted.filter(&self.request.attributes);
        let dropped = self.request.attributes.len().saturating_sub(attributes.len());
        if dropped > 0 {
            tracing::debug!(resource = %self.resource.name, dropped, "unpermitted attributes");
        }
        self.store.assign(record, attributes);
    }

    pub async fn save_record(&self, record: &mut Record) -> Result<bool, AppError> {
        Ok(self.store.save(self.resource, record).await?)
    }

    pub async fn destroy_record(&self, record: &mut Record) -> Result<bool, StoreError> {
        self.store.destroy(self.resource, record).await
    }

    pub fn display_schema(&self) -> ResolvedSchema {
        self.resource.display_schema().apply(self.current_action(), self.format)
    }

    pub fn form_schema(&self) -> ResolvedSchema {
        self.resource.form_schema().apply(self.current_action(), self.format)
    }

    pub fn resolved_collection_actions(&self) -> Vec<ActionSpec> {
        resolve_collection_actions(self.resource.collection_actions())
    }

    pub fn resolved_member_actions(&self, record: &Record) -> Vec<ActionSpec> {
        resolve_member_actions(self.resource.member_actions(record), record)
    }

    fn member_title(&self, record: &Record) -> String {
        match record.id_string() {
            Some(id) => format!("{} {}", self.resource.singular_title, id),
            None => self.resource.singular_title.clone(),
        }
    }

    fn render(&self, view: View, title: String, schema: ResolvedSchema, body: PageBody) -> Outcome {
        Outcome::Render(Box::new(Page {
            status: StatusCode::OK,
            view,
            title,
            action: *self.current_action(),
            format: self.format,
            notice: self.site.notice.clone(),
            schema,
            body,
        }))
    }
}

/// Form page for `record` under `action`. New records submit to their collection, persisted ones to themselves.
fn form_page(
    site: &AdminSite,
    resource: &Resource,
    action: Action,
    format: Format,
    record: Record,
    status: StatusCode,
) -> Page {
    let links = &resource.links;
    let (view, title, submit) = if record.persisted {
        (
            View::Edit,
            format!("Edit {}", resource.singular_title),
            FormTarget {
                href: links.canonical_path(&record).to_path(),
                method: "patch",
            },
        )
    } else {
        (
            View::New,
            format!("New {}", resource.singular_title),
            FormTarget {
                href: links.collection_path(record.parent.as_ref()).to_path(),
                method: "post",
            },
        )
    };
    Page {
        status,
        view,
        title,
        action,
        format,
        notice: site.notice.clone(),
        schema: resource.form_schema().apply(&action, format),
        body: PageBody::Form { record, submit },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, SiteConfig};
    use serde_json::json;
    use std::collections::HashMap;

    fn site() -> AdminSite {
        let config: SiteConfig = serde_json::from_value(json!({
            "resources": [
                { "name": "ships" },
                { "name": "members", "parent": { "resource": "ships", "foreign_key": "ship_id" } },
                { "name": "stations" }
            ]
        }))
        .unwrap();
        resolve(&config).unwrap()
    }

    fn route(pairs: &[(&str, &str)]) -> RouteParams {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        RouteParams::from_map(&map)
    }

    #[test]
    fn test_resolve_top_level_route() {
        let site = site();
        let (resource, scope) = resolve_route(&site, &route(&[("resource", "ships"), ("id", "3")])).unwrap();
        assert_eq!(resource.name, "ships");
        assert_eq!(scope, Scope::member("ships", "3"));
    }

    #[test]
    fn test_resolve_nested_route() {
        let site = site();
        let (resource, scope) = resolve_route(
            &site,
            &route(&[("resource", "ships"), ("id", "3"), ("child", "members"), ("child_id", "7")]),
        )
        .unwrap();
        assert_eq!(resource.name, "members");
        assert_eq!(
            scope,
            Scope::member("members", "7").under(ParentRef {
                resource: "ships".into(),
                id: "3".into()
            })
        );
    }

    #[test]
    fn test_resolve_rejects_undeclared_nesting() {
        let site = site();
        let err = resolve_route(&site, &route(&[("resource", "stations"), ("id", "1"), ("child", "members")]));
        assert!(matches!(err, Err(AppError::NotFound(_))));
        let err = resolve_route(&site, &route(&[("resource", "nope")]));
        assert!(matches!(err, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_request_reads_action_and_format() {
        let query: BTreeMap<String, String> = [("action", "edit"), ("format", "CSV")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let request = AdminRequest::new("/ships", Scope::collection("ships")).with_query(query);
        assert_eq!(request.action_name(), Some("edit"));
        assert_eq!(request.format(), Format::Csv);
    }

    #[test]
    fn test_query_pairs_keep_order_and_last_value_wins() {
        let pairs: Vec<(String, String)> = [("sort", "name"), ("format", "csv"), ("sort", "rank")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let request = AdminRequest::new("/ships", Scope::collection("ships")).with_query_pairs(pairs.clone());
        assert_eq!(request.query_pairs, pairs);
        assert_eq!(request.query.get("sort").map(String::as_str), Some("rank"));
    }
}
