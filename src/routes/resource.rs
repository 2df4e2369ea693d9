//! Resource routes. Parameterized paths so one handler set serves every resource;
//! the second level addresses a resource nested under a parent record.

use crate::handlers::resource::{create, destroy, edit, index, new_form, show, update};
use crate::state::AppState;
use axum::{routing::get, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum accepted request body.
pub const BODY_LIMIT_BYTES: usize = 2 * 1024 * 1024;

pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/:resource", get(index).post(create))
        .route("/:resource/new", get(new_form))
        .route("/:resource/:id", get(show).patch(update).put(update).delete(destroy))
        .route("/:resource/:id/edit", get(edit))
        .route("/:resource/:id/:child", get(index).post(create))
        .route("/:resource/:id/:child/new", get(new_form))
        .route(
            "/:resource/:id/:child/:child_id",
            get(show).patch(update).put(update).delete(destroy),
        )
        .route("/:resource/:id/:child/:child_id/edit", get(edit))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .with_state(state)
}
