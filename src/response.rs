//! Standard response envelope and the HTTP form of pipeline outcomes.

use crate::pipeline::{Outcome, Page, PageBody};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Header carrying the flash alert of a redirect; showing it is the host's concern.
pub const FLASH_HEADER: &str = "x-admin-flash";

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaCount>,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

pub fn page_body(page: Page) -> (StatusCode, Json<SuccessOne<Page>>) {
    let meta = match &page.body {
        PageBody::Listing(listing) => Some(MetaCount {
            count: listing.records.len() as u64,
        }),
        _ => None,
    };
    (page.status, Json(SuccessOne { data: page, meta }))
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Outcome::Render(page) => page_body(*page).into_response(),
            Outcome::Redirect { location, flash } => {
                let mut response = StatusCode::FOUND.into_response();
                let headers = response.headers_mut();
                match HeaderValue::from_str(&location) {
                    Ok(v) => {
                        headers.insert(header::LOCATION, v);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, location = %location, "invalid redirect location");
                        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
                    }
                }
                if let Some(v) = flash.as_deref().and_then(|f| HeaderValue::from_str(f).ok()) {
                    headers.insert(FLASH_HEADER, v);
                }
                response
            }
        }
    }
}
