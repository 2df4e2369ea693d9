//! Shared application state for all routes. The site is frozen before it is shared.

use crate::config::AdminSite;
use crate::store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub site: Arc<AdminSite>,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub fn new(site: Arc<AdminSite>, store: Arc<dyn Store>) -> Self {
        AppState { site, store }
    }
}
