//! Route tables: common health/version routes and the admin resource routes.

mod common;
mod resource;

pub use common::common_routes;
pub use resource::{admin_routes, BODY_LIMIT_BYTES};
