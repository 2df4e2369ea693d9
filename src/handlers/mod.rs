//! HTTP handlers for the resourceful admin routes.

pub mod resource;
pub use resource::*;
