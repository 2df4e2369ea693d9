//! Admin SDK: schema-driven admin panel scaffolding. Declarative resources become the
//! seven resourceful actions, with listing queries, nested forms and per-record action menus.

pub mod action;
pub mod actions;
pub mod config;
pub mod error;
pub mod format;
pub mod handlers;
pub mod inflect;
pub mod link;
pub mod listing;
pub mod notice;
pub mod pipeline;
pub mod record;
pub mod recordset;
pub mod response;
pub mod routes;
pub mod schema;
pub mod sql;
pub mod state;
pub mod store;
pub mod validation;

pub use action::{classify, classify_on_route, Action, ActionContext, ActionKind, Origin};
pub use config::{apply_env_overrides, load_from_path, resolve, AdminSite, Resource, SiteConfig};
pub use error::{AppError, ConfigError, StoreError};
pub use pipeline::{AdminRequest, Outcome, Page, ResourceController};
pub use routes::{admin_routes, common_routes};
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};
