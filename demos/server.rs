//! Demo admin server: loads a site config (ADMIN_CONFIG, default demos/fleet.json), picks
//! the Postgres store when DATABASE_URL is set and the in-memory store otherwise, and
//! mounts the admin routes under the configured namespace.

use admin_sdk::actions::{ActionSpec, LinkMethod, MemberAction};
use admin_sdk::{
    admin_routes, apply_env_overrides, common_routes, load_from_path, resolve, AppState, MemoryStore, PgStore,
    Store,
};
use axum::Router;
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("admin_sdk=info")),
        )
        .init();

    let config_path = std::env::var("ADMIN_CONFIG").unwrap_or_else(|_| "demos/fleet.json".into());
    let mut config = load_from_path(&config_path).await?;
    apply_env_overrides(&mut config);
    let mut site = resolve(&config)?;

    // Declared in code: only ensigns can be promoted.
    if let Some(members) = site.resource_mut("members") {
        let links = members.links.clone();
        members.push_member_action(MemberAction::resolvable(move |record| {
            let is_ensign = record.get("rank").and_then(|r| r.as_str()) == Some("ensign");
            ActionSpec::link("Promote", format!("{}/promote", links.canonical_path(record).to_path()))
                .with_method(LinkMethod::Post)
                .hidden(!is_ensign)
        }));
    }
    let site = Arc::new(site);

    let store: Arc<dyn Store> = match std::env::var("DATABASE_URL") {
        Ok(url) => Arc::new(PgStore::connect(&url).await?),
        Err(_) => {
            let memory = MemoryStore::new(site.clone());
            memory.seed("ships", json!({ "name": "Enterprise", "registry": "NCC-1701" })).await?;
            memory.seed("ships", json!({ "name": "Defiant", "registry": "NX-74205" })).await?;
            memory
                .seed("members", json!({ "name": "Jean-Luc Picard", "rank": "captain", "ship_id": 1 }))
                .await?;
            memory
                .seed("members", json!({ "name": "Wesley Crusher", "rank": "ensign", "ship_id": 1 }))
                .await?;
            Arc::new(memory)
        }
    };

    let state = AppState::new(site.clone(), store);
    let prefix = match site.namespace.as_deref() {
        Some(ns) => format!("/{}", ns),
        None => "/".to_string(),
    };
    let app = Router::new()
        .merge(common_routes())
        .nest(&prefix, admin_routes(state));

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    tracing::info!("admin listening on http://{}{}", listener.local_addr()?, prefix);
    axum::serve(listener, app).await?;
    Ok(())
}
