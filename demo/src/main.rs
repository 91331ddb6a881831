//! Demo server: resources from `restler.json` plus one hand-written resource.
//!
//! Run from repo root: `cargo run -p restler-demo`
//! Without `DATABASE_URL` rows live in memory; with it tables are created in PostgreSQL.

use async_trait::async_trait;
use restler::{
    load_from_path, Configurator, MemoryStore, PgStore, Reply, Resource, ResourceOptions,
    ResourceRequest, ResourceResult, Store, TunnelingOptions,
};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;

/// `GET /api/status`: library name and version.
struct StatusResource;

#[async_trait]
impl Resource for StatusResource {
    async fn get(&self, req: &ResourceRequest) -> ResourceResult {
        Ok(Some(Reply::ok(json!({
            "name": "restler",
            "version": env!("CARGO_PKG_VERSION"),
            "store": req.store().name(),
        }))))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("restler=info,restler_demo=info")),
        )
        .init();

    let config_path = std::env::var("CONFIG_PATH")
        .unwrap_or_else(|_| concat!(env!("CARGO_MANIFEST_DIR"), "/restler.json").into());
    let config = load_from_path(&config_path).await?;

    let pg = match std::env::var("DATABASE_URL") {
        Ok(url) => Some(PgStore::connect(&url, 5).await?),
        Err(_) => None,
    };
    let store: Arc<dyn Store> = match &pg {
        Some(pg) => Arc::new(pg.clone()),
        None => Arc::new(MemoryStore::new()),
    };

    let mut configurator = Configurator::new(store, config.settings.clone());
    let resolved = configurator.include_config(&config)?;
    if let Some(pg) = &pg {
        pg.ensure_tables(&resolved.models).await?;
    }
    configurator.add_resource(StatusResource, ResourceOptions::new().name("status").path("/api/status"))?;
    configurator.enable_cors();
    configurator.enable_post_tunneling(TunnelingOptions::default());

    for route in configurator.routes() {
        tracing::info!(route = %route.name, pattern = %route.pattern, "route");
    }
    let app = configurator.into_router();

    let addr = std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("restler demo listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
