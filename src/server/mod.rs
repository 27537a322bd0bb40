mod handlers;
mod state;

use axum::routing::{get, post, put};
use axum::Router;
use state::AppState;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::geocode::NominatimGeocoder;
use crate::resolve::ResolutionEngine;
use crate::zones::{shared, RemoteStore, SyncCoordinator, ZoneCache};

/// Wire up the engine once at startup and hand it to the router. No
/// authorization lives here; an upstream layer is assumed to have vetted
/// every caller already.
pub fn build_router(cfg: &Config) -> Router {
    let cache = shared(ZoneCache::load_from(cfg.cache_path.clone()));
    let remote = RemoteStore::new(cfg);
    let state = Arc::new(AppState {
        engine: ResolutionEngine::new(NominatimGeocoder::new(cfg), cache.clone()),
        coordinator: Mutex::new(SyncCoordinator::new(remote.clone(), cache, cfg)),
        remote,
    });

    Router::new()
        .route("/api/subsidiaries", get(handlers::subsidiaries))
        .route("/api/zones/{subsidiary_id}", get(handlers::zones_by_subsidiary))
        .route(
            "/api/zones",
            post(handlers::create_zone).delete(handlers::delete_zone),
        )
        .route("/api/zones/{zone_id}/streets", put(handlers::replace_streets))
        .route("/api/geocode", post(handlers::geocode))
        .route("/api/resolve", post(handlers::resolve))
        .route("/api/sync", post(handlers::sync_all))
        .route("/api/sync/{subsidiary_id}", post(handlers::sync_one))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn start(cfg: &Config, host: &str, port: u16) {
    let app = build_router(cfg);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| {
            eprintln!("Error: Cannot bind to {}: {}", addr, e);
            std::process::exit(1);
        });

    eprintln!("  Zonda server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    });
}
