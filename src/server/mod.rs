mod handlers;
mod state;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::Config;
use crate::location::NominatimClient;
use crate::rates::RateTable;

pub use state::AppState;

pub fn build_router(config: &Config) -> Router {
    let state = AppState {
        table: RateTable::statewide(),
        geocoder: Arc::new(NominatimClient::new(&config.nominatim_url, &config.user_agent)),
    };
    router_with_state(state)
}

pub fn router_with_state(state: AppState) -> Router {
    Router::new()
        .route("/api/rates", get(handlers::rate_list))
        .route("/api/rates/{region}", get(handlers::rate_for_region))
        .route("/api/estimate", get(handlers::estimate))
        .route("/api/resolve", get(handlers::resolve))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

pub async fn start(host: &str, port: u16, config: &Config) -> std::io::Result<()> {
    let app = build_router(config);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(%addr, nominatim = %config.nominatim_url, "geotax server listening");
    eprintln!("  geotax server listening on http://{}", addr);
    eprintln!("  Press Ctrl+C to stop.");

    axum::serve(listener, app).await
}
