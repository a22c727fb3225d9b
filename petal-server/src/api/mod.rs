pub mod fetch;
pub mod health;
pub mod list;
pub mod remove;
pub mod upload;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, header};
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use petal_auth::Verb;
use petal_gateway::{Deleter, Getter, Lister, Uploader};

use crate::auth::CapabilityLayer;
use crate::config::ServerConfig;
use crate::ratelimit::RateLimitLayer;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub uploader: Arc<Uploader>,
    pub getter: Arc<Getter>,
    pub lister: Arc<Lister>,
    pub deleter: Arc<Deleter>,
}

/// Build the axum router with all routes and middleware.
///
/// Rate limiting and CORS sit outermost; each protected route group runs
/// its own capability layer so the verb binding is fixed at routing time.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let public = Router::new().route("/health", get(health::health));

    let upload = Router::new()
        .route("/upload", post(upload::upload))
        .route_layer(CapabilityLayer::fixed(
            Verb::Upload,
            server.body_limit_bytes,
        ));

    let list = Router::new()
        .route("/list/{pk}", get(list::list_blobs))
        .route_layer(CapabilityLayer::fixed(Verb::List, 0));

    let blob = Router::new()
        .route(
            "/{sha256}",
            get(fetch::get_blob)
                .head(fetch::head_blob)
                .delete(remove::delete_blob),
        )
        .route_layer(CapabilityLayer::by_method());

    Router::new()
        .merge(public)
        .merge(upload)
        .merge(list)
        .merge(blob)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(RateLimitLayer::new(server.rate_limit_per_second))
        .layer(cors())
        .layer(DefaultBodyLimit::max(server.body_limit_bytes))
}

fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
        ])
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::POST,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ])
        .max_age(std::time::Duration::from_secs(86_400))
        .expose_headers([crate::error::REASON_HEADER.clone()])
}
