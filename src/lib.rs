//! Image processing routes for axum: text overlay and format conversion on
//! top of a pluggable [`ImageEngine`](engine::ImageEngine).

pub mod config;
pub mod engine;
pub mod error;
pub mod request;
pub mod response;
pub mod routes;
pub mod server;

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Extension, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use engine::ImageEngine;

pub use config::Config;
pub use error::AppError;

/// The application router: image routes mounted at `mount`, with `engine`
/// injected into every handler.
pub fn app<E: ImageEngine>(engine: Arc<E>, mount: &str, body_limit: usize) -> Router {
    let routes = routes::register::<E>(Router::new());
    let router = if mount == "/" {
        routes
    } else {
        Router::new().nest(mount, routes)
    };

    router.layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(Extension(engine))
            .into_inner(),
    )
}
