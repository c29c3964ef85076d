pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::catalog::ImageryRepository;
use crate::conversion::ConversionService;
use crate::pipeline::Pipeline;

/// Application state shared across handlers
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub repository: Arc<dyn ImageryRepository>,
    pub converter: Arc<dyn ConversionService>,
}

/// Create the imagery API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Sources and conversion
        .route("/api/imagery/list", get(handlers::list_sources))
        .route("/api/imagery/convert", post(handlers::convert))
        .route("/api/imagery/convert-batch", post(handlers::convert_batch))
        // Catalog search
        .route("/api/imagery", get(handlers::search))
        .route("/api/imagery/search", post(handlers::search_structured))
        .with_state(state)
}
