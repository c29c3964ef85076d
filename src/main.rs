mod api;
mod catalog;
mod config;
mod conversion;
mod db;
mod error;
mod pipeline;
mod storage;

use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api::AppState;
use catalog::SqlImageryRepository;
use config::AppConfig;
use conversion::HttpConversionClient;
use pipeline::Pipeline;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cog_catalog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    // Initialize catalog database
    let db_path = config.database_path();
    let db = Arc::new(db::init_database(&db_path).await?);
    tracing::info!("Catalog database initialized at {:?}", db_path);
    let repository = Arc::new(SqlImageryRepository::new(db));

    // Source and artifact buckets live in the same backend
    let store = config.storage.build().await?;

    let converter = Arc::new(HttpConversionClient::new(
        &config.conversion_url,
        config.conversion_timeout,
    )?);

    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        store,
        converter.clone(),
        repository.clone(),
        config.pipeline_settings(),
    ));

    let state = Arc::new(AppState {
        pipeline,
        repository,
        converter,
    });

    let app = api::router(state).layer(TraceLayer::new_for_http());

    tracing::info!("COG catalog starting on http://{}", config.listen_addr);
    tracing::info!("Conversion service: {}", config.conversion_url);
    tracing::info!(
        "Sources from bucket {:?}, artifacts to {:?} under owner {:?}",
        config.source_bucket,
        config.artifacts.bucket,
        config.artifacts.owner
    );
    tracing::info!("Temporary files under {:?}", config.temp_dir);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
