use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::catalog::{ImageryRecord, Page, PageRequest, SearchCriteria};
use crate::error::{Result, ServerError};
use crate::pipeline::BatchReport;

/// Query params for source listing
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub prefix: Option<String>,
}

/// Query params for single conversion
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertQuery {
    pub imagery_key: Option<String>,
}

/// GET /health - Liveness plus the conversion service's health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let conversion = if state.converter.health().await {
        "up"
    } else {
        "down"
    };

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "conversionService": conversion
    }))
}

/// GET /api/imagery/list - Source keys available for conversion
pub async fn list_sources(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<String>>> {
    let prefix = query.prefix.as_deref().filter(|p| !p.is_empty());
    let keys = state.pipeline.list_sources(prefix).await?;
    Ok(Json(keys))
}

/// POST /api/imagery/convert?imageryKey=K - Convert one source object
pub async fn convert(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ConvertQuery>,
) -> Result<Json<ImageryRecord>> {
    let key = query
        .imagery_key
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ServerError::InvalidRequest("imageryKey is required".to_string()))?;

    match state.pipeline.convert_one(&key).await {
        Ok(record) => Ok(Json(record)),
        Err(source) => Err(ServerError::Convert { key, source }),
    }
}

/// POST /api/imagery/convert-batch - Convert a list of keys, skipping failures
pub async fn convert_batch(
    State(state): State<Arc<AppState>>,
    Json(keys): Json<Vec<String>>,
) -> Json<BatchReport> {
    tracing::info!("Batch conversion of {} keys", keys.len());
    Json(state.pipeline.convert_many(&keys).await)
}

/// GET /api/imagery - Search with criteria, paging and sort as query params
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Page<ImageryRecord>>> {
    let criteria = SearchCriteria::from_pairs(&params).map_err(ServerError::InvalidRequest)?;
    let request = PageRequest::from_pairs(&params).map_err(ServerError::InvalidRequest)?;

    let page = state.repository.search(&criteria, &request).await?;
    Ok(Json(page))
}

/// POST /api/imagery/search - Search with criteria as a JSON body
pub async fn search_structured(
    State(state): State<Arc<AppState>>,
    Query(params): Query<Vec<(String, String)>>,
    Json(criteria): Json<SearchCriteria>,
) -> Result<Json<Page<ImageryRecord>>> {
    let request = PageRequest::from_pairs(&params).map_err(ServerError::InvalidRequest)?;

    let page = state.repository.search(&criteria, &request).await?;
    Ok(Json(page))
}
