//! Read-only HTTP API over stored listings

use crate::ingestion::types::{CleanedListing, ListingStats};
use crate::ingestion::write::ListingStore;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::error;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ListingStore>,
}

#[derive(Serialize, Deserialize)]
pub struct ApiResponse {
    pub message: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListingsQuery {
    pub limit: Option<usize>,
}

pub fn router(store: Arc<dyn ListingStore>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/api/health", get(health_check))
        .route("/api/stats", get(get_stats))
        .route("/api/listings", get(get_listings))
        .layer(CorsLayer::permissive())
        .with_state(AppState { store })
}

async fn health_check() -> Json<ApiResponse> {
    Json(ApiResponse {
        message: "Listings API is running!".to_string(),
        status: "ok".to_string(),
    })
}

async fn get_stats(State(state): State<AppState>) -> Result<Json<ListingStats>, StatusCode> {
    state.store.statistics().await.map(Json).map_err(|e| {
        error!("Database error: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn get_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingsQuery>,
) -> Result<Json<Vec<CleanedListing>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);

    state.store.cleaned_listings(limit).await.map(Json).map_err(|e| {
        error!("Database error: {:#}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::memory::InMemoryListingStore;
    use crate::ingestion::pipeline::run_batch;
    use crate::ingestion::tables::LookupTables;
    use crate::ingestion::transform::Transformer;
    use crate::ingestion::types::RawListing;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn seeded_store() -> Arc<InMemoryListingStore> {
        let store = Arc::new(InMemoryListingStore::new());
        let transformer = Transformer::new(Arc::new(LookupTables::builtin().unwrap()));

        let raw: Vec<RawListing> = (1..=3)
            .map(|i| RawListing {
                price_raw: format!("KES {}M", i),
                location_raw: "Karen".to_string(),
                ..RawListing::new("property24", format!("https://property24.co.ke/{}", i))
            })
            .collect();
        run_batch(store.as_ref(), &transformer, raw).await.unwrap();

        store
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Arc::new(InMemoryListingStore::new()));
        let (status, json) = get_json(app, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_stats() {
        let app = router(seeded_store().await);
        let (status, json) = get_json(app, "/api/stats").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["total_raw_listings"], 3);
        assert_eq!(json["total_cleaned_listings"], 3);
        assert_eq!(json["active_sources"][0], "property24");
    }

    #[tokio::test]
    async fn test_listings_limit() {
        let app = router(seeded_store().await);
        let (status, json) = get_json(app, "/api/listings?limit=2").await;

        assert_eq!(status, StatusCode::OK);
        let listings = json.as_array().unwrap();
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0]["county"], "Nairobi");
        assert_eq!(listings[0]["neighborhood"], "Karen");
    }
}
