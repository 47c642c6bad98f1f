//! HTTP surface of the query engine.
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/trending` | Ranked generation for the given filters |
//! | `GET`  | `/health` | Health check |
//!
//! Failures never leak as raw errors: the handler answers
//! `{"success": false, "error": "..."}` with status 500.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::error::Result;

use super::query::{QueryEngine, TrendingParams};

const CACHE_CONTROL: &str = "public, max-age=1800";

#[derive(Clone)]
struct AppState {
    engine: Arc<QueryEngine>,
}

pub fn router(engine: Arc<QueryEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/trending", get(handle_trending))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { engine })
}

pub async fn run_server(bind: &str, engine: Arc<QueryEngine>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Query endpoint listening on http://{}", bind);
    axum::serve(listener, router(engine)).await?;
    Ok(())
}

async fn handle_trending(
    State(state): State<AppState>,
    Query(params): Query<TrendingParams>,
) -> Response {
    match state.engine.query(&params).await {
        Ok(response) if response.metadata.is_some() => {
            ([(header::CACHE_CONTROL, CACHE_CONTROL)], Json(response)).into_response()
        }
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::error!("Trending query failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{record, temp_repository};
    use crate::models::{Period, ProviderId};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Option<String>, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let cache = resp
            .headers()
            .get(header::CACHE_CONTROL)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, cache, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn trending_returns_envelope_with_metadata() {
        let (_dir, repository) = temp_repository().await;
        let repos = vec![record(1, "tokio-rs", "axum"), record(2, "serde-rs", "serde")];
        repository.upsert_repos(&repos).await.unwrap();
        repository
            .append_generation(Period::Daily, "all", "2026-02-17 15:00:00", &repos)
            .await
            .unwrap();
        repository
            .upsert_summary("tokio-rs/axum", ProviderId::DeepSeek, r#"{"en":"Web framework","zh":"Web 框架"}"#.into())
            .await
            .unwrap();
        let app = router(Arc::new(QueryEngine::new(Arc::new(repository))));

        let (status, cache, body) = get_json(app, "/api/trending?summary_lang=zh&limit=abc").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some(CACHE_CONTROL));
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 2);
        assert_eq!(body["metadata"]["batch"], "pm");
        assert_eq!(body["metadata"]["providers"], json!(["all"]));
        assert_eq!(body["data"][0]["repoName"], "axum");
        assert_eq!(
            body["data"][0]["aiSummaries"],
            json!([{ "provider": "deepseek", "content": "Web 框架" }])
        );
        assert_eq!(body["data"][1]["aiSummaries"], Value::Null);
    }

    #[tokio::test]
    async fn no_snapshot_gives_zero_count_success() {
        let (_dir, repository) = temp_repository().await;
        let app = router(Arc::new(QueryEngine::new(Arc::new(repository))));

        let (status, _, body) = get_json(app, "/api/trending?lang=rust").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 0);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn store_failure_becomes_failure_envelope() {
        let (dir, repository) = temp_repository().await;
        let raw = rusqlite::Connection::open(dir.path().join("trending.db")).unwrap();
        raw.execute_batch("DROP TABLE snapshots").unwrap();
        let app = router(Arc::new(QueryEngine::new(Arc::new(repository))));

        let (status, _, body) = get_json(app, "/api/trending").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("snapshots"));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let (_dir, repository) = temp_repository().await;
        let app = router(Arc::new(QueryEngine::new(Arc::new(repository))));

        let (status, _, body) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
