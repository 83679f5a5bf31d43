//! Health endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::domain::ErrorCode;
use crate::infrastructure::kv::KvStore;
use crate::interfaces::http::common::ApiResponse;

#[derive(Clone)]
pub struct HealthHandlerState {
    pub db: DatabaseConnection,
    pub kv: Arc<dyn KvStore>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub database: &'static str,
    pub kv_store: &'static str,
}

/// `GET /health`
pub async fn health(
    State(state): State<HealthHandlerState>,
) -> Result<Json<ApiResponse<HealthReport>>, (StatusCode, Json<ApiResponse<()>>)> {
    let database = match state.db.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    let kv_store = match state.kv.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    if database == "up" && kv_store == "up" {
        Ok(Json(ApiResponse::success(
            "healthy",
            HealthReport {
                status: "ok",
                database,
                kv_store,
            },
        )))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(
                ApiResponse::error("Service unhealthy", ErrorCode::ServiceUnhealthy)
                    .with_details(serde_json::json!({
                        "database": database,
                        "kv_store": kv_store,
                    })),
            ),
        ))
    }
}
