//! OTP endpoint handlers

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;

use super::dto::{
    LogoutBody, OtpRequestBody, OtpVerifyBody, RefreshBody, RefreshResponse, VerifyResponse,
};
use crate::application::otp::{OtpService, RequestContext, SessionService};
use crate::interfaces::http::common::{ApiError, ApiResponse, ValidatedJson};

#[derive(Clone)]
pub struct OtpHandlerState {
    pub otp: Arc<OtpService>,
    pub sessions: Arc<SessionService>,
}

/// Client context from headers; the edge proxy forwards the caller IP.
fn request_context(headers: &HeaderMap) -> RequestContext {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        });

    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    RequestContext { ip, user_agent }
}

/// `POST /api/v1/otp/request`
///
/// Accepts with 202 for registered and unregistered numbers alike; the
/// envelope shape is identical in both cases.
pub async fn request_otp(
    State(state): State<OtpHandlerState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<OtpRequestBody>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let ctx = request_context(&headers);
    let accepted = state
        .otp
        .request_otp(&body.phone, body.country_code.as_deref(), &ctx)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(accepted.message, serde_json::json!({}))),
    ))
}

/// `POST /api/v1/otp/resend`
pub async fn resend_otp(
    State(state): State<OtpHandlerState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<OtpRequestBody>,
) -> Result<(StatusCode, Json<ApiResponse<serde_json::Value>>), ApiError> {
    let ctx = request_context(&headers);
    let accepted = state
        .otp
        .resend_otp(&body.phone, body.country_code.as_deref(), &ctx)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(accepted.message, serde_json::json!({}))),
    ))
}

/// `POST /api/v1/otp/verify`
pub async fn verify_otp(
    State(state): State<OtpHandlerState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<OtpVerifyBody>,
) -> Result<Json<ApiResponse<VerifyResponse>>, ApiError> {
    let ctx = request_context(&headers);
    let login = state.otp.verify_otp(&body.phone, &body.otp, &ctx).await?;

    Ok(Json(ApiResponse::success(
        "Phone verified successfully",
        VerifyResponse {
            user: login.user,
            tokens: login.tokens,
        },
    )))
}

/// `POST /api/v1/otp/refresh`
pub async fn refresh_token(
    State(state): State<OtpHandlerState>,
    ValidatedJson(body): ValidatedJson<RefreshBody>,
) -> Result<Json<ApiResponse<RefreshResponse>>, ApiError> {
    let refreshed = state
        .sessions
        .refresh_access_token(&body.refresh_token)
        .await?;

    Ok(Json(ApiResponse::success(
        "Token refreshed",
        RefreshResponse {
            access_token: refreshed.access_token,
            expires_in: refreshed.expires_in,
        },
    )))
}

/// `POST /api/v1/otp/logout`
///
/// Always answers 200; unknown or malformed tokens leak nothing.
pub async fn logout(
    State(state): State<OtpHandlerState>,
    Json(body): Json<LogoutBody>,
) -> Json<ApiResponse<serde_json::Value>> {
    if let Err(err) = state.sessions.logout(&body.refresh_token).await {
        tracing::warn!(error = %err, "Logout cleanup failed");
    }
    Json(ApiResponse::success("Logged out", serde_json::json!({})))
}
