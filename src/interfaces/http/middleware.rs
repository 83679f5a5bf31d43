//! Bearer authentication middleware

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::application::otp::SessionService;
use crate::domain::{DomainError, ErrorCode};
use crate::interfaces::http::common::ApiError;

/// State handed to the auth middleware.
#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<SessionService>,
}

/// The authenticated principal, inserted as a request extension.
#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub phone: String,
}

fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Access-token authentication, including the per-user revocation marker.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(String::from);

    let Some(header_value) = header_value else {
        return ApiError(DomainError::unauthorized(
            ErrorCode::Unauthorized,
            "Missing bearer token",
        ))
        .into_response();
    };

    let Some(token) = extract_bearer(&header_value) else {
        return ApiError(DomainError::unauthorized(
            ErrorCode::Unauthorized,
            "Malformed authorization header",
        ))
        .into_response();
    };

    match state.sessions.authenticate_access(token).await {
        Ok(claims) => {
            request.extensions_mut().insert(AuthenticatedUser {
                user_id: claims.sub,
                phone: claims.phone,
            });
            next.run(request).await
        }
        Err(err) => ApiError(err).into_response(),
    }
}
