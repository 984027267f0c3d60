use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
    Extension, Json,
};

use super::{dispatch, AppState, JsonBody};
use crate::{
    auth::Claims,
    models::users::{LoginRequest, LoginResponse, User},
    services::{users::UserRequest, ServiceError},
};

/// Extracts the token from an `Authorization: Bearer <token>` header.
fn bearer_token(headers: &HeaderMap) -> Result<&str, ServiceError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("Access token is required".into()))?;

    value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Invalid authorization scheme".into()))
}

/// Verifies the bearer token and makes its [`Claims`] available to handlers.
pub(super) async fn require_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = bearer_token(req.headers())?;
    let claims = state.keys.verify(token).map_err(|e| {
        log::debug!("Rejected token: {e}");
        ServiceError::Unauthorized("Invalid or expired token".into())
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub(super) async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let login = dispatch(&state.channels.users, "UserService", |response| {
        UserRequest::Login {
            username: req.username,
            password: req.password,
            response,
        }
    })
    .await?;

    Ok(Json(login))
}

pub(super) async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ServiceError> {
    let user = dispatch(&state.channels.users, "UserService", |response| {
        UserRequest::GetUser {
            id: claims.id,
            response,
        }
    })
    .await?;

    Ok(Json(user))
}
