//! Account endpoints.
//!
//! `POST /api/auth/signup` and `POST /api/auth/login` are public;
//! `POST /api/auth/logout` needs the bearer token it revokes.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::blocking;
use crate::accounts::{self, SignupRequest};
use crate::api::error::ApiError;
use crate::api::middleware::auth::bearer_token;
use crate::api::types::ApiContext;
use crate::models::enums::Role;
use crate::models::User;
use crate::workflow::Actor;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
    pub user_id: Uuid,
    pub district_id: Option<Uuid>,
}

/// `POST /api/auth/signup`
pub async fn signup(
    State(ctx): State<ApiContext>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let Json(request) = payload?;
    let core = ctx.core.clone();
    let user = blocking(move || {
        let conn = core.open_db()?;
        Ok(accounts::signup(&conn, request, Utc::now())?)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `POST /api/auth/login`: exchange credentials for a bearer token.
pub async fn login(
    State(ctx): State<ApiContext>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;
    let lockout_key = request.email.trim().to_lowercase();

    {
        let lockout = ctx
            .login_lockout
            .lock()
            .map_err(|_| ApiError::Internal("lockout lock".into()))?;
        if let Some(retry_after) = lockout.locked_for(&lockout_key) {
            return Err(ApiError::RateLimited { retry_after });
        }
    }

    let core = ctx.core.clone();
    let authenticated = blocking(move || {
        let conn = core.open_db()?;
        Ok(accounts::authenticate(&conn, &request.email, &request.password)?)
    })
    .await?;
    let Some(user) = authenticated else {
        if let Ok(mut lockout) = ctx.login_lockout.lock() {
            lockout.record_failure(&lockout_key);
        }
        tracing::info!("Login rejected");
        return Err(ApiError::Unauthorized);
    };

    if let Ok(mut lockout) = ctx.login_lockout.lock() {
        lockout.clear(&lockout_key);
    }

    let token = ctx.core.write_sessions()?.issue(Actor::from_user(&user));
    tracing::info!(user_id = %user.id, role = %user.role, "Login succeeded");

    Ok(Json(LoginResponse {
        token,
        role: user.role,
        user_id: user.id,
        district_id: user.district_id,
    }))
}

/// `POST /api/auth/logout`: revoke the presented token.
pub async fn logout(State(ctx): State<ApiContext>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    let token = bearer_token(&headers).ok_or(ApiError::Unauthorized)?;
    ctx.core.write_sessions()?.revoke(token);
    Ok(StatusCode::NO_CONTENT)
}
