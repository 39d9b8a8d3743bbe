//! Profile endpoints.
//!
//! Role, district or password changes end every session of that user, so
//! the next request runs under the new rights.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use super::{blocking, parse_id};
use crate::accounts::{self, ProfileUpdate};
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::User;
use crate::workflow::Actor;

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// `GET /api/users/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "user")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(accounts::get_profile(&conn, &id, &actor)?))
}

/// `PUT /api/users/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id, "user")?;
    let Json(update) = payload?;
    let conn = ctx.core.open_db()?;
    let before = accounts::get_profile(&conn, &id, &actor)?;
    let user = accounts::update_profile(&conn, &id, update, &actor)?;

    if user.role != before.role || user.district_id != before.district_id {
        let revoked = ctx.core.write_sessions()?.revoke_user(&id);
        tracing::info!(user_id = %id, revoked, "Sessions revoked after scope change");
    }
    Ok(Json(user))
}

/// `POST /api/users/:id/change-password`
pub async fn change_password(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "user")?;
    let Json(request) = payload?;
    let core = ctx.core.clone();
    blocking(move || {
        let conn = core.open_db()?;
        Ok(accounts::change_password(
            &conn,
            &id,
            &request.current_password,
            &request.new_password,
            &actor,
        )?)
    })
    .await?;
    ctx.core.write_sessions()?.revoke_user(&id);
    Ok(StatusCode::NO_CONTENT)
}
