//! Fleet endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::fleet::{self, AmbulanceInput};
use crate::models::enums::AmbulanceStatus;
use crate::models::{Ambulance, AmbulanceFilter, FleetStats};
use crate::workflow::Actor;

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: AmbulanceStatus,
}

/// `GET /api/ambulances?status=&base_district_id=`
pub async fn list(
    State(ctx): State<ApiContext>,
    query: Result<Query<AmbulanceFilter>, QueryRejection>,
) -> Result<Json<Vec<Ambulance>>, ApiError> {
    let Query(filter) = query?;
    let conn = ctx.core.open_db()?;
    Ok(Json(fleet::list(&conn, &filter)?))
}

/// `POST /api/ambulances`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<AmbulanceInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Ambulance>), ApiError> {
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(fleet::create(&conn, input, &actor, Utc::now())?)))
}

/// `GET /api/ambulances/stats`
pub async fn stats(State(ctx): State<ApiContext>) -> Result<Json<FleetStats>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(fleet::stats(&conn)?))
}

/// `GET /api/ambulances/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Ambulance>, ApiError> {
    let id = parse_id(&id, "ambulance")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(fleet::get(&conn, &id)?))
}

/// `PUT /api/ambulances/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<AmbulanceInput>, JsonRejection>,
) -> Result<Json<Ambulance>, ApiError> {
    let id = parse_id(&id, "ambulance")?;
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok(Json(fleet::update(&conn, &id, input, &actor, Utc::now())?))
}

/// `PATCH /api/ambulances/:id/status`
pub async fn set_status(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<Ambulance>, ApiError> {
    let id = parse_id(&id, "ambulance")?;
    let Json(request) = payload?;
    let mut conn = ctx.core.open_db()?;
    Ok(Json(fleet::set_status(&mut conn, &id, request.status, &actor, Utc::now())?))
}

/// `DELETE /api/ambulances/:id`
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "ambulance")?;
    let mut conn = ctx.core.open_db()?;
    fleet::delete(&mut conn, &id, &actor)?;
    Ok(StatusCode::NO_CONTENT)
}
