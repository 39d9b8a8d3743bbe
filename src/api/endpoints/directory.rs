//! District and hospital endpoints.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::directory::{self, NewDistrict, NewHospital};
use crate::models::{District, Hospital};
use crate::workflow::Actor;

#[derive(Deserialize)]
pub struct HospitalQuery {
    pub district_id: Option<Uuid>,
}

/// `GET /api/districts`
pub async fn list_districts(State(ctx): State<ApiContext>) -> Result<Json<Vec<District>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(directory::list_districts(&conn)?))
}

/// `POST /api/districts`: ADMIN only.
pub async fn create_district(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<NewDistrict>, JsonRejection>,
) -> Result<(StatusCode, Json<District>), ApiError> {
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(directory::create_district(&conn, input, &actor)?)))
}

/// `GET /api/hospitals?district_id=`
pub async fn list_hospitals(
    State(ctx): State<ApiContext>,
    query: Result<Query<HospitalQuery>, QueryRejection>,
) -> Result<Json<Vec<Hospital>>, ApiError> {
    let Query(query) = query?;
    let conn = ctx.core.open_db()?;
    Ok(Json(directory::list_hospitals(&conn, query.district_id.as_ref())?))
}

/// `POST /api/hospitals`: ADMIN only.
pub async fn create_hospital(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<NewHospital>, JsonRejection>,
) -> Result<(StatusCode, Json<Hospital>), ApiError> {
    let Json(input) = payload?;
    let conn = ctx.core.open_db()?;
    Ok((StatusCode::CREATED, Json(directory::create_hospital(&conn, input, &actor)?)))
}
