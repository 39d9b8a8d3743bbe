//! Case query endpoints: the all-queries view, raising and responding.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{CaseQuery, CaseQueryFilter};
use crate::workflow::queries::{self, QueryPage};
use crate::workflow::Actor;

#[derive(Deserialize)]
pub struct RaiseRequest {
    pub enquiry_id: Uuid,
    pub query_text: String,
}

#[derive(Deserialize)]
pub struct RespondRequest {
    pub response_text: String,
}

/// `GET /api/case-queries`: filter, search, sort and paginate.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<CaseQueryFilter>, QueryRejection>,
) -> Result<Json<QueryPage>, ApiError> {
    let Query(filter) = query?;
    let conn = ctx.core.open_db()?;
    Ok(Json(queries::list(&conn, &filter, &actor, Utc::now())?))
}

/// `POST /api/case-queries`
pub async fn raise(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    payload: Result<Json<RaiseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CaseQuery>), ApiError> {
    let Json(request) = payload?;
    let mut conn = ctx.core.open_db()?;
    let query = queries::raise(&mut conn, &request.enquiry_id, &request.query_text, &actor, Utc::now())?;
    Ok((StatusCode::CREATED, Json(query)))
}

/// `POST /api/case-queries/:id/respond`: one response per query.
pub async fn respond(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<RespondRequest>, JsonRejection>,
) -> Result<Json<CaseQuery>, ApiError> {
    let id = parse_id(&id, "query")?;
    let Json(request) = payload?;
    let conn = ctx.core.open_db()?;
    Ok(Json(queries::respond(&conn, &id, &request.response_text, &actor, Utc::now())?))
}
