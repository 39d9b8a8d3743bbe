//! Enquiry endpoints: intake, lifecycle transitions and escalations.

use std::collections::HashMap;

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::enums::DocumentType;
use crate::models::{Enquiry, EnquiryDetail, EnquiryFilter, Escalation};
use crate::tracker::EnquiryEvent;
use crate::workflow::enquiries::{self, NewDocument};
use crate::workflow::intake::{IntakeDraft, IntakeStep};
use crate::workflow::{escalations, Actor, WorkflowError};

/// Multipart file parts are named `document_<type>`.
const DOCUMENT_FIELD_PREFIX: &str = "document_";

fn publish(ctx: &ApiContext, enquiry: &Enquiry) {
    let delivered = ctx.core.events.publish(EnquiryEvent::from(enquiry));
    tracing::debug!(enquiry_id = %enquiry.id, delivered, "Enquiry event published");
}

/// `GET /api/enquiries`
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    query: Result<Query<EnquiryFilter>, QueryRejection>,
) -> Result<Json<Vec<Enquiry>>, ApiError> {
    let Query(filter) = query?;
    let conn = ctx.core.open_db()?;
    Ok(Json(enquiries::list(&conn, &filter, &actor)?))
}

/// `POST /api/enquiries`: multipart: step fields as text parts plus
/// `document_<type>` file parts.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<EnquiryDetail>), ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut fields: HashMap<String, String> = HashMap::new();
    let mut documents: Vec<NewDocument> = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if let Some(tag) = name.strip_prefix(DOCUMENT_FIELD_PREFIX) {
            let doc_type: DocumentType = tag
                .parse()
                .map_err(|_| ApiError::Validation(format!("Unknown document type '{tag}'")))?;
            let original_name = field.file_name().unwrap_or(tag).to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await?;
            documents.push(NewDocument {
                doc_type,
                original_name,
                content_type,
                bytes: bytes.to_vec(),
            });
        } else if !name.is_empty() {
            let value = field.text().await?;
            fields.insert(name, value);
        }
    }

    let command = IntakeDraft::from_form(&fields).into_command()?;
    let mut conn = ctx.core.open_db()?;
    let detail = enquiries::create(
        &mut conn,
        &ctx.core.upload_dir(),
        command,
        documents,
        &actor,
        Utc::now(),
    )?;
    publish(&ctx, &detail.enquiry);
    Ok((StatusCode::CREATED, Json(detail)))
}

#[derive(Serialize)]
pub struct StepValidation {
    pub valid: bool,
}

/// `POST /api/enquiries/validate-step`: check one form step without saving.
pub async fn validate_step(
    payload: Result<Json<IntakeStep>, JsonRejection>,
) -> Result<Json<StepValidation>, ApiError> {
    let Json(step) = payload?;
    step.validate()?;
    Ok(Json(StepValidation { valid: true }))
}

/// `GET /api/enquiries/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<EnquiryDetail>, ApiError> {
    let id = parse_id(&id, "enquiry")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(enquiries::get_detail(&conn, &id, &actor)?))
}

/// `DELETE /api/enquiries/:id`: ADMIN only.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "enquiry")?;
    let mut conn = ctx.core.open_db()?;
    enquiries::delete(&mut conn, &ctx.core.upload_dir(), &id, &actor)?;
    Ok(StatusCode::NO_CONTENT)
}

type Transition = fn(&mut rusqlite::Connection, &Uuid, &Actor, chrono::DateTime<Utc>) -> Result<Enquiry, WorkflowError>;

fn run_transition(ctx: &ApiContext, raw_id: &str, actor: &Actor, op: Transition) -> Result<Json<Enquiry>, ApiError> {
    let id = parse_id(raw_id, "enquiry")?;
    let mut conn = ctx.core.open_db()?;
    let enquiry = op(&mut conn, &id, actor, Utc::now())?;
    publish(ctx, &enquiry);
    Ok(Json(enquiry))
}

/// `PATCH /api/enquiries/:id/forward`
pub async fn forward(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Enquiry>, ApiError> {
    run_transition(&ctx, &id, &actor, enquiries::forward)
}

/// `PATCH /api/enquiries/:id/approve`
pub async fn approve(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Enquiry>, ApiError> {
    run_transition(&ctx, &id, &actor, enquiries::approve)
}

/// `PATCH /api/enquiries/:id/reject`
pub async fn reject(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Enquiry>, ApiError> {
    run_transition(&ctx, &id, &actor, enquiries::reject)
}

/// `PATCH /api/enquiries/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Enquiry>, ApiError> {
    run_transition(&ctx, &id, &actor, enquiries::complete)
}

#[derive(Deserialize)]
pub struct DispatchRequest {
    pub ambulance_id: Uuid,
}

/// `PATCH /api/enquiries/:id/dispatch`: body `{ambulance_id}`.
pub async fn dispatch(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<DispatchRequest>, JsonRejection>,
) -> Result<Json<Enquiry>, ApiError> {
    let id = parse_id(&id, "enquiry")?;
    let Json(request) = payload?;
    let mut conn = ctx.core.open_db()?;
    let enquiry = enquiries::dispatch(&mut conn, &id, &request.ambulance_id, &actor, Utc::now())?;
    publish(&ctx, &enquiry);
    Ok(Json(enquiry))
}

#[derive(Deserialize)]
pub struct EscalateRequest {
    pub reason: String,
    pub escalated_to: String,
}

#[derive(Serialize)]
pub struct EscalateResponse {
    pub escalation: Escalation,
    pub enquiry: Enquiry,
}

/// `POST /api/enquiries/:id/escalate`
pub async fn escalate(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    payload: Result<Json<EscalateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EscalateResponse>), ApiError> {
    let id = parse_id(&id, "enquiry")?;
    let Json(request) = payload?;
    let mut conn = ctx.core.open_db()?;
    let (escalation, enquiry) = escalations::escalate(
        &mut conn,
        &id,
        &request.reason,
        &request.escalated_to,
        &actor,
        Utc::now(),
    )?;
    publish(&ctx, &enquiry);
    Ok((StatusCode::CREATED, Json(EscalateResponse { escalation, enquiry })))
}

/// `GET /api/enquiries/:id/escalations`
pub async fn escalation_history(
    State(ctx): State<ApiContext>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Escalation>>, ApiError> {
    let id = parse_id(&id, "enquiry")?;
    let conn = ctx.core.open_db()?;
    Ok(Json(escalations::list_for_enquiry(&conn, &id, &actor)?))
}
