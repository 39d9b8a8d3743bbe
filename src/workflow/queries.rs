//! Case queries: questions raised against an enquiry and their single response.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use uuid::Uuid;

use super::access::{scope_for, visible_enquiry};
use super::{Actor, WorkflowError};
use crate::db::repository;
use crate::models::enums::{DateBucket, QuerySortKey, Role, SortOrder};
use crate::models::{CaseQuery, CaseQueryFilter, CaseQueryView};

const RAISING_ROLES: &[Role] = &[Role::Cmo, Role::Sdm, Role::Dm, Role::Admin];
const MAX_TEXT_LEN: usize = 4000;
pub const MAX_PER_PAGE: u32 = 100;

fn checked_text(text: &str, label: &str) -> Result<String, WorkflowError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(WorkflowError::validation(format!("{label} is required")));
    }
    if text.len() > MAX_TEXT_LEN {
        return Err(WorkflowError::validation(format!(
            "{label} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(text.to_string())
}

pub fn raise(
    conn: &mut Connection,
    enquiry_id: &Uuid,
    text: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<CaseQuery, WorkflowError> {
    let text = checked_text(text, "Query text")?;
    actor.require_role(RAISING_ROLES, "raise queries")?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    visible_enquiry(&tx, enquiry_id, actor)?;
    let query = CaseQuery {
        id: Uuid::new_v4(),
        query_code: repository::next_query_code(&tx, now.date_naive())?,
        enquiry_id: *enquiry_id,
        query_text: text,
        response_text: None,
        raised_by_user_id: actor.user_id,
        raised_by_role: actor.role,
        responded_by_user_id: None,
        created_at: now,
        responded_at: None,
    };
    repository::insert_case_query(&tx, &query)?;
    tx.commit()?;

    tracing::info!(query_id = %query.id, enquiry_id = %enquiry_id, code = %query.query_code, "Case query raised");
    Ok(query)
}

/// Answer a query. Each query accepts exactly one response.
pub fn respond(
    conn: &Connection,
    query_id: &Uuid,
    text: &str,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<CaseQuery, WorkflowError> {
    let text = checked_text(text, "Response text")?;

    let query = repository::get_case_query(conn, query_id)?
        .ok_or_else(|| WorkflowError::not_found("Case query", query_id))?;
    visible_enquiry(conn, &query.enquiry_id, actor)
        .map_err(|_| WorkflowError::not_found("Case query", query_id))?;
    if query.raised_by_user_id == actor.user_id {
        return Err(WorkflowError::forbidden("You cannot respond to your own query"));
    }
    if !query.is_pending() {
        return Err(WorkflowError::AlreadyResponded(*query_id));
    }

    if !repository::respond_case_query(conn, query_id, &text, &actor.user_id, &now)? {
        return Err(WorkflowError::AlreadyResponded(*query_id));
    }

    tracing::info!(query_id = %query_id, user_id = %actor.user_id, "Case query answered");
    Ok(CaseQuery {
        response_text: Some(text),
        responded_by_user_id: Some(actor.user_id),
        responded_at: Some(now),
        ..query
    })
}

/// One page of the all-queries view.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPage {
    pub items: Vec<CaseQueryView>,
    pub total: usize,
    pub page: u32,
    pub per_page: u32,
}

pub fn list(
    conn: &Connection,
    filter: &CaseQueryFilter,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<QueryPage, WorkflowError> {
    if let Some(enquiry_id) = filter.enquiry_id {
        visible_enquiry(conn, &enquiry_id, actor)?;
    }
    let views = repository::list_case_query_views(
        conn,
        &scope_for(actor),
        filter.enquiry_id.as_ref(),
        filter.status,
        filter.role,
    )?;
    Ok(apply_listing(views, filter, now))
}

fn in_bucket(created_at: &DateTime<Utc>, bucket: DateBucket, now: &DateTime<Utc>) -> bool {
    match bucket {
        DateBucket::Today => created_at.date_naive() == now.date_naive(),
        DateBucket::Week => *created_at >= *now - Duration::days(7),
        DateBucket::Month => *created_at >= *now - Duration::days(30),
    }
}

fn matches_search(view: &CaseQueryView, needle: &str) -> bool {
    [
        view.query.query_code.as_str(),
        view.query.query_text.as_str(),
        view.enquiry_code.as_str(),
        view.patient_name.as_str(),
        view.raised_by_name.as_str(),
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

fn compare(a: &CaseQueryView, b: &CaseQueryView, key: QuerySortKey) -> Ordering {
    match key {
        QuerySortKey::CreatedAt => a.query.created_at.cmp(&b.query.created_at),
        // Unanswered queries sort as if answered at the epoch
        QuerySortKey::RespondedAt => a
            .query
            .responded_at
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
            .cmp(&b.query.responded_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)),
        QuerySortKey::PatientName => a.patient_name.to_lowercase().cmp(&b.patient_name.to_lowercase()),
        QuerySortKey::RaisedBy => a.raised_by_name.to_lowercase().cmp(&b.raised_by_name.to_lowercase()),
    }
}

/// Search, date bucket, sort and page over already-scoped views.
pub fn apply_listing(
    views: Vec<CaseQueryView>,
    filter: &CaseQueryFilter,
    now: DateTime<Utc>,
) -> QueryPage {
    let needle = filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut items: Vec<CaseQueryView> = views
        .into_iter()
        .filter(|v| filter.date.map_or(true, |bucket| in_bucket(&v.query.created_at, bucket, &now)))
        .filter(|v| needle.as_deref().map_or(true, |n| matches_search(v, n)))
        .collect();

    items.sort_by(|a, b| {
        let ord = compare(a, b, filter.sort_by).then_with(|| a.query.query_code.cmp(&b.query.query_code));
        match filter.sort_order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    let total = items.len();
    let page = filter.page.max(1);
    let per_page = filter.per_page.clamp(1, MAX_PER_PAGE);
    let skip = (page as usize - 1).saturating_mul(per_page as usize);
    let items = items.into_iter().skip(skip).take(per_page as usize).collect();

    QueryPage { items, total, page, per_page }
}
