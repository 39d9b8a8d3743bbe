use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseQuery {
    pub id: Uuid,
    pub query_code: String,
    pub enquiry_id: Uuid,
    pub query_text: String,
    pub response_text: Option<String>,
    pub raised_by_user_id: Uuid,
    pub raised_by_role: Role,
    pub responded_by_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl CaseQuery {
    pub fn is_pending(&self) -> bool {
        self.response_text.is_none()
    }
}

/// A query joined with the enquiry and raiser fields the listing searches over.
#[derive(Debug, Clone, Serialize)]
pub struct CaseQueryView {
    #[serde(flatten)]
    pub query: CaseQuery,
    pub enquiry_code: String,
    pub patient_name: String,
    pub raised_by_name: String,
}
