use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Authority;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub id: Uuid,
    pub enquiry_id: Uuid,
    pub reason: String,
    pub escalated_to: Authority,
    pub escalated_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Escalation {
    pub fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }
}
