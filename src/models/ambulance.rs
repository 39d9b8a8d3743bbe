use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AmbulanceKind, AmbulanceStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ambulance {
    pub id: Uuid,
    pub registration_number: String,
    pub call_sign: String,
    pub kind: AmbulanceKind,
    pub base_district_id: Option<Uuid>,
    pub status: AmbulanceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FleetStats {
    pub total: u32,
    pub available: u32,
    pub dispatched: u32,
    pub maintenance: u32,
    pub out_of_service: u32,
}
