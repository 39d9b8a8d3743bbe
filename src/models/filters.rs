use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::enums::{
    AmbulanceStatus, DateBucket, EnquiryStatus, QuerySortKey, QueryStatus, Role, SortOrder,
};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EnquiryFilter {
    pub status: Option<EnquiryStatus>,
    pub district_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub submitted_by: Option<Uuid>,
}

/// Listing contract of the all-queries view.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CaseQueryFilter {
    pub enquiry_id: Option<Uuid>,
    pub status: Option<QueryStatus>,
    pub role: Option<Role>,
    pub date: Option<DateBucket>,
    pub search: Option<String>,
    pub sort_by: QuerySortKey,
    pub sort_order: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl Default for CaseQueryFilter {
    fn default() -> Self {
        Self {
            enquiry_id: None,
            status: None,
            role: None,
            date: None,
            search: None,
            sort_by: QuerySortKey::CreatedAt,
            sort_order: SortOrder::Desc,
            page: 1,
            per_page: 20,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AmbulanceFilter {
    pub status: Option<AmbulanceStatus>,
    pub base_district_id: Option<Uuid>,
}

/// Row-level visibility for enquiries and everything attached to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    All,
    SubmittedBy(Uuid),
    District(Uuid),
    Nothing,
}
