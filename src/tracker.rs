//! Live feed of enquiry status changes.
//!
//! Handlers publish after a transition commits; each subscriber filters the
//! feed through its own access scope.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::enums::EnquiryStatus;
use crate::models::{AccessScope, Enquiry};

/// Events buffered per subscriber before slow readers start lagging.
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnquiryEvent {
    pub enquiry_id: Uuid,
    pub enquiry_code: String,
    pub status: EnquiryStatus,
    pub district_id: Uuid,
    pub submitted_by: Uuid,
    pub at: DateTime<Utc>,
}

impl From<&Enquiry> for EnquiryEvent {
    fn from(enquiry: &Enquiry) -> Self {
        Self {
            enquiry_id: enquiry.id,
            enquiry_code: enquiry.enquiry_code.clone(),
            status: enquiry.status,
            district_id: enquiry.logistics.district_id,
            submitted_by: enquiry.submitted_by_user_id,
            at: enquiry.updated_at,
        }
    }
}

impl EnquiryEvent {
    pub fn visible_to(&self, scope: &AccessScope) -> bool {
        scope.admits_parts(&self.submitted_by, &self.district_id)
    }
}

pub struct EventBus {
    sender: broadcast::Sender<EnquiryEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Returns the number of live subscribers that received the event.
    pub fn publish(&self, event: EnquiryEvent) -> usize {
        tracing::debug!(enquiry_id = %event.enquiry_id, status = %event.status, "Publishing enquiry event");
        // No subscribers is not an error
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EnquiryEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{sample_enquiry, seed_directory};
    use crate::db::sqlite::open_memory_database;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let conn = open_memory_database().unwrap();
        let dir = seed_directory(&conn);
        let enquiry = sample_enquiry(&dir, Uuid::new_v4());

        let bus = EventBus::new();
        assert_eq!(bus.publish(EnquiryEvent::from(&enquiry)), 0);

        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(EnquiryEvent::from(&enquiry)), 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.enquiry_id, enquiry.id);
        assert_eq!(event.status, EnquiryStatus::Pending);
        assert_eq!(event.district_id, dir.district.id);
    }

    #[test]
    fn events_respect_scope() {
        let conn = open_memory_database().unwrap();
        let dir = seed_directory(&conn);
        let submitter = Uuid::new_v4();
        let event = EnquiryEvent::from(&sample_enquiry(&dir, submitter));

        assert!(event.visible_to(&AccessScope::All));
        assert!(event.visible_to(&AccessScope::SubmittedBy(submitter)));
        assert!(!event.visible_to(&AccessScope::SubmittedBy(Uuid::new_v4())));
        assert!(event.visible_to(&AccessScope::District(dir.district.id)));
        assert!(!event.visible_to(&AccessScope::District(Uuid::new_v4())));
        assert!(!event.visible_to(&AccessScope::Nothing));
    }
}
