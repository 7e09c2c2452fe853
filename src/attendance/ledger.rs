use tracing::info;
use uuid::Uuid;

use crate::database::{AbstractAttendance, Database};
use crate::utils::error::Result;

use super::{JoinOutcome, LeaveOutcome};

/// Mutates attendee sets. The only writer of `events.current_attendees`.
#[derive(Clone)]
pub struct AttendanceLedger {
    db: Database,
}

impl AttendanceLedger {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn join(&self, event_id: Uuid, user_id: Uuid) -> Result<JoinOutcome> {
        let outcome = self.db.join_event(event_id, user_id).await?;
        info!(%event_id, %user_id, ?outcome, "join processed");
        Ok(outcome)
    }

    pub async fn leave(&self, event_id: Uuid, user_id: Uuid) -> Result<LeaveOutcome> {
        let outcome = self.db.leave_event(event_id, user_id).await?;
        info!(%event_id, %user_id, ?outcome, "leave processed");
        Ok(outcome)
    }

    /// Served from the denormalized counter. `None` when the event does not exist.
    pub async fn attendee_count(&self, event_id: Uuid) -> Result<Option<i32>> {
        self.db.fetch_attendee_count(event_id).await
    }

    pub async fn is_attending(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.db.is_attending(event_id, user_id).await
    }
}
