//! Event attendance: who attends which event, bounded by capacity.
//!
//! The decision of whether a join may proceed lives in [`admit`], a pure
//! function over the event row and the membership test. Each datastore driver
//! calls it from inside the transaction (or lock) that also performs the
//! insert and the counter increment, so the check and the write can never be
//! observed apart.

mod ledger;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::models::{EventCapacity, EventStatus};

pub use ledger::AttendanceLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinOutcome {
    Attending,
    AlreadyAttending,
    EventFull,
    EventNotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaveOutcome {
    Left,
    WasNotAttending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Insert the membership row and bump the counter by one.
    Admit,
    /// Leave everything untouched and report this outcome.
    Reject(JoinOutcome),
}

/// Decides a join. Checks run in order: event exists and is active, caller is
/// not already a member, capacity not reached.
pub fn admit(event: Option<&EventCapacity>, already_attending: bool) -> Admission {
    let Some(event) = event else {
        return Admission::Reject(JoinOutcome::EventNotFound);
    };
    if event.status != EventStatus::Active {
        return Admission::Reject(JoinOutcome::EventNotFound);
    }
    if already_attending {
        return Admission::Reject(JoinOutcome::AlreadyAttending);
    }
    if event.is_full() {
        return Admission::Reject(JoinOutcome::EventFull);
    }
    Admission::Admit
}

/// Counter value after one member leaves. Clamped at zero.
pub fn release(event_id: Uuid, current_attendees: i32) -> i32 {
    if current_attendees <= 0 {
        warn!(
            %event_id,
            current_attendees,
            "attendee counter already at zero while removing a member"
        );
        return 0;
    }
    current_attendees - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(status: EventStatus, max: Option<i32>, current: i32) -> EventCapacity {
        EventCapacity {
            status,
            max_attendees: max,
            current_attendees: current,
        }
    }

    #[test]
    fn test_missing_event_is_not_found() {
        assert_eq!(
            admit(None, false),
            Admission::Reject(JoinOutcome::EventNotFound)
        );
    }

    #[test]
    fn test_inactive_event_is_not_found() {
        for status in [EventStatus::Cancelled, EventStatus::Completed] {
            let event = event(status, None, 0);
            assert_eq!(
                admit(Some(&event), false),
                Admission::Reject(JoinOutcome::EventNotFound)
            );
        }
    }

    #[test]
    fn test_existing_member_is_already_attending_even_when_full() {
        let event = event(EventStatus::Active, Some(1), 1);
        assert_eq!(
            admit(Some(&event), true),
            Admission::Reject(JoinOutcome::AlreadyAttending)
        );
    }

    #[test]
    fn test_full_event_rejects_newcomer() {
        let event = event(EventStatus::Active, Some(3), 3);
        assert_eq!(
            admit(Some(&event), false),
            Admission::Reject(JoinOutcome::EventFull)
        );
    }

    #[test]
    fn test_open_event_admits() {
        assert_eq!(
            admit(Some(&event(EventStatus::Active, Some(3), 2)), false),
            Admission::Admit
        );
        assert_eq!(
            admit(Some(&event(EventStatus::Active, None, 500)), false),
            Admission::Admit
        );
    }

    #[test]
    fn test_release_decrements_and_clamps() {
        let id = Uuid::new_v4();
        assert_eq!(release(id, 4), 3);
        assert_eq!(release(id, 1), 0);
        assert_eq!(release(id, 0), 0);
    }

    #[test]
    fn test_outcomes_serialize_as_codes() {
        assert_eq!(
            serde_json::to_string(&JoinOutcome::EventFull).unwrap(),
            "\"EVENT_FULL\""
        );
        assert_eq!(
            serde_json::to_string(&LeaveOutcome::WasNotAttending).unwrap(),
            "\"WAS_NOT_ATTENDING\""
        );
    }
}
