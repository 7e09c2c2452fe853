use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Active,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    /// The organizer. Organizer status never depends on the attendee set.
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: String,
    pub address: Option<String>,
    pub latitude: Option<Decimal>,
    pub longitude: Option<Decimal>,
    pub max_attendees: Option<i32>,
    /// Written only by the attendance ledger.
    pub current_attendees: i32,
    pub status: EventStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn is_organizer(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    pub fn capacity(&self) -> EventCapacity {
        EventCapacity {
            status: self.status,
            max_attendees: self.max_attendees,
            current_attendees: self.current_attendees,
        }
    }
}

/// The slice of an event the attendance ledger reads while admitting a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct EventCapacity {
    pub status: EventStatus,
    pub max_attendees: Option<i32>,
    pub current_attendees: i32,
}

impl EventCapacity {
    pub fn is_full(&self) -> bool {
        matches!(self.max_attendees, Some(max) if self.current_attendees >= max)
    }
}

/// Browse-page row: an event plus what the viewing member needs to render it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub event: Event,
    pub organizer_name: String,
    pub is_attending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity(max: Option<i32>, current: i32) -> EventCapacity {
        EventCapacity {
            status: EventStatus::Active,
            max_attendees: max,
            current_attendees: current,
        }
    }

    #[test]
    fn test_uncapped_event_is_never_full() {
        assert!(!capacity(None, 0).is_full());
        assert!(!capacity(None, 10_000).is_full());
    }

    #[test]
    fn test_capped_event_is_full_at_limit() {
        assert!(!capacity(Some(2), 1).is_full());
        assert!(capacity(Some(2), 2).is_full());
        assert!(capacity(Some(2), 3).is_full());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&EventStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
