use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Membership of one user in one event. Unique per (event, user).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Attendance {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
}
