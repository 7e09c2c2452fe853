//! Datastore access, one trait per table.
//!
//! Handlers and services only ever see [`Database`], a shared trait object.
//! [`PostgresDb`] is the production driver; [`ReferenceDb`] keeps everything in
//! memory and backs the test suite and `memory://` runs.
//!
//! Every mutual-exclusion guarantee lives inside a driver: the Postgres driver
//! uses transactions and row locks, the reference driver a single lock over
//! all of its tables. Nothing above this module synchronises.

mod postgres;
mod reference;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::attendance::{JoinOutcome, LeaveOutcome};
use crate::config::Config;
use crate::models::{
    Event, EventListing, EventStatus, Message, MessageThread, PublicUser, Reply, Session, User,
};
use crate::utils::error::Result;

pub use self::postgres::PostgresDb;
pub use self::reference::ReferenceDb;

#[async_trait]
pub trait AbstractUsers: Sync + Send {
    /// Insert a new user. Fails with `Conflict` when the username or email is taken.
    async fn insert_user(&self, user: &User) -> Result<()>;

    /// Fetch an active user whose username or email equals `identifier`
    async fn fetch_active_user_by_login(&self, identifier: &str) -> Result<Option<User>>;

    /// Flip the active flag. Returns false when no such user exists.
    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<bool>;
}

#[async_trait]
pub trait AbstractSessions: Sync + Send {
    async fn insert_session(&self, session: &Session) -> Result<()>;

    /// Resolve a token hash to its user, if the session is live at `now` and
    /// the user is active
    async fn fetch_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicUser>>;

    /// Delete the session with this token hash. Returns whether one existed.
    async fn delete_session(&self, token_hash: &str) -> Result<bool>;

    /// Delete every session whose expiry is at or before `now`
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait AbstractEvents: Sync + Send {
    async fn insert_event(&self, event: &Event) -> Result<()>;

    async fn fetch_event(&self, id: Uuid) -> Result<Option<Event>>;

    /// Active events starting at or after `now`, soonest first
    async fn fetch_upcoming_events(
        &self,
        viewer: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventListing>>;

    /// Returns false when no such event exists
    async fn update_event_status(&self, id: Uuid, status: EventStatus) -> Result<bool>;
}

#[async_trait]
pub trait AbstractAttendance: Sync + Send {
    /// Admit a member. The membership insert and counter increment commit
    /// together or not at all.
    async fn join_event(&self, event_id: Uuid, user_id: Uuid) -> Result<JoinOutcome>;

    /// Remove a member. The membership delete and counter decrement commit
    /// together or not at all.
    async fn leave_event(&self, event_id: Uuid, user_id: Uuid) -> Result<LeaveOutcome>;

    async fn fetch_attendee_count(&self, event_id: Uuid) -> Result<Option<i32>>;

    async fn is_attending(&self, event_id: Uuid, user_id: Uuid) -> Result<bool>;
}

#[async_trait]
pub trait AbstractMessages: Sync + Send {
    /// Fails with `NotFound` when `event_id` names no event
    async fn insert_message(&self, message: &Message) -> Result<()>;

    /// Fails with `NotFound` when the parent message does not exist
    async fn insert_reply(&self, reply: &Reply) -> Result<()>;

    /// The latest `limit` messages, newest first, each with its replies
    /// oldest first
    async fn fetch_recent_messages(&self, limit: i64) -> Result<Vec<MessageThread>>;
}

pub trait AbstractDatabase:
    AbstractUsers + AbstractSessions + AbstractEvents + AbstractAttendance + AbstractMessages
{
}

impl<T> AbstractDatabase for T where
    T: AbstractUsers + AbstractSessions + AbstractEvents + AbstractAttendance + AbstractMessages
{
}

pub type Database = Arc<dyn AbstractDatabase>;

/// URL scheme that selects the in-memory driver
pub const REFERENCE_URL_SCHEME: &str = "memory://";

/// Which datastore to connect to
#[derive(Debug, Clone)]
pub enum DatabaseInfo {
    /// In-memory datastore
    Reference,
    /// Postgres, migrated on connect
    Postgres { url: String, max_connections: u32 },
}

impl DatabaseInfo {
    pub fn from_config(config: &Config) -> Self {
        if config.database_url.starts_with(REFERENCE_URL_SCHEME) {
            DatabaseInfo::Reference
        } else {
            DatabaseInfo::Postgres {
                url: config.database_url.clone(),
                max_connections: config.database_max_connections,
            }
        }
    }

    pub async fn connect(self) -> Result<Database> {
        match self {
            DatabaseInfo::Reference => {
                tracing::warn!("Using the in-memory reference datastore; data is not persisted");
                Ok(Arc::new(ReferenceDb::default()))
            }
            DatabaseInfo::Postgres {
                url,
                max_connections,
            } => {
                let db = PostgresDb::connect(&url, max_connections).await?;
                db.migrate().await?;
                Ok(Arc::new(db))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_url_selects_reference_driver() {
        let config = Config {
            database_url: "memory://".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            DatabaseInfo::from_config(&config),
            DatabaseInfo::Reference
        ));
    }

    #[test]
    fn test_postgres_url_selects_postgres_driver() {
        let config = Config {
            database_url: "postgres://localhost/neighbourhood".to_string(),
            database_max_connections: 7,
            ..Config::default()
        };
        match DatabaseInfo::from_config(&config) {
            DatabaseInfo::Postgres {
                url,
                max_connections,
            } => {
                assert_eq!(url, "postgres://localhost/neighbourhood");
                assert_eq!(max_connections, 7);
            }
            other => panic!("unexpected driver {other:?}"),
        }
    }
}
