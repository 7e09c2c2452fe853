use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::attendance::{self, Admission, JoinOutcome, LeaveOutcome};
use crate::models::{
    Event, EventCapacity, EventListing, EventStatus, Message, MessageThread, PublicUser, Reply,
    ReplyView, Session, User,
};
use crate::utils::error::{AppError, Result};

use super::{AbstractAttendance, AbstractEvents, AbstractMessages, AbstractSessions, AbstractUsers};

const USER_COLUMNS: &str = "id, username, email, password_hash, full_name, address, phone, \
                            is_active, created_at, updated_at";

const EVENT_COLUMNS: &str = "id, user_id, title, description, start_time, end_time, location, \
                             address, latitude, longitude, max_attendees, current_attendees, \
                             status, created_at, updated_at";

/// Production datastore.
///
/// Attendance changes lock the event row (`SELECT ... FOR UPDATE`) before
/// reading membership and capacity, which serialises every join and leave on
/// the same event across all server processes. The composite primary key on
/// `event_attendees` backs this up against duplicate rows.
#[derive(Clone)]
pub struct PostgresDb {
    pool: PgPool,
}

impl PostgresDb {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("migration failed: {e}")))?;
        tracing::info!("Migrations run successfully");
        Ok(())
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl AbstractUsers for PostgresDb {
    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash, full_name, address, phone, \
             is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.address)
        .bind(&user.phone)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("Username or email already exists".to_string())
            } else {
                AppError::DatabaseError(e)
            }
        })?;
        Ok(())
    }

    async fn fetch_active_user_by_login(&self, identifier: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE (username = $1 OR email = $1) AND is_active = TRUE \
             LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let result =
            sqlx::query("UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(active)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AbstractSessions for PostgresDb {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            "INSERT INTO user_sessions (id, user_id, token_hash, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token_hash)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicUser>> {
        let user = sqlx::query_as::<_, PublicUser>(
            "SELECT u.id, u.username, u.email, u.full_name \
             FROM users u \
             JOIN user_sessions s ON u.id = s.user_id \
             WHERE s.token_hash = $1 AND s.expires_at > $2 AND u.is_active = TRUE",
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl AbstractEvents for PostgresDb {
    async fn insert_event(&self, event: &Event) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO events ({EVENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)"
        ))
        .bind(event.id)
        .bind(event.user_id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.start_time)
        .bind(event.end_time)
        .bind(&event.location)
        .bind(&event.address)
        .bind(event.latitude)
        .bind(event.longitude)
        .bind(event.max_attendees)
        .bind(event.current_attendees)
        .bind(event.status)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_event(&self, id: Uuid) -> Result<Option<Event>> {
        let event = sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn fetch_upcoming_events(
        &self,
        viewer: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventListing>> {
        let listings = sqlx::query_as::<_, EventListing>(
            "SELECT e.id, e.user_id, e.title, e.description, e.start_time, e.end_time, \
                    e.location, e.address, e.latitude, e.longitude, e.max_attendees, \
                    e.current_attendees, e.status, e.created_at, e.updated_at, \
                    u.full_name AS organizer_name, \
                    EXISTS ( \
                        SELECT 1 FROM event_attendees ea \
                        WHERE ea.event_id = e.id AND ea.user_id = $1 \
                    ) AS is_attending \
             FROM events e \
             JOIN users u ON e.user_id = u.id \
             WHERE e.status = 'active' AND e.start_time >= $2 \
             ORDER BY e.start_time ASC",
        )
        .bind(viewer)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(listings)
    }

    async fn update_event_status(&self, id: Uuid, status: EventStatus) -> Result<bool> {
        let result =
            sqlx::query("UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl AbstractAttendance for PostgresDb {
    async fn join_event(&self, event_id: Uuid, user_id: Uuid) -> Result<JoinOutcome> {
        let mut tx = self.pool.begin().await?;

        let capacity = sqlx::query_as::<_, EventCapacity>(
            "SELECT status, max_attendees, current_attendees \
             FROM events WHERE id = $1 FOR UPDATE",
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?;

        let already_attending: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM event_attendees WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if let Admission::Reject(outcome) = attendance::admit(capacity.as_ref(), already_attending)
        {
            tx.rollback().await?;
            return Ok(outcome);
        }

        let inserted = sqlx::query(
            "INSERT INTO event_attendees (event_id, user_id, joined_at) \
             VALUES ($1, $2, NOW()) \
             ON CONFLICT (event_id, user_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(JoinOutcome::AlreadyAttending);
        }

        sqlx::query(
            "UPDATE events SET current_attendees = current_attendees + 1, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(event_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(JoinOutcome::Attending)
    }

    async fn leave_event(&self, event_id: Uuid, user_id: Uuid) -> Result<LeaveOutcome> {
        let mut tx = self.pool.begin().await?;

        let current: Option<i32> = sqlx::query_scalar(
            "SELECT current_attendees FROM events WHERE id = $1 FOR UPDATE",
        )
        .bind(event_id)
        .fetch_optional(&mut *tx)
        .await?;

        let deleted =
            sqlx::query("DELETE FROM event_attendees WHERE event_id = $1 AND user_id = $2")
                .bind(event_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(LeaveOutcome::WasNotAttending);
        }

        if let Some(current) = current {
            sqlx::query(
                "UPDATE events SET current_attendees = $2, updated_at = NOW() WHERE id = $1",
            )
            .bind(event_id)
            .bind(attendance::release(event_id, current))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(LeaveOutcome::Left)
    }

    async fn fetch_attendee_count(&self, event_id: Uuid) -> Result<Option<i32>> {
        let count = sqlx::query_scalar("SELECT current_attendees FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(count)
    }

    async fn is_attending(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let attending = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM event_attendees WHERE event_id = $1 AND user_id = $2)",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(attending)
    }
}

#[async_trait]
impl AbstractMessages for PostgresDb {
    async fn insert_message(&self, message: &Message) -> Result<()> {
        sqlx::query(
            "INSERT INTO community_messages \
             (id, user_id, message, message_type, event_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(message.id)
        .bind(message.user_id)
        .bind(&message.message)
        .bind(message.message_type)
        .bind(message.event_id)
        .bind(message.created_at)
        .bind(message.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("Event is not available".to_string())
            } else {
                AppError::DatabaseError(e)
            }
        })?;
        Ok(())
    }

    async fn insert_reply(&self, reply: &Reply) -> Result<()> {
        sqlx::query(
            "INSERT INTO message_replies (id, message_id, user_id, reply_text, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(reply.id)
        .bind(reply.message_id)
        .bind(reply.user_id)
        .bind(&reply.reply_text)
        .bind(reply.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("Message not found".to_string())
            } else {
                AppError::DatabaseError(e)
            }
        })?;
        Ok(())
    }

    async fn fetch_recent_messages(&self, limit: i64) -> Result<Vec<MessageThread>> {
        let mut threads = sqlx::query_as::<_, MessageThread>(
            "SELECT m.id, m.user_id, m.message, m.message_type, m.event_id, \
                    m.created_at, m.updated_at, \
                    u.full_name AS author_name, \
                    COUNT(r.id) AS reply_count \
             FROM community_messages m \
             JOIN users u ON m.user_id = u.id \
             LEFT JOIN message_replies r ON r.message_id = m.id \
             GROUP BY m.id, u.full_name \
             ORDER BY m.created_at DESC, m.id \
             LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        if threads.is_empty() {
            return Ok(threads);
        }

        let ids: Vec<Uuid> = threads.iter().map(|thread| thread.message.id).collect();
        let replies = sqlx::query_as::<_, ReplyView>(
            "SELECT r.id, r.message_id, r.user_id, r.reply_text, r.created_at, \
                    u.full_name AS author_name \
             FROM message_replies r \
             JOIN users u ON r.user_id = u.id \
             WHERE r.message_id = ANY($1) \
             ORDER BY r.created_at ASC, r.id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        for reply in replies {
            if let Some(thread) = threads
                .iter_mut()
                .find(|thread| thread.message.id == reply.reply.message_id)
            {
                thread.replies.push(reply);
            }
        }
        Ok(threads)
    }
}
