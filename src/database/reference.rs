use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::attendance::{self, Admission, JoinOutcome, LeaveOutcome};
use crate::models::{
    Attendance, Event, EventListing, EventStatus, Message, MessageThread, PublicUser, Reply,
    ReplyView, Session, User,
};
use crate::utils::error::{AppError, Result};

use super::{AbstractAttendance, AbstractEvents, AbstractMessages, AbstractSessions, AbstractUsers};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    /// Keyed by token hash
    sessions: HashMap<String, Session>,
    events: HashMap<Uuid, Event>,
    attendees: HashMap<(Uuid, Uuid), Attendance>,
    /// Insertion order
    messages: Vec<Message>,
    replies: Vec<Reply>,
}

impl Tables {
    fn author_name(&self, user_id: Uuid) -> String {
        self.users
            .get(&user_id)
            .map(|user| user.full_name.clone())
            .unwrap_or_default()
    }
}

/// In-memory datastore.
///
/// All tables sit behind one lock, so every trait method is a serialisable
/// transaction: a join's membership check, capacity check, insert and
/// counter bump happen while no other call can observe the tables.
#[derive(Clone, Default)]
pub struct ReferenceDb {
    tables: Arc<Mutex<Tables>>,
}

impl ReferenceDb {
    /// Number of membership rows for an event, bypassing the counter
    pub async fn count_attendance_rows(&self, event_id: Uuid) -> usize {
        let tables = self.tables.lock().await;
        tables
            .attendees
            .keys()
            .filter(|(event, _)| *event == event_id)
            .count()
    }

    pub async fn session_count(&self) -> usize {
        self.tables.lock().await.sessions.len()
    }
}

#[async_trait]
impl AbstractUsers for ReferenceDb {
    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let taken = tables.users.values().any(|existing| {
            existing.username == user.username || existing.email == user.email
        });
        if taken || tables.users.contains_key(&user.id) {
            return Err(AppError::Conflict(
                "Username or email already exists".to_string(),
            ));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn fetch_active_user_by_login(&self, identifier: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|user| {
                user.is_active && (user.username == identifier || user.email == identifier)
            })
            .cloned())
    }

    async fn set_user_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AbstractSessions for ReferenceDb {
    async fn insert_session(&self, session: &Session) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&session.user_id) {
            return Err(AppError::NotFound(format!(
                "User '{}' does not exist",
                session.user_id
            )));
        }
        if tables.sessions.contains_key(&session.token_hash) {
            return Err(AppError::Conflict("Session token collision".to_string()));
        }
        tables
            .sessions
            .insert(session.token_hash.clone(), session.clone());
        Ok(())
    }

    async fn fetch_session_user(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicUser>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .get(token_hash)
            .filter(|session| session.is_live_at(now))
            .and_then(|session| tables.users.get(&session.user_id))
            .filter(|user| user.is_active)
            .map(PublicUser::from))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .await
            .sessions
            .remove(token_hash)
            .is_some())
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.sessions.len();
        tables.sessions.retain(|_, session| session.is_live_at(now));
        Ok((before - tables.sessions.len()) as u64)
    }
}

#[async_trait]
impl AbstractEvents for ReferenceDb {
    async fn insert_event(&self, event: &Event) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&event.user_id) {
            return Err(AppError::NotFound(format!(
                "Organizer '{}' does not exist",
                event.user_id
            )));
        }
        if tables.events.contains_key(&event.id) {
            return Err(AppError::Conflict(format!(
                "Event '{}' already exists",
                event.id
            )));
        }
        tables.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn fetch_event(&self, id: Uuid) -> Result<Option<Event>> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn fetch_upcoming_events(
        &self,
        viewer: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventListing>> {
        let tables = self.tables.lock().await;
        let mut listings: Vec<EventListing> = tables
            .events
            .values()
            .filter(|event| event.status == EventStatus::Active && event.start_time >= now)
            .filter_map(|event| {
                let organizer = tables.users.get(&event.user_id)?;
                Some(EventListing {
                    event: event.clone(),
                    organizer_name: organizer.full_name.clone(),
                    is_attending: tables.attendees.contains_key(&(event.id, viewer)),
                })
            })
            .collect();
        listings.sort_by_key(|listing| listing.event.start_time);
        Ok(listings)
    }

    async fn update_event_status(&self, id: Uuid, status: EventStatus) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables.events.get_mut(&id) {
            Some(event) => {
                event.status = status;
                event.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl AbstractAttendance for ReferenceDb {
    async fn join_event(&self, event_id: Uuid, user_id: Uuid) -> Result<JoinOutcome> {
        let mut tables = self.tables.lock().await;
        let tables = &mut *tables;

        let capacity = tables.events.get(&event_id).map(Event::capacity);
        let already_attending = tables.attendees.contains_key(&(event_id, user_id));
        if let Admission::Reject(outcome) = attendance::admit(capacity.as_ref(), already_attending)
        {
            return Ok(outcome);
        }
        if !tables.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User '{}' does not exist", user_id)));
        }

        let Some(event) = tables.events.get_mut(&event_id) else {
            return Ok(JoinOutcome::EventNotFound);
        };
        event.current_attendees += 1;
        tables.attendees.insert(
            (event_id, user_id),
            Attendance {
                event_id,
                user_id,
                joined_at: Utc::now(),
            },
        );
        Ok(JoinOutcome::Attending)
    }

    async fn leave_event(&self, event_id: Uuid, user_id: Uuid) -> Result<LeaveOutcome> {
        let mut tables = self.tables.lock().await;
        let tables = &mut *tables;

        if tables.attendees.remove(&(event_id, user_id)).is_none() {
            return Ok(LeaveOutcome::WasNotAttending);
        }
        if let Some(event) = tables.events.get_mut(&event_id) {
            event.current_attendees = attendance::release(event_id, event.current_attendees);
        }
        Ok(LeaveOutcome::Left)
    }

    async fn fetch_attendee_count(&self, event_id: Uuid) -> Result<Option<i32>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .events
            .get(&event_id)
            .map(|event| event.current_attendees))
    }

    async fn is_attending(&self, event_id: Uuid, user_id: Uuid) -> Result<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.attendees.contains_key(&(event_id, user_id)))
    }
}

#[async_trait]
impl AbstractMessages for ReferenceDb {
    async fn insert_message(&self, message: &Message) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.users.contains_key(&message.user_id) {
            return Err(AppError::NotFound(format!(
                "User '{}' does not exist",
                message.user_id
            )));
        }
        if let Some(event_id) = message.event_id {
            if !tables.events.contains_key(&event_id) {
                return Err(AppError::NotFound("Event is not available".to_string()));
            }
        }
        tables.messages.push(message.clone());
        Ok(())
    }

    async fn insert_reply(&self, reply: &Reply) -> Result<()> {
        let mut tables = self.tables.lock().await;
        if !tables.messages.iter().any(|m| m.id == reply.message_id) {
            return Err(AppError::NotFound("Message not found".to_string()));
        }
        if !tables.users.contains_key(&reply.user_id) {
            return Err(AppError::NotFound(format!(
                "User '{}' does not exist",
                reply.user_id
            )));
        }
        tables.replies.push(reply.clone());
        Ok(())
    }

    async fn fetch_recent_messages(&self, limit: i64) -> Result<Vec<MessageThread>> {
        let tables = self.tables.lock().await;

        let mut recent: Vec<&Message> = tables.messages.iter().rev().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(recent
            .into_iter()
            .map(|message| {
                let mut replies: Vec<ReplyView> = tables
                    .replies
                    .iter()
                    .filter(|reply| reply.message_id == message.id)
                    .map(|reply| ReplyView {
                        reply: reply.clone(),
                        author_name: tables.author_name(reply.user_id),
                    })
                    .collect();
                replies.sort_by_key(|view| view.reply.created_at);

                MessageThread {
                    message: message.clone(),
                    author_name: tables.author_name(message.user_id),
                    reply_count: replies.len() as i64,
                    replies,
                }
            })
            .collect())
    }
}
