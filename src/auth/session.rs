//! Session tokens: issue, verify, revoke, purge.
//!
//! A token is 32 bytes from the OS RNG rendered as 64 hex characters. The
//! client holds the token; the datastore holds only its SHA-256, so a leaked
//! sessions table cannot be replayed. Expiry is absolute and checked on every
//! verification, so purging is space reclamation only.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::database::{AbstractSessions, Database};
use crate::models::{PublicUser, Session};
use crate::utils::error::Result;

pub const SESSION_TOKEN_BYTES: usize = 32;

/// Length of a rendered token
pub const SESSION_TOKEN_LEN: usize = SESSION_TOKEN_BYTES * 2;

#[derive(Clone)]
pub struct SessionManager {
    db: Database,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self { db, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn create_session(&self, user_id: Uuid) -> Result<String> {
        self.create_session_at(user_id, Utc::now()).await
    }

    /// Issues a token valid until `now + ttl`. The caller delivers it.
    pub async fn create_session_at(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String> {
        let token = generate_token();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            token_hash: hash_token(&token),
            created_at: now,
            expires_at: now + self.ttl,
        };

        self.db.insert_session(&session).await?;
        tracing::info!(%user_id, session_id = %session.id, "session created");
        Ok(token)
    }

    pub async fn verify_session(&self, token: &str) -> Result<Option<PublicUser>> {
        self.verify_session_at(token, Utc::now()).await
    }

    /// `None` for a missing, unknown or expired token and for a deactivated
    /// user. `Err` only when the datastore fails.
    pub async fn verify_session_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PublicUser>> {
        if !is_well_formed(token) {
            return Ok(None);
        }
        self.db.fetch_session_user(&hash_token(token), now).await
    }

    /// Idempotent.
    pub async fn destroy_session(&self, token: &str) -> Result<()> {
        if !is_well_formed(token) {
            return Ok(());
        }
        if self.db.delete_session(&hash_token(token)).await? {
            tracing::info!("session destroyed");
        }
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        self.purge_expired_at(Utc::now()).await
    }

    pub async fn purge_expired_at(&self, now: DateTime<Utc>) -> Result<u64> {
        self.db.delete_expired_sessions(now).await
    }
}

fn generate_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn is_well_formed(token: &str) -> bool {
    token.len() == SESSION_TOKEN_LEN && token.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{AbstractUsers, ReferenceDb};
    use crate::models::User;
    use std::sync::Arc;

    async fn setup() -> (SessionManager, ReferenceDb, Uuid) {
        let db = ReferenceDb::default();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "ada".into(),
            email: "ada@example.org".into(),
            password_hash: "$argon2id$unused".into(),
            full_name: "Ada Lovelace".into(),
            address: None,
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.insert_user(&user).await.unwrap();
        let manager = SessionManager::new(Arc::new(db.clone()), Duration::days(30));
        (manager, db, user.id)
    }

    #[test]
    fn test_generated_tokens_are_fixed_length_hex() {
        let token = generate_token();
        assert_eq!(token.len(), SESSION_TOKEN_LEN);
        assert!(is_well_formed(&token));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_token_hash_is_stable_and_distinct_from_token() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[tokio::test]
    async fn test_fresh_session_verifies() {
        let (manager, _, user_id) = setup().await;
        let token = manager.create_session(user_id).await.unwrap();

        let user = manager.verify_session(&token).await.unwrap().unwrap();
        assert_eq!(user.id, user_id);
        assert_eq!(user.username, "ada");
    }

    #[tokio::test]
    async fn test_session_valid_at_day_29_and_rejected_at_day_31() {
        let (manager, _, user_id) = setup().await;
        let issued = Utc::now();
        let token = manager.create_session_at(user_id, issued).await.unwrap();

        let day_29 = issued + Duration::days(29);
        assert!(manager.verify_session_at(&token, day_29).await.unwrap().is_some());

        let day_31 = issued + Duration::days(31);
        assert!(manager.verify_session_at(&token, day_31).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expiry_instant_is_exclusive() {
        let (manager, _, user_id) = setup().await;
        let issued = Utc::now();
        let token = manager.create_session_at(user_id, issued).await.unwrap();

        let expiry = issued + Duration::days(30);
        assert!(manager.verify_session_at(&token, expiry).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_tokens_are_rejected() {
        let (manager, _, _) = setup().await;
        assert!(manager.verify_session("").await.unwrap().is_none());
        assert!(manager.verify_session("short").await.unwrap().is_none());
        assert!(manager
            .verify_session(&generate_token())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let (manager, _, user_id) = setup().await;
        let token = manager.create_session(user_id).await.unwrap();

        manager.destroy_session(&token).await.unwrap();
        assert!(manager.verify_session(&token).await.unwrap().is_none());
        manager.destroy_session(&token).await.unwrap();
        manager.destroy_session("garbage").await.unwrap();
    }

    #[tokio::test]
    async fn test_multiple_devices_hold_independent_sessions() {
        let (manager, _, user_id) = setup().await;
        let phone = manager.create_session(user_id).await.unwrap();
        let laptop = manager.create_session(user_id).await.unwrap();

        manager.destroy_session(&phone).await.unwrap();
        assert!(manager.verify_session(&phone).await.unwrap().is_none());
        assert!(manager.verify_session(&laptop).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deactivation_revokes_verification() {
        let (manager, db, user_id) = setup().await;
        let token = manager.create_session(user_id).await.unwrap();

        db.set_user_active(user_id, false).await.unwrap();
        assert!(manager.verify_session(&token).await.unwrap().is_none());

        db.set_user_active(user_id, true).await.unwrap();
        assert!(manager.verify_session(&token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_removes_only_expired_sessions() {
        let (manager, db, user_id) = setup().await;
        let now = Utc::now();
        let stale = manager
            .create_session_at(user_id, now - Duration::days(31))
            .await
            .unwrap();
        let live = manager.create_session_at(user_id, now).await.unwrap();

        // Expired sessions are rejected before any purge runs
        assert!(manager.verify_session_at(&stale, now).await.unwrap().is_none());

        assert_eq!(manager.purge_expired_at(now).await.unwrap(), 1);
        assert_eq!(db.session_count().await, 1);
        assert!(manager.verify_session_at(&live, now).await.unwrap().is_some());
    }
}
