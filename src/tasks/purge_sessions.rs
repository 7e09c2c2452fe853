use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::auth::SessionManager;

/// Deletes expired sessions every `period`, off the request path.
///
/// A failed round is logged and retried on the next tick.
pub async fn task(sessions: SessionManager, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match sessions.purge_expired().await {
            Ok(0) => debug!("no expired sessions to purge"),
            Ok(purged) => info!(purged, "purged expired sessions"),
            Err(e) => warn!(error = %e, "session purge failed"),
        }
    }
}

pub fn spawn(sessions: SessionManager, period: Duration) -> JoinHandle<()> {
    info!(period_secs = period.as_secs(), "starting session purge task");
    tokio::spawn(task(sessions, period))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{AbstractUsers, ReferenceDb};
    use crate::models::User;
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_task_purges_expired_sessions() {
        let db = ReferenceDb::default();
        let now = Utc::now();
        let user_id = Uuid::new_v4();
        db.insert_user(&User {
            id: user_id,
            username: "grace".into(),
            email: "grace@example.org".into(),
            password_hash: "$argon2id$unused".into(),
            full_name: "Grace Hopper".into(),
            address: None,
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();

        let sessions = SessionManager::new(Arc::new(db.clone()), chrono::Duration::days(30));
        sessions
            .create_session_at(user_id, now - chrono::Duration::days(40))
            .await
            .unwrap();
        sessions.create_session_at(user_id, now).await.unwrap();
        assert_eq!(db.session_count().await, 2);

        let handle = spawn(sessions, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(db.session_count().await, 1);
    }
}
