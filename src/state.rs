use std::sync::Arc;

use crate::attendance::AttendanceLedger;
use crate::auth::{CredentialStore, RequestGate, SessionManager};
use crate::config::Config;
use crate::database::Database;

/// Everything a handler can reach. Cheap to clone; holds no request state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub credentials: CredentialStore,
    pub sessions: SessionManager,
    pub gate: RequestGate,
    pub ledger: AttendanceLedger,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Self {
        let sessions = SessionManager::new(db.clone(), config.session_ttl());
        Self {
            credentials: CredentialStore::new(db.clone()),
            gate: RequestGate::new(sessions.clone(), config.login_path.clone()),
            ledger: AttendanceLedger::new(db.clone()),
            sessions,
            db,
            config: Arc::new(config),
        }
    }
}
