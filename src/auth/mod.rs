//! Member identity: credentials, sessions and the request gate.

pub mod credentials;
pub mod gate;
pub mod password;
pub mod session;

pub use credentials::{CredentialStore, Registration};
pub use gate::{presented_tokens, AuthUser, GateRejection, RequestGate, SESSION_COOKIE};
pub use session::SessionManager;
