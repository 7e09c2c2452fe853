use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};

use crate::models::PublicUser;
use crate::state::AppState;
use crate::utils::error::AppError;

use super::SessionManager;

pub const SESSION_COOKIE: &str = "session_token";
pub const SESSION_HEADER: &str = "x-session-token";

/// Every token a client presented, in precedence order: the session cookie,
/// then `Authorization: Bearer`, then `x-session-token`. Blank values are
/// skipped and duplicates collapsed.
pub fn presented_tokens(headers: &HeaderMap) -> Vec<&str> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim());

    let from_bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    let from_header = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim);

    let mut tokens = Vec::with_capacity(3);
    for token in [from_cookie, from_bearer, from_header].into_iter().flatten() {
        if !token.is_empty() && !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens
}

/// An authenticated member, resolved from the request's session token.
///
/// Taking this as a handler argument is what makes a route protected.
#[derive(Debug, Clone)]
pub struct AuthUser(pub PublicUser);

#[derive(Debug)]
pub enum GateRejection {
    /// No live session; send the caller to the login entry point
    Unauthenticated { login_path: String },
    /// The datastore could not answer
    Unavailable(AppError),
}

impl IntoResponse for GateRejection {
    fn into_response(self) -> Response {
        match self {
            GateRejection::Unauthenticated { login_path } => {
                Redirect::to(&login_path).into_response()
            }
            GateRejection::Unavailable(err) => err.into_response(),
        }
    }
}

/// The choke point every protected operation passes through.
#[derive(Clone)]
pub struct RequestGate {
    sessions: SessionManager,
    login_path: String,
}

impl RequestGate {
    pub fn new(sessions: SessionManager, login_path: impl Into<String>) -> Self {
        Self {
            sessions,
            login_path: login_path.into(),
        }
    }

    /// Tries each presented token in precedence order, so a stale cookie
    /// does not shadow a valid header token.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, GateRejection> {
        for token in presented_tokens(headers) {
            match self.sessions.verify_session(token).await {
                Ok(Some(user)) => return Ok(AuthUser(user)),
                Ok(None) => continue,
                Err(err) => return Err(GateRejection::Unavailable(err)),
            }
        }
        tracing::debug!("rejected request without a live session");
        Err(self.unauthenticated())
    }

    fn unauthenticated(&self) -> GateRejection {
        GateRejection::Unauthenticated {
            login_path: self.login_path.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = GateRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let user = state.gate.authenticate(&parts.headers).await?;
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, StatusCode};

    fn first_token(map: &HeaderMap) -> Option<&str> {
        presented_tokens(map).first().copied()
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_token_from_cookie() {
        let map = headers(&[("cookie", "theme=dark; session_token=abc123; lang=en")]);
        assert_eq!(first_token(&map), Some("abc123"));
    }

    #[test]
    fn test_token_across_multiple_cookie_headers() {
        let map = headers(&[("cookie", "theme=dark"), ("cookie", "session_token=xyz")]);
        assert_eq!(first_token(&map), Some("xyz"));
    }

    #[test]
    fn test_cookie_takes_precedence_over_headers() {
        let map = headers(&[
            ("cookie", "session_token=from-cookie"),
            ("authorization", "Bearer from-bearer"),
            ("x-session-token", "from-header"),
        ]);
        assert_eq!(first_token(&map), Some("from-cookie"));
    }

    #[test]
    fn test_token_from_bearer_then_custom_header() {
        let map = headers(&[("authorization", "Bearer tok")]);
        assert_eq!(first_token(&map), Some("tok"));

        let map = headers(&[("authorization", "Basic Zm9vOmJhcg=="), ("x-session-token", "hdr")]);
        assert_eq!(first_token(&map), Some("hdr"));
    }

    #[test]
    fn test_missing_or_empty_token() {
        assert_eq!(first_token(&HeaderMap::new()), None);
        assert_eq!(first_token(&headers(&[("cookie", "session_token=")])), None);
        assert_eq!(
            first_token(&headers(&[("cookie", "other_session_token=abc")])),
            None
        );
    }

    #[test]
    fn test_presented_tokens_keep_precedence_and_skip_duplicates() {
        let map = headers(&[
            ("cookie", "session_token=stale"),
            ("authorization", "Bearer fresh"),
            ("x-session-token", "stale"),
        ]);
        assert_eq!(presented_tokens(&map), vec!["stale", "fresh"]);
    }

    async fn gate_with_session() -> (RequestGate, String) {
        use crate::database::{AbstractUsers, ReferenceDb};
        use crate::models::User;
        use chrono::{Duration, Utc};
        use std::sync::Arc;
        use uuid::Uuid;

        let db = ReferenceDb::default();
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: "mo".into(),
            email: "mo@example.org".into(),
            password_hash: "$argon2id$unused".into(),
            full_name: "Mo Neighbour".into(),
            address: None,
            phone: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.insert_user(&user).await.unwrap();

        let sessions = SessionManager::new(Arc::new(db), Duration::days(30));
        let token = sessions.create_session(user.id).await.unwrap();
        (RequestGate::new(sessions, "/login"), token)
    }

    #[tokio::test]
    async fn test_stale_cookie_does_not_shadow_valid_bearer() {
        let (gate, token) = gate_with_session().await;
        let mut map = headers(&[("cookie", "session_token=0000")]);
        map.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );

        let AuthUser(user) = gate.authenticate(&map).await.unwrap();
        assert_eq!(user.username, "mo");
    }

    #[tokio::test]
    async fn test_only_stale_tokens_redirect() {
        let (gate, _) = gate_with_session().await;
        let map = headers(&[("cookie", "session_token=0000"), ("x-session-token", "ffff")]);
        assert!(matches!(
            gate.authenticate(&map).await,
            Err(GateRejection::Unauthenticated { .. })
        ));
    }

    #[test]
    fn test_unauthenticated_rejection_redirects() {
        let response = GateRejection::Unauthenticated {
            login_path: "/login".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login");
    }

    #[test]
    fn test_unavailable_rejection_is_not_a_redirect() {
        let response =
            GateRejection::Unavailable(AppError::StoreUnavailable("down".into())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
