use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::database::{AbstractUsers, Database};
use crate::models::User;
use crate::utils::error::{AppError, Result};

use super::password;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

/// Sign-up form
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

impl Registration {
    /// Reports every problem at once, joined by ", ".
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let username = self.username.trim();
        if username.is_empty() {
            errors.push("Username is required");
        } else if username.chars().count() < MIN_USERNAME_LEN {
            errors.push("Username must be at least 3 characters long");
        }

        let email = self.email.trim();
        if email.is_empty() {
            errors.push("Email is required");
        } else if !is_plausible_email(email) {
            errors.push("Please enter a valid email address");
        }

        if self.password.is_empty() {
            errors.push("Password is required");
        } else if self.password.chars().count() < MIN_PASSWORD_LEN {
            errors.push("Password must be at least 6 characters long");
        }

        if self.password != self.confirm_password {
            errors.push("Passwords do not match");
        }

        if self.full_name.trim().is_empty() {
            errors.push("Full name is required");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::ValidationError(errors.join(", ")))
        }
    }
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// User identities and password hashes.
#[derive(Clone)]
pub struct CredentialStore {
    db: Database,
}

impl CredentialStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn register(&self, form: &Registration) -> Result<User> {
        form.validate()?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: form.username.trim().to_string(),
            email: form.email.trim().to_string(),
            password_hash: password::hash_password(form.password.clone()).await?,
            full_name: form.full_name.trim().to_string(),
            address: non_blank(&form.address),
            phone: non_blank(&form.phone),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// Only active users are found.
    pub async fn find_user_by_username_or_email(&self, identifier: &str) -> Result<Option<User>> {
        self.db.fetch_active_user_by_login(identifier.trim()).await
    }

    /// Runs on the blocking pool.
    pub async fn verify_password(&self, hash: &str, plaintext: &str) -> Result<bool> {
        password::verify_password(hash.to_string(), plaintext.to_string()).await
    }

    /// Login check: `None` for an unknown identifier, an inactive account or
    /// a wrong password, without saying which.
    pub async fn authenticate(&self, identifier: &str, plaintext: &str) -> Result<Option<User>> {
        let Some(user) = self.find_user_by_username_or_email(identifier).await? else {
            return Ok(None);
        };
        if self.verify_password(&user.password_hash, plaintext).await? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    pub async fn set_active(&self, user_id: Uuid, active: bool) -> Result<()> {
        if !self.db.set_user_active(user_id, active).await? {
            return Err(AppError::NotFound(format!("User '{}' was not found", user_id)));
        }
        tracing::info!(%user_id, active, "user active flag changed");
        Ok(())
    }
}
