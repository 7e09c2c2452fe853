use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/neighbourhood";
const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub session_ttl_days: i64,
    pub session_purge_interval_secs: u64,
    /// Where the request gate sends callers without a valid session
    pub login_path: String,
    /// Enables HSTS and `Secure` session cookies
    pub production: bool,
    pub cors_allowed_origins: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            database_max_connections: 5,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            session_ttl_days: 30,
            session_purge_interval_secs: 3600,
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            production: false,
            cors_allowed_origins: cors::DEFAULT_ALLOWED_ORIGINS.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session_ttl_days = match env_or("SESSION_TTL_DAYS", defaults.session_ttl_days) {
            days if days > 0 => days,
            days => {
                tracing::warn!(days, "SESSION_TTL_DAYS must be positive, using default");
                defaults.session_ttl_days
            }
        };

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            database_max_connections: env_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            session_ttl_days,
            session_purge_interval_secs: env_or(
                "SESSION_PURGE_INTERVAL_SECS",
                defaults.session_purge_interval_secs,
            )
            .max(1),
            login_path: env::var("LOGIN_PATH").unwrap_or(defaults.login_path),
            production: env::var("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.session_ttl_days)
    }

    pub fn session_purge_interval(&self) -> Duration {
        Duration::from_secs(self.session_purge_interval_secs)
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, "Invalid value, using default");
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_session_lifetime_is_thirty_days() {
        let config = Config::default();
        assert_eq!(config.session_ttl(), chrono::Duration::days(30));
        assert!(!config.production);
    }

    #[test]
    fn test_env_or_falls_back_on_garbage() {
        env::set_var("NEIGHBOURHOOD_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_or("NEIGHBOURHOOD_TEST_GARBAGE", 42u64), 42);
        env::remove_var("NEIGHBOURHOOD_TEST_GARBAGE");
    }

    #[test]
    fn test_env_or_parses_value() {
        env::set_var("NEIGHBOURHOOD_TEST_PORT", " 8080 ");
        assert_eq!(env_or("NEIGHBOURHOOD_TEST_PORT", 1u16), 8080);
        env::remove_var("NEIGHBOURHOOD_TEST_PORT");
    }
}
