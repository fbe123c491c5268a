use crate::auth::jwt::JwtConfig;
use crate::auth::stamp::DEFAULT_ACTIVITY_THROTTLE_SECS;

/// Sign-out and activity policy.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// When `false`, signing out retires every session of the user, not just
    /// the one presented.
    pub allow_multiple_sessions: bool,
    /// Minimum gap between two persisted `last_active_at` writes.
    pub activity_throttle_secs: i64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            allow_multiple_sessions: true,
            activity_throttle_secs: DEFAULT_ACTIVITY_THROTTLE_SECS,
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development. In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background tasks (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Owner tag written on connection mirror rows (default: `default`).
    pub instance_id: String,
    /// Period of the expired-token sweep in seconds (default: `3600`).
    pub token_sweep_interval_secs: u64,
    /// JWT token configuration (secret, lifetimes, issuer/audience).
    pub jwt: JwtConfig,
    pub session: SessionPolicy,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                    |
    /// |--------------------------------|----------------------------|
    /// | `HOST`                         | `0.0.0.0`                  |
    /// | `PORT`                         | `3000`                     |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`                       |
    /// | `INSTANCE_ID`                  | `default`                  |
    /// | `TOKEN_SWEEP_INTERVAL_SECS`    | `3600`                     |
    /// | `AUTH_ALLOW_MULTIPLE_SESSIONS` | `true`                     |
    /// | `ACTIVITY_THROTTLE_SECS`       | `60`                       |
    ///
    /// JWT variables are documented on [`JwtConfig::from_env`].
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let instance_id = std::env::var("INSTANCE_ID")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "default".into());

        let token_sweep_interval_secs: u64 = std::env::var("TOKEN_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("TOKEN_SWEEP_INTERVAL_SECS must be a valid u64");
        assert!(token_sweep_interval_secs > 0, "TOKEN_SWEEP_INTERVAL_SECS must be positive");

        let allow_multiple_sessions = std::env::var("AUTH_ALLOW_MULTIPLE_SESSIONS")
            .map(|v| parse_bool(&v).expect("AUTH_ALLOW_MULTIPLE_SESSIONS must be true or false"))
            .unwrap_or(true);

        let activity_throttle_secs: i64 = std::env::var("ACTIVITY_THROTTLE_SECS")
            .unwrap_or_else(|_| DEFAULT_ACTIVITY_THROTTLE_SECS.to_string())
            .parse()
            .expect("ACTIVITY_THROTTLE_SECS must be a valid i64");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            instance_id,
            token_sweep_interval_secs,
            jwt,
            session: SessionPolicy {
                allow_multiple_sessions,
                activity_throttle_secs,
            },
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
