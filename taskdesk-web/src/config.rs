//! Server configuration
//!
//! Values come from the process environment (after `.env` is loaded by the
//! binary) and may be overridden by command line flags.

use crate::{WebError, WebResult};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Secret used when `JWT_SECRET` is unset; refused in production
pub const DEFAULT_JWT_SECRET: &str = "taskdesk-development-secret";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_JWT_EXPIRE_HOURS: u64 = 24;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            other => Err(format!("Unknown environment: {}", other)),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        };
        f.write_str(name)
    }
}

/// Credentials for the account created on an empty store
#[derive(Clone, PartialEq, Eq)]
pub struct SeedAdmin {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for SeedAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeedAdmin")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Configuration for the web server
#[derive(Clone)]
pub struct WebConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    pub environment: Environment,
    /// `memory` for the in-process store, otherwise a SQLite URL
    pub database_url: String,
    /// Redis URL; the in-process cache is used when absent
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    /// Token lifetime; the source of truth for session length
    pub jwt_expire_hours: u64,
    /// Cookie lifetime override; defaults to the token lifetime
    pub cookie_max_age_days: Option<u64>,
    pub cors_origins: Vec<String>,
    pub seed_admin: Option<SeedAdmin>,
}

impl fmt::Debug for WebConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("database_url", &self.database_url)
            .field("redis_configured", &self.redis_url.is_some())
            .field("jwt_expire_hours", &self.jwt_expire_hours)
            .field("cookie_max_age_days", &self.cookie_max_age_days)
            .field("cors_origins", &self.cors_origins)
            .field("seed_admin", &self.seed_admin)
            .finish_non_exhaustive()
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            environment: Environment::Development,
            database_url: "sqlite::memory:".to_string(),
            redis_url: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expire_hours: DEFAULT_JWT_EXPIRE_HOURS,
            cookie_max_age_days: None,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
            seed_admin: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> WebResult<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| WebError::Config(format!("{} is invalid: {}", name, e)))
}

impl WebConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> WebResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> WebResult<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(host) = var("TASKDESK_HOST") {
            config.host = host;
        }
        if let Some(port) = var("TASKDESK_PORT").or_else(|| var("PORT")) {
            config.port = parse_var("TASKDESK_PORT", &port)?;
        }
        if let Some(env) = var("TASKDESK_ENV") {
            config.environment = parse_var("TASKDESK_ENV", &env)?;
        }
        if let Some(url) = var("DATABASE_URL") {
            config.database_url = url;
        }
        config.redis_url = var("REDIS_URL");
        if let Some(secret) = var("JWT_SECRET") {
            config.jwt_secret = secret;
        }
        if let Some(hours) = var("JWT_EXPIRE_HOURS") {
            config.jwt_expire_hours = parse_var("JWT_EXPIRE_HOURS", &hours)?;
        }
        if let Some(days) = var("COOKIE_MAX_AGE_DAYS") {
            config.cookie_max_age_days = Some(parse_var("COOKIE_MAX_AGE_DAYS", &days)?);
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let (Some(email), Some(password)) = (var("SEED_ADMIN_EMAIL"), var("SEED_ADMIN_PASSWORD"))
        {
            config.seed_admin = Some(SeedAdmin { email, password });
        }

        Ok(config)
    }

    /// Get the server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_secs(self.jwt_expire_hours * 3600)
    }

    pub fn cookie_lifetime(&self) -> Duration {
        match self.cookie_max_age_days {
            Some(days) => Duration::from_secs(days * 24 * 3600),
            None => self.token_lifetime(),
        }
    }

    /// Check settings that would make the server unsafe or inconsistent
    pub fn validate(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        if self.jwt_secret.trim().is_empty() {
            report.errors.push("JWT_SECRET must not be empty".to_string());
        } else if self.environment.is_production() && self.jwt_secret == DEFAULT_JWT_SECRET {
            report
                .errors
                .push("JWT_SECRET must be set in production".to_string());
        }
        if self.jwt_expire_hours == 0 {
            report
                .errors
                .push("JWT_EXPIRE_HOURS must be at least 1".to_string());
        }
        if self.cookie_lifetime() > self.token_lifetime() {
            report.warnings.push(format!(
                "Cookie lifetime ({}s) exceeds token lifetime ({}s); sessions end when the token expires",
                self.cookie_lifetime().as_secs(),
                self.token_lifetime().as_secs()
            ));
        }
        if self.cors_origins.is_empty() {
            report
                .warnings
                .push("No CORS origins configured; browsers on other origins will be refused".to_string());
        }

        report
    }

    /// Log warnings and fail on errors
    pub fn ensure_valid(&self) -> WebResult<()> {
        let report = self.validate();
        for warning in &report.warnings {
            warn!("Configuration: {}", warning);
        }
        if report.is_valid() {
            Ok(())
        } else {
            Err(WebError::Config(report.errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
