// Configuration loaded from environment variables.
//
// Required values fail startup with a named error instead of a default.
// Duration values use Go-style strings ("15m", "168h") because that is
// the format the deployment environment already carries.

use std::env;
use std::time::Duration;

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl Environment {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "test" | "testing" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value}")]
    InvalidVar { var: &'static str, value: String },
}

/// All configuration for the server, immutable after startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub app_port: u16,
    pub environment: Environment,

    /// PEM-encoded RSA keys for JWT signing and verification.
    pub jwt_private_key: String,
    pub jwt_public_key: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Keyed-hash secret for deterministic token lookup hashes.
    pub token_hash_key: String,

    pub postgres: PostgresConfig,
    pub redis: RedisConfig,

    pub rate_limit_requests_per_minute: u32,
    pub ip_whitelist: Vec<String>,
    pub ip_blacklist: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl PostgresConfig {
    pub fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: u32,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://:{}@{}:{}/{}", self.password, self.host, self.port, self.db)
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let app_port = get_parsed("APP_PORT", 8080)?;
        let environment = Environment::parse(&get_or("ENVIRONMENT", "development"));

        let jwt_private_key = must_get("JWT_PRIVATE_KEY")?;
        let jwt_public_key = must_get("JWT_PUBLIC_KEY")?;
        let token_hash_key = must_get("TOKEN_HASH_KEY")?;

        let access_token_ttl = get_duration("JWT_ACCESS_EXPIRY", Duration::from_secs(15 * 60))?;
        let refresh_token_ttl =
            get_duration("JWT_REFRESH_EXPIRY", Duration::from_secs(168 * 3600))?;

        let postgres = PostgresConfig {
            host: get_or("POSTGRES_HOST", "localhost"),
            port: get_parsed("POSTGRES_PORT", 5432)?,
            database: get_or("POSTGRES_DB", "oauth_server"),
            user: get_or("POSTGRES_USER", "postgres"),
            password: must_get("POSTGRES_PASSWORD")?,
        };

        let redis = RedisConfig {
            host: get_or("REDIS_HOST", "localhost"),
            port: get_parsed("REDIS_PORT", 6379)?,
            password: get_or("REDIS_PASSWORD", ""),
            db: get_parsed("REDIS_DB", 0)?,
        };

        Ok(Self {
            app_port,
            environment,
            jwt_private_key,
            jwt_public_key,
            access_token_ttl,
            refresh_token_ttl,
            token_hash_key,
            postgres,
            redis,
            rate_limit_requests_per_minute: get_parsed("RATE_LIMIT_REQUESTS_PER_MINUTE", 60)?,
            ip_whitelist: parse_ip_list(&get_or("IP_WHITELIST", "")),
            ip_blacklist: parse_ip_list(&get_or("IP_BLACKLIST", "")),
        })
    }
}

fn get_or(key: &str, default: &str) -> String {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn must_get(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(key)),
    }
}

fn get_parsed<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => v
            .parse()
            .map_err(|_| ConfigError::InvalidVar { var: key, value: v }),
        _ => Ok(default),
    }
}

fn get_duration(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(v) if !v.is_empty() => {
            parse_duration(&v).ok_or(ConfigError::InvalidVar { var: key, value: v })
        }
        _ => Ok(default),
    }
}

/// Parse a Go-style duration string: a sequence of `<number><unit>`
/// segments where unit is one of `h`, `m`, `s`, `ms` (e.g. "15m",
/// "1h30m", "168h").
pub fn parse_duration(s: &str) -> Option<Duration> {
    if s.is_empty() {
        return None;
    }
    let mut total = Duration::ZERO;
    let mut num = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            num.push(c);
            continue;
        }
        let value: u64 = num.parse().ok()?;
        num.clear();
        let unit_ms: u64 = match c {
            'h' => 3_600_000,
            's' => 1_000,
            'm' => {
                if chars.peek() == Some(&'s') {
                    chars.next();
                    1
                } else {
                    60_000
                }
            }
            _ => return None,
        };
        total += Duration::from_millis(value.checked_mul(unit_ms)?);
    }

    if num.is_empty() {
        Some(total)
    } else {
        // Trailing digits without a unit
        None
    }
}

fn parse_ip_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}
