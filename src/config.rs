use crate::services::rate_limiter::{DEFAULT_COOLDOWN_SECS, DEFAULT_DAILY_LIMIT, MAX_COOLDOWN_SECS};
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LOG_FILE: &str = "/tmp/logs.json";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(String),

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: String, value: String },

    #[error("at least one relay (SMTP1_USER / SMTP1_PASS) must be configured")]
    NoRelay,
}

/// Host, port, security flag and sign-in for one outbound relay.
#[derive(Clone)]
pub struct RelayCredential {
    pub label: String,
    pub host: String,
    pub port: u16,
    /// Implicit TLS; otherwise STARTTLS is required.
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub accept_invalid_certs: bool,
}

impl std::fmt::Debug for RelayCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayCredential")
            .field("label", &self.label)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"***")
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub log_file: PathBuf,
    pub daily_limit: u32,
    pub cooldown_secs: u64,
    pub static_dir: PathBuf,
    pub from_name: String,
    pub environment: String,
    pub relay_max_attempts: Option<usize>,
    pub relays: Vec<RelayCredential>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Parses configuration from any key lookup, usually the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;
        let log_file: PathBuf = get("LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.into()).into();
        let daily_limit = parse_or(&get, "DAILY_LIMIT", DEFAULT_DAILY_LIMIT)?;
        let cooldown_secs = parse_or(&get, "COOLDOWN_SECONDS", DEFAULT_COOLDOWN_SECS)?;
        if cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(invalid("COOLDOWN_SECONDS", cooldown_secs));
        }
        let static_dir: PathBuf = get("STATIC_DIR").unwrap_or_else(|| "static".into()).into();
        let from_name = get("MAIL_FROM_NAME").unwrap_or_else(|| "Send Mail".into());
        let environment = get("APP_ENV").unwrap_or_else(|| "development".into());
        let relay_max_attempts = match get("RELAY_MAX_ATTEMPTS") {
            Some(v) => match parse_value::<usize>("RELAY_MAX_ATTEMPTS", &v)? {
                0 => return Err(invalid("RELAY_MAX_ATTEMPTS", &v)),
                n => Some(n),
            },
            None => None,
        };

        let mut relays = Vec::new();
        for n in 1.. {
            let key = |field: &str| format!("SMTP{n}_{field}");
            let host = get(&key("HOST"));
            let user = get(&key("USER"));
            if host.is_none() && user.is_none() {
                break;
            }
            let username = user.ok_or_else(|| ConfigError::Missing(key("USER")))?;
            let password = get(&key("PASS")).ok_or_else(|| ConfigError::Missing(key("PASS")))?;
            let port: u16 = parse_or(&get, &key("PORT"), DEFAULT_SMTP_PORT)?;
            let secure = parse_or(&get, &key("SECURE"), port == 465)?;
            let accept_invalid_certs = parse_or(&get, &key("ACCEPT_INVALID_CERTS"), true)?;
            relays.push(RelayCredential {
                label: get(&key("LABEL")).unwrap_or_else(|| format!("SMTP {n}")),
                host: host.unwrap_or_else(|| DEFAULT_SMTP_HOST.into()),
                port,
                secure,
                username,
                password,
                accept_invalid_certs,
            });
        }
        if relays.is_empty() {
            return Err(ConfigError::NoRelay);
        }

        Ok(Config {
            port,
            log_file,
            daily_limit,
            cooldown_secs,
            static_dir,
            from_name,
            environment,
            relay_max_attempts,
            relays,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: ParseEnv,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}

fn parse_value<T: ParseEnv>(key: &str, value: &str) -> Result<T, ConfigError> {
    T::parse_env(value).ok_or_else(|| invalid(key, value))
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var: key.to_string(),
        value: value.to_string(),
    }
}

trait ParseEnv: Sized {
    fn parse_env(raw: &str) -> Option<Self>;
}

macro_rules! parse_env_from_str {
    ($($t:ty),*) => {
        $(impl ParseEnv for $t {
            fn parse_env(raw: &str) -> Option<Self> {
                raw.parse().ok()
            }
        })*
    };
}

parse_env_from_str!(u16, u32, u64, usize);

impl ParseEnv for bool {
    fn parse_env(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}
