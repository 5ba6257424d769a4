use anyhow::{Context, Result, anyhow};
use std::{fmt, path::PathBuf};

fn env_flag(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(value) => match value.as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(anyhow!("{name} must be 'true' or 'false', got '{other}'")),
        },
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub config_path: Option<PathBuf>,
    /// Key anonymous callers by `X-Forwarded-For`/`X-Real-IP` instead of the
    /// socket peer. Only safe behind a proxy that overwrites those headers.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            config_path: None,
            trust_forwarded_for: false,
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub jwt_secret: String,
    pub is_dev: bool,
    pub enable_file_log: bool,
    pub rate_limit: RateLimitSettings,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("is_dev", &self.is_dev)
            .field("enable_file_log", &self.enable_file_log)
            .field("rate_limit", &self.rate_limit)
            .finish()
    }
}

impl Config {
    pub fn init() -> Result<Self> {
        let jwt_secret =
            std::env::var("JWT_SECRET").context("Missing environment variable: JWT_SECRET")?;
        let port_str = std::env::var("PORT").context("Missing environment variable: PORT")?;

        let port = port_str
            .parse::<u16>()
            .context("PORT must be a valid u16 integer")?;

        let is_dev = env_flag("DEV_MODE", false)?;
        let enable_file_log = env_flag("ENABLE_FILE_LOG", false)?;

        let rate_limit = RateLimitSettings {
            enabled: env_flag("RATE_LIMIT_ENABLED", true)?,
            config_path: std::env::var("RATE_LIMIT_CONFIG")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            trust_forwarded_for: env_flag("TRUST_FORWARDED_FOR", false)?,
        };

        Ok(Self {
            port,
            jwt_secret,
            is_dev,
            enable_file_log,
            rate_limit,
        })
    }
}
