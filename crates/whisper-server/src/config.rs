use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Accepted token lifetimes. Ten years keeps `exp` far from overflow.
const TOKEN_DAYS: std::ops::RangeInclusive<i64> = 1..=3650;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub token_ttl_days: i64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("WHISPER_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("WHISPER_JWT_SECRET is unset or still a placeholder");
        }

        let db_path: PathBuf = get("WHISPER_DB_PATH").unwrap_or_else(|| "whisper-wall.db".into()).into();
        let host = get("WHISPER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("WHISPER_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("WHISPER_PORT must be a port number")?;
        let token_ttl_days: i64 = get("WHISPER_TOKEN_DAYS")
            .unwrap_or_else(|| "30".into())
            .parse()
            .context("WHISPER_TOKEN_DAYS must be a whole number of days")?;
        if !TOKEN_DAYS.contains(&token_ttl_days) {
            bail!(
                "WHISPER_TOKEN_DAYS must be between {} and {}, got {}",
                TOKEN_DAYS.start(),
                TOKEN_DAYS.end(),
                token_ttl_days
            );
        }

        let addr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            jwt_secret,
            db_path,
            addr,
            token_ttl_days,
        })
    }
}
