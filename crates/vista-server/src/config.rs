use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;

/// JWT secrets that ship in sample configs and must not reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me-to-a-random-string"];

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub story_purge_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset keys fall back to defaults; set but
    /// unparsable numbers are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = match lookup("VISTA_PORT") {
            Some(v) => v.parse().with_context(|| format!("VISTA_PORT is not a port: {}", v))?,
            None => 3000,
        };
        let story_purge_secs = match lookup("VISTA_STORY_PURGE_SECS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("VISTA_STORY_PURGE_SECS is not a number: {}", v))?,
            None => 3600,
        };
        anyhow::ensure!(story_purge_secs > 0, "VISTA_STORY_PURGE_SECS must be positive");

        Ok(Self {
            jwt_secret: lookup("VISTA_JWT_SECRET").unwrap_or_else(|| "dev-secret-change-me".into()),
            db_path: lookup("VISTA_DB_PATH").unwrap_or_else(|| "vista.db".into()).into(),
            host: lookup("VISTA_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            story_purge_secs,
        })
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        self.jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}
