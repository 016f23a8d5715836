use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use rand::Rng;
use tracing::{info, warn};

pub struct Config {
    pub bind: SocketAddr,
    /// No database means an in-process store.
    pub database_url: Option<String>,
    pub secret_key: Vec<u8>,
    pub media_root: PathBuf,
    pub media_url: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secret_key = match lookup("PICPOLL_SECRET_KEY") {
            Some(v) if !v.is_empty() => v.into_bytes(),
            _ => {
                warn!("PICPOLL_SECRET_KEY not set; vote ledgers will not survive a restart");
                rand::thread_rng().gen::<[u8; 32]>().to_vec()
            }
        };

        let max_upload_mb: usize = try_load(&lookup, "PICPOLL_MAX_UPLOAD_MB", "10")?;

        Ok(Self {
            bind: try_load(&lookup, "PICPOLL_BIND", "0.0.0.0:8000")?,
            database_url: lookup("PICPOLL_DATABASE_URL").filter(|v| !v.is_empty()),
            secret_key,
            media_root: try_load(&lookup, "PICPOLL_MEDIA_ROOT", "media")?,
            media_url: try_load(&lookup, "PICPOLL_MEDIA_URL", "/media/")?,
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }
}

fn try_load<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse::<T>()
        .map_err(|e| anyhow::anyhow!("{}", e))
        .with_context(|| format!("Invalid {} value '{}'", key, value))
}
