use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Result, anyhow, bail};
use strum::{AsRefStr, EnumString};
use tracing::{info, warn};

use crate::crypto::INSECURE_DEV_SECRET;

pub const DATA_DIR_VAR: &str = "GUESTBOOK_DATA_DIR";
pub const PORT_VAR: &str = "GUESTBOOK_PORT";
pub const ENV_VAR: &str = "GUESTBOOK_ENV";
pub const CREATE_TIMEOUT_VAR: &str = "GUESTBOOK_CREATE_TIMEOUT_MS";
pub const SECRET_VARS: [&str; 2] = ["ENCRYPTION_KEY", "encryption_key"];
pub const SECRET_FILE: &str = "/run/secrets/ENCRYPTION_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub port: u16,
    pub environment: Environment,
    pub create_timeout: Duration,
    pub encryption_key: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let timeout_ms: u64 = try_load(CREATE_TIMEOUT_VAR, "8000")?;

        Ok(Self {
            data_dir: try_load(DATA_DIR_VAR, ".guestbook")?,
            port: try_load(PORT_VAR, "3000")?,
            environment: try_load(ENV_VAR, "development")?,
            create_timeout: Duration::from_millis(timeout_ms),
            encryption_key: read_secret(),
        })
    }

    /// The secret the field codec derives its key from.
    ///
    /// Production refuses to start without one; development falls back to a
    /// well-known key that offers no protection at all.
    pub fn encryption_secret(&self) -> Result<&str> {
        match (&self.encryption_key, self.environment) {
            (Some(key), _) => Ok(key.as_str()),
            (None, Environment::Production) => bail!(
                "No encryption key configured. Set {} or provide {SECRET_FILE}",
                SECRET_VARS[0]
            ),
            (None, Environment::Development) => {
                warn!("No encryption key configured, using the insecure development key");
                Ok(INSECURE_DEV_SECRET)
            }
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("data_dir", &self.data_dir)
            .field("port", &self.port)
            .field("environment", &self.environment)
            .field("create_timeout", &self.create_timeout)
            .field("encryption_key", &self.encryption_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value {value:?}: {e}"))
}

fn read_secret() -> Option<String> {
    if let Some(key) = SECRET_VARS.iter().find_map(|name| var(name)) {
        return Some(key);
    }

    read_to_string(SECRET_FILE)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
