use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::db::DEFAULT_BUSY_TIMEOUT;

/// Application-level constants
pub const APP_NAME: &str = "MedCustody";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8787";

const ENV_DB_PATH: &str = "MEDCUSTODY_DB_PATH";
const ENV_BIND_ADDR: &str = "MEDCUSTODY_BIND_ADDR";
const ENV_BUSY_TIMEOUT_MS: &str = "MEDCUSTODY_BUSY_TIMEOUT_MS";

/// Get the application data directory
/// ~/MedCustody/ on all platforms, falling back to the working directory
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default ledger database location
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("ledger.db")
}

/// Log filter used when `RUST_LOG` is not set
pub fn default_log_filter() -> &'static str {
    "medcustody_lib=info,medcustody=info,tower_http=warn"
}

/// Runtime settings for the service binary.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub bind_addr: SocketAddr,
    pub busy_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            bind_addr: default_bind_addr(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_DB_PATH).filter(|p| !p.trim().is_empty()) {
            config.db_path = PathBuf::from(path);
        }

        if let Some(addr) = lookup(ENV_BIND_ADDR) {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.bind_addr = parsed,
                Err(e) => tracing::warn!(value = %addr, "Ignoring {ENV_BIND_ADDR}: {e}"),
            }
        }

        if let Some(ms) = lookup(ENV_BUSY_TIMEOUT_MS) {
            match ms.parse::<u64>() {
                Ok(parsed) => config.busy_timeout = Duration::from_millis(parsed),
                Err(e) => tracing::warn!(value = %ms, "Ignoring {ENV_BUSY_TIMEOUT_MS}: {e}"),
            }
        }

        config
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8787))
}
