use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Aerocare";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_SESSION_TTL_SECS: u64 = 12 * 60 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "aerocare=info,tower_http=info"
}

/// Default data directory: ~/Aerocare/ (falls back to ./Aerocare without a home).
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub session_ttl: Duration,
    pub max_upload_bytes: usize,
    /// Allowed browser origin; `*` allows any. Unset means no cross-origin access.
    pub cors_origin: Option<String>,
    /// Bootstrap administrator, created at startup if missing.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse_or(get("AEROCARE_BIND"), "AEROCARE_BIND", DEFAULT_BIND.parse().ok())?;
        let session_ttl_secs: u64 = parse_or(
            get("AEROCARE_SESSION_TTL_SECS"),
            "AEROCARE_SESSION_TTL_SECS",
            Some(DEFAULT_SESSION_TTL_SECS),
        )?;
        if session_ttl_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "AEROCARE_SESSION_TTL_SECS",
                value: "0".into(),
            });
        }
        let max_upload_bytes = parse_or(
            get("AEROCARE_MAX_UPLOAD_BYTES"),
            "AEROCARE_MAX_UPLOAD_BYTES",
            Some(DEFAULT_MAX_UPLOAD_BYTES),
        )?;

        Ok(Self {
            bind_addr,
            data_dir: get("AEROCARE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            session_ttl: Duration::from_secs(session_ttl_secs),
            max_upload_bytes,
            cors_origin: get("AEROCARE_CORS_ORIGIN"),
            admin_email: get("AEROCARE_ADMIN_EMAIL"),
            admin_password: get("AEROCARE_ADMIN_PASSWORD"),
        })
    }

    /// Defaults rooted at `data_dir`, for tests and embedding.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: data_dir.to_path_buf(),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origin: None,
            admin_email: None,
            admin_password: None,
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("aerocare.db")
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => default.ok_or(ConfigError::Invalid {
            key,
            value: String::new(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_addr.to_string(), DEFAULT_BIND);
        assert_eq!(config.session_ttl, Duration::from_secs(DEFAULT_SESSION_TTL_SECS));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.data_dir.ends_with("Aerocare"));
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("AEROCARE_BIND", "0.0.0.0:9000"),
            ("AEROCARE_DATA_DIR", "/srv/aerocare"),
            ("AEROCARE_SESSION_TTL_SECS", "60"),
            ("AEROCARE_CORS_ORIGIN", "https://portal.example.org"),
            ("AEROCARE_ADMIN_EMAIL", " admin@example.org "),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.db_path(), PathBuf::from("/srv/aerocare/aerocare.db"));
        assert_eq!(config.upload_dir(), PathBuf::from("/srv/aerocare/uploads"));
        assert_eq!(config.session_ttl, Duration::from_secs(60));
        assert_eq!(config.cors_origin.as_deref(), Some("https://portal.example.org"));
        assert_eq!(config.admin_email.as_deref(), Some("admin@example.org"));
    }

    #[test]
    fn rejects_garbage() {
        let err = AppConfig::from_lookup(lookup(&[("AEROCARE_BIND", "not-an-addr")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid { key: "AEROCARE_BIND", value: "not-an-addr".into() }
        );
        assert!(AppConfig::from_lookup(lookup(&[("AEROCARE_SESSION_TTL_SECS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("AEROCARE_MAX_UPLOAD_BYTES", "-1")])).is_err());
    }

    #[test]
    fn app_name_is_aerocare() {
        assert_eq!(APP_NAME, "Aerocare");
    }
}
