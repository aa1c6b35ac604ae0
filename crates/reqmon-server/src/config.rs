//! Server configuration loading from file and environment variables.

use reqmon_ingest::DEFAULT_EXCLUDED_PREFIXES;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Access control for the `/api` routes.
    #[serde(default)]
    pub admin: AdminConfig,

    /// Which requests the capture gate turns away.
    #[serde(default)]
    pub capture: CaptureConfig,

    /// What happens to the log on shutdown.
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// How long a connection waits on a locked database, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "reqmon_log=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Admin access configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Static bearer token required on every `/api` route. Unset or blank
    /// leaves the routes open, for deployments behind their own auth proxy.
    #[serde(default)]
    pub token: Option<String>,
}

/// Capture gate configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Path prefixes that are never recorded.
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,
}

/// Retention configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RetentionConfig {
    /// Empty the log when the server shuts down.
    #[serde(default)]
    pub clear_on_disable: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "reqmon.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_excluded_prefixes() -> Vec<String> {
    DEFAULT_EXCLUDED_PREFIXES
        .iter()
        .map(|p| (*p).to_string())
        .collect()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: default_excluded_prefixes(),
        }
    }
}

impl AdminConfig {
    /// The configured token, ignoring blank values.
    pub fn token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `REQMON_HOST` overrides `server.host`
/// - `REQMON_PORT` overrides `server.port`
/// - `REQMON_DB_PATH` overrides `database.path`
/// - `REQMON_LOG_LEVEL` overrides `logging.level`
/// - `REQMON_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `REQMON_ADMIN_TOKEN` overrides `admin.token`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Applies `REQMON_*` overrides read through `lookup`. Unparseable host or
/// port values are ignored.
fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(host) = lookup("REQMON_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = lookup("REQMON_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(db_path) = lookup("REQMON_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = lookup("REQMON_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = lookup("REQMON_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Some(token) = lookup("REQMON_ADMIN_TOKEN") {
        config.admin.token = Some(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn defaults_without_a_file() {
        let config = load_config(None).expect("defaults should load");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.path, "reqmon.db");
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert!(config.capture.excluded_prefixes.contains(&"/wp-admin".to_string()));
        assert!(!config.retention.clear_on_disable);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).expect("missing file is not an error");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn parses_every_section() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[server]
host = "0.0.0.0"
port = 8080

[database]
path = "/var/lib/reqmon/log.db"
pool_max_size = 4

[logging]
level = "reqmon_log=debug,info"
json = true

[admin]
token = "s3cret"

[capture]
excluded_prefixes = ["/internal"]

[retention]
clear_on_disable = true
"#
        )
        .unwrap();

        let config = load_config(file.path().to_str()).expect("config should parse");
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "/var/lib/reqmon/log.db");
        assert_eq!(config.database.pool_max_size, 4);
        assert_eq!(config.database.busy_timeout_ms, 5_000);
        assert!(config.logging.json);
        assert_eq!(config.admin.token(), Some("s3cret"));
        assert_eq!(config.capture.excluded_prefixes, vec!["/internal".to_string()]);
        assert!(config.retention.clear_on_disable);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[server]\nport = \"not a number\"\n").unwrap();
        let err = load_config(file.path().to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn environment_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("REQMON_HOST", "::1"),
            ("REQMON_PORT", "9090"),
            ("REQMON_DB_PATH", "override.db"),
            ("REQMON_LOG_JSON", "1"),
            ("REQMON_ADMIN_TOKEN", "from-env"),
        ]);
        let mut config = Config::default();
        apply_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.host.to_string(), "::1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.path, "override.db");
        assert!(config.logging.json);
        assert_eq!(config.admin.token(), Some("from-env"));
    }

    #[test]
    fn bad_port_override_is_ignored() {
        let mut config = Config::default();
        apply_overrides(&mut config, |key| {
            (key == "REQMON_PORT").then(|| "http".to_string())
        });
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn blank_admin_token_is_no_token() {
        let admin = AdminConfig {
            token: Some("   ".to_string()),
        };
        assert_eq!(admin.token(), None);
    }
}
