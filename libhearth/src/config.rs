//! Configuration management for Hearth

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::live::ReconnectPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the server, e.g. "https://social.example"
    pub url: String,

    /// File holding the session `Cookie` header line
    #[serde(default)]
    pub session_file: Option<String>,

    /// Name of the cookie whose value is echoed in `X-CSRFToken`
    #[serde(default = "default_csrf_cookie")]
    pub csrf_cookie: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    #[serde(default = "default_keepalive")]
    pub keepalive: String,
    #[serde(default = "default_reconnect_initial")]
    pub reconnect_initial: String,
    #[serde(default = "default_reconnect_max")]
    pub reconnect_max: String,
    #[serde(default = "default_reconnect_decay")]
    pub reconnect_decay: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default = "default_stream")]
    pub stream: String,
}

fn default_csrf_cookie() -> String {
    "csrftoken".to_string()
}

fn default_keepalive() -> String {
    "30s".to_string()
}

fn default_reconnect_initial() -> String {
    "1s".to_string()
}

fn default_reconnect_max() -> String {
    "30s".to_string()
}

fn default_reconnect_decay() -> f64 {
    1.5
}

fn default_stream() -> String {
    "public".to_string()
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            keepalive: default_keepalive(),
            reconnect_initial: default_reconnect_initial(),
            reconnect_max: default_reconnect_max(),
            reconnect_decay: default_reconnect_decay(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            stream: default_stream(),
        }
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration pointing at the given server
    pub fn for_server(url: &str) -> Self {
        Self {
            server: ServerConfig {
                url: url.to_string(),
                session_file: None,
                csrf_cookie: default_csrf_cookie(),
            },
            live: LiveConfig::default(),
            defaults: DefaultsConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.server.url.trim().is_empty() {
            return Err(ConfigError::MissingField("server.url".to_string()).into());
        }
        self.live.keepalive_interval()?;
        self.live.reconnect_policy()?;
        Ok(())
    }
}

impl ServerConfig {
    /// Base URL without a trailing slash, with `https://` added when no
    /// scheme is given
    pub fn base_url(&self) -> String {
        let url = self.url.trim().trim_end_matches('/');
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("https://{}", url)
        }
    }

    /// Read the session cookie line from `session_file`, if configured
    pub fn read_session_cookie(&self) -> Result<Option<SecretString>> {
        let Some(file) = &self.session_file else {
            return Ok(None);
        };

        let path = shellexpand::full(file).map_err(|e| ConfigError::InvalidValue {
            field: "server.session_file".to_string(),
            reason: e.to_string(),
        })?;

        let cookie = std::fs::read_to_string(path.as_ref())
            .map_err(ConfigError::ReadError)?
            .trim()
            .to_string();

        if cookie.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "server.session_file".to_string(),
                reason: "session file is empty".to_string(),
            }
            .into());
        }

        Ok(Some(SecretString::from(cookie)))
    }
}

impl LiveConfig {
    pub fn keepalive_interval(&self) -> Result<Duration> {
        parse_duration("live.keepalive", &self.keepalive)
    }

    pub fn reconnect_policy(&self) -> Result<ReconnectPolicy> {
        let initial = parse_duration("live.reconnect_initial", &self.reconnect_initial)?;
        let max = parse_duration("live.reconnect_max", &self.reconnect_max)?;

        if self.reconnect_decay < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "live.reconnect_decay".to_string(),
                reason: format!("must be at least 1.0, got {}", self.reconnect_decay),
            }
            .into());
        }
        if max < initial {
            return Err(ConfigError::InvalidValue {
                field: "live.reconnect_max".to_string(),
                reason: "must not be shorter than live.reconnect_initial".to_string(),
            }
            .into());
        }

        Ok(ReconnectPolicy {
            initial,
            max,
            decay: self.reconnect_decay,
        })
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    let duration = humantime::parse_duration(value).map_err(|e| ConfigError::InvalidValue {
        field: field.to_string(),
        reason: e.to_string(),
    })?;
    if duration.is_zero() {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: "must be greater than zero".to_string(),
        }
        .into());
    }
    Ok(duration)
}

/// Resolve the configuration file path (`$HEARTH_CONFIG`, then the XDG config dir)
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("HEARTH_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("hearth").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HearthError;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config("[server]\nurl = \"https://social.example\"\n");
        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.server.csrf_cookie, "csrftoken");
        assert_eq!(config.defaults.stream, "public");
        assert_eq!(config.live.keepalive_interval().unwrap(), Duration::from_secs(30));

        let policy = config.live.reconnect_policy().unwrap();
        assert_eq!(policy.initial, Duration::from_secs(1));
        assert_eq!(policy.max, Duration::from_secs(30));
        assert_eq!(policy.decay, 1.5);
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"
[server]
url = "social.example/"
csrf_cookie = "csrf"

[live]
keepalive = "10s"
reconnect_initial = "500ms"
reconnect_max = "1m"
reconnect_decay = 2.0

[defaults]
stream = "followed"
"#,
        );
        let config = Config::load_from_path(file.path()).unwrap();

        assert_eq!(config.server.base_url(), "https://social.example");
        assert_eq!(config.server.csrf_cookie, "csrf");
        assert_eq!(config.live.keepalive_interval().unwrap(), Duration::from_secs(10));
        assert_eq!(
            config.live.reconnect_policy().unwrap().initial,
            Duration::from_millis(500)
        );
        assert_eq!(config.defaults.stream, "followed");
    }

    #[test]
    fn test_invalid_duration_rejected() {
        let file = write_config(
            "[server]\nurl = \"https://social.example\"\n[live]\nkeepalive = \"soon\"\n",
        );
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(matches!(
            err,
            HearthError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "live.keepalive"
        ));
    }

    #[test]
    fn test_decay_below_one_rejected() {
        let file = write_config(
            "[server]\nurl = \"https://social.example\"\n[live]\nreconnect_decay = 0.5\n",
        );
        assert!(Config::load_from_path(file.path()).is_err());
    }

    #[test]
    fn test_empty_url_rejected() {
        let file = write_config("[server]\nurl = \"  \"\n");
        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("server.url"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load_from_path(Path::new("/nonexistent/hearth.toml")).unwrap_err();
        assert!(matches!(err, HearthError::Config(ConfigError::ReadError(_))));
    }

    #[test]
    fn test_read_session_cookie() {
        let session = write_config("sessionid=abc; csrftoken=xyz\n");
        let mut config = Config::for_server("https://social.example");
        assert!(config.server.read_session_cookie().unwrap().is_none());

        config.server.session_file = Some(session.path().to_string_lossy().to_string());
        let cookie = config.server.read_session_cookie().unwrap().unwrap();
        assert_eq!(cookie.expose_secret(), "sessionid=abc; csrftoken=xyz");
    }

    #[test]
    fn test_empty_session_file_rejected() {
        let session = write_config("\n");
        let mut config = Config::for_server("https://social.example");
        config.server.session_file = Some(session.path().to_string_lossy().to_string());
        assert!(config.server.read_session_cookie().is_err());
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_from_env() {
        std::env::set_var("HEARTH_CONFIG", "/tmp/hearth-test.toml");
        assert_eq!(
            resolve_config_path().unwrap(),
            PathBuf::from("/tmp/hearth-test.toml")
        );
        std::env::remove_var("HEARTH_CONFIG");
    }
}
