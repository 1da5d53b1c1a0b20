//! Configuration for the fhome CLI.
//!
//! Settings are layered with figment, lowest priority first: built-in
//! defaults, the system-wide file, the per-user file, then `FHOME_*`
//! environment variables. The CLI applies its own flag overrides on top
//! before calling [`Settings::connect_config`] and [`Settings::credentials`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use fhome_api::connection::{HANDSHAKE_TIMEOUT, SERVICE_URL};
use fhome_api::{ConnectConfig, Credentials};

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/fhome/config.toml";

/// Prefix of every environment variable the loader reads.
pub const ENV_PREFIX: &str = "FHOME_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{field} is not configured (set {env} or add `{field}` to the config file)")]
    MissingField {
        field: &'static str,
        env: &'static str,
    },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Merged configuration.
#[derive(Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Account email.
    pub email: Option<String>,

    /// Account password (plaintext; prefer `FHOME_CLOUD_PASSWORD`).
    pub cloud_password: Option<String>,

    /// Resource password (plaintext; prefer `FHOME_RESOURCE_PASSWORD`).
    pub resource_password: Option<String>,

    /// Service endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,

    #[serde(default)]
    pub defaults: Defaults,
}

/// Output preferences the CLI falls back to when no flag is given.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            email: None,
            cloud_password: None,
            resource_password: None,
            endpoint: default_endpoint(),
            handshake_timeout_secs: default_handshake_timeout(),
            defaults: Defaults::default(),
        }
    }
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("Settings")
            .field("email", &self.email)
            .field("cloud_password", &redacted(&self.cloud_password))
            .field("resource_password", &redacted(&self.resource_password))
            .field("endpoint", &self.endpoint)
            .field("handshake_timeout_secs", &self.handshake_timeout_secs)
            .field("defaults", &self.defaults)
            .finish()
    }
}

fn default_endpoint() -> String {
    SERVICE_URL.into()
}
fn default_handshake_timeout() -> u64 {
    HANDSHAKE_TIMEOUT.as_secs()
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

// ── Config file paths ───────────────────────────────────────────────

/// Resolve the per-user config file via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("cloud", "fhome", "fhome").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("fhome");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Every file the loader reads, lowest priority first.
pub fn config_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(SYSTEM_CONFIG_PATH), config_path()]
}

// ── Loading ─────────────────────────────────────────────────────────

/// Defaults merged with `files` in order. Missing files are skipped.
pub fn file_figment<P: AsRef<Path>>(files: &[P]) -> Figment {
    files.iter().fold(
        Figment::new().merge(Serialized::defaults(Settings::default())),
        |figment, path| figment.merge(Toml::file(path.as_ref())),
    )
}

/// The full layering: defaults, system file, user file, environment.
pub fn figment() -> Figment {
    file_figment(&config_paths()).merge(Env::prefixed(ENV_PREFIX))
}

/// Load settings from every layer.
pub fn load_settings() -> Result<Settings, ConfigError> {
    Settings::from_figment(&figment())
}

impl Settings {
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        Ok(figment.extract()?)
    }

    /// Dial settings for the client.
    pub fn connect_config(&self) -> Result<ConnectConfig, ConfigError> {
        let endpoint = Url::parse(&self.endpoint).map_err(|e| ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("{}: {e}", self.endpoint),
        })?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(ConfigError::Validation {
                field: "endpoint".into(),
                reason: format!("expected a ws:// or wss:// URL, got {}", self.endpoint),
            });
        }
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "handshake_timeout_secs".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        Ok(ConnectConfig::new(
            endpoint,
            Duration::from_secs(self.handshake_timeout_secs),
        ))
    }

    /// Login credentials. Each missing piece names the variable to set.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        let email = required(self.email.as_ref(), "email", "FHOME_EMAIL")?;
        let cloud_password = required(
            self.cloud_password.as_ref(),
            "cloud_password",
            "FHOME_CLOUD_PASSWORD",
        )?;
        let resource_password = required(
            self.resource_password.as_ref(),
            "resource_password",
            "FHOME_RESOURCE_PASSWORD",
        )?;

        Ok(Credentials {
            email: email.clone(),
            cloud_password: SecretString::from(cloud_password.clone()),
            resource_password: SecretString::from(resource_password.clone()),
        })
    }
}

fn required<'a>(
    value: Option<&'a String>,
    field: &'static str,
    env: &'static str,
) -> Result<&'a String, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingField { field, env })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let settings = Settings::from_figment(&file_figment(&[missing])).unwrap();

        assert_eq!(settings.endpoint, SERVICE_URL);
        assert_eq!(settings.handshake_timeout_secs, 5);
        assert_eq!(settings.defaults.output, "table");
        assert!(settings.email.is_none());
    }

    #[test]
    fn user_file_overrides_system_file() {
        let dir = tempfile::tempdir().unwrap();
        let system = write(
            &dir,
            "system.toml",
            r#"
            email = "system@example.com"
            handshake_timeout_secs = 10

            [defaults]
            output = "json"
            "#,
        );
        let user = write(&dir, "user.toml", r#"email = "me@example.com""#);

        let settings = Settings::from_figment(&file_figment(&[system, user])).unwrap();
        assert_eq!(settings.email.as_deref(), Some("me@example.com"));
        assert_eq!(settings.handshake_timeout_secs, 10);
        assert_eq!(settings.defaults.output, "json");
        assert_eq!(settings.defaults.color, "auto");
    }

    #[test]
    fn credentials_are_complete_or_name_the_variable() {
        let mut settings = Settings {
            email: Some("a@b.com".into()),
            cloud_password: Some("pw".into()),
            ..Settings::default()
        };

        let err = settings.credentials().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                env: "FHOME_RESOURCE_PASSWORD",
                ..
            }
        ));
        assert!(err.to_string().contains("FHOME_RESOURCE_PASSWORD"));

        settings.resource_password = Some("rpw".into());
        let creds = settings.credentials().unwrap();
        assert_eq!(creds.email, "a@b.com");
        assert_eq!(creds.cloud_password.expose_secret(), "pw");
        assert_eq!(creds.resource_password.expose_secret(), "rpw");
    }

    #[test]
    fn blank_email_counts_as_missing() {
        let settings = Settings {
            email: Some("  ".into()),
            ..Settings::default()
        };
        assert!(matches!(
            settings.credentials(),
            Err(ConfigError::MissingField { field: "email", .. })
        ));
    }

    #[test]
    fn connect_config_validates_endpoint() {
        let settings = Settings {
            endpoint: "ws://127.0.0.1:9000/webapp-interface".into(),
            ..Settings::default()
        };
        let config = settings.connect_config().unwrap();
        assert_eq!(
            config.endpoint.as_str(),
            "ws://127.0.0.1:9000/webapp-interface/"
        );
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));

        let settings = Settings {
            endpoint: "https://fhome.cloud/".into(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.connect_config(),
            Err(ConfigError::Validation { .. })
        ));

        let settings = Settings {
            endpoint: "not a url".into(),
            ..Settings::default()
        };
        assert!(settings.connect_config().is_err());
    }

    #[test]
    fn debug_output_redacts_passwords() {
        let settings = Settings {
            cloud_password: Some("hunter2".into()),
            ..Settings::default()
        };
        let text = format!("{settings:?}");
        assert!(!text.contains("hunter2"));
        assert!(text.contains("[REDACTED]"));
    }
}
