use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use verwatch_core::{HttpSettings, ProxySetting, SourceConfig};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings from {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid settings in {}: `{field}` {reason}", path.display())]
    Invalid {
        path: PathBuf,
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_cache_window")]
    pub cache_window_minutes: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_hours: u64,

    #[serde(default)]
    pub proxy: ProxySetting,

    #[serde(default)]
    pub resources: Vec<ResourceSettings>,
}

/// One monitored plugin or application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSettings {
    pub name: String,
    pub current_version: String,
    pub source: SourceConfig,
    #[serde(default)]
    pub resource_url: Option<String>,
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

fn default_http_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_cache_window() -> u64 {
    1440
}

fn default_poll_interval() -> u64 {
    2
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            http_timeout_secs: default_http_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            cache_window_minutes: default_cache_window(),
            poll_interval_hours: default_poll_interval(),
            proxy: ProxySetting::None,
            resources: Vec::new(),
        }
    }
}

impl AppSettings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self =
            serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate(path)?;
        Ok(settings)
    }

    fn validate(&self, path: &Path) -> Result<(), SettingsError> {
        let zero_field = [
            ("poll_interval_hours", self.poll_interval_hours),
            ("cache_window_minutes", self.cache_window_minutes),
            ("http_timeout_secs", self.http_timeout_secs),
        ]
        .into_iter()
        .find_map(|(field, value)| (value == 0).then_some(field));

        match zero_field {
            Some(field) => Err(SettingsError::Invalid {
                path: path.to_path_buf(),
                field,
                reason: "must be greater than zero",
            }),
            None => Ok(()),
        }
    }

    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.http_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            ..HttpSettings::default()
        }
    }

    pub fn cache_window(&self) -> Duration {
        Duration::from_secs(self.cache_window_minutes.saturating_mul(60))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_hours.saturating_mul(60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use verwatch_core::{ProxySetting, SourceConfig};

    use super::{AppSettings, SettingsError};

    #[test]
    fn defaults_match_engine_constants() {
        let settings = AppSettings::default();

        assert!(!settings.debug_logging);
        assert_eq!(settings.max_log_size_bytes, 5 * 1024 * 1024);
        assert_eq!(settings.cache_window(), verwatch_core::DEFAULT_CACHE_WINDOW);
        assert_eq!(settings.poll_interval(), verwatch_core::DEFAULT_POLL_INTERVAL);
        assert_eq!(settings.http_settings().timeout, Duration::from_secs(10));
        assert_eq!(settings.http_settings().connect_timeout, Duration::from_secs(5));
        assert_eq!(settings.proxy, ProxySetting::None);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");

        let settings = AppSettings::load_from_path(&temp_dir.path().join("settings.json"))
            .expect("missing settings should fall back to defaults");

        assert!(settings.resources.is_empty());
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("settings.json");
        let value = json!({
            "cache_window_minutes": 30,
            "proxy": { "type": "socks5", "host": "127.0.0.1", "port": 1080 },
            "resources": [
                {
                    "name": "ViaVersion",
                    "current_version": "5.2.1",
                    "source": { "type": "modrinth", "slug": "viaversion", "loader": "paper" }
                },
                {
                    "name": "LuckPerms",
                    "current_version": "5.4.0",
                    "source": { "type": "spigot", "resource_id": "28140" },
                    "resource_url": "https://luckperms.net/download"
                }
            ]
        });
        std::fs::write(&path, value.to_string()).expect("settings file should be written");

        let settings = AppSettings::load_from_path(&path).expect("settings should load");

        assert_eq!(settings.cache_window(), Duration::from_secs(30 * 60));
        assert_eq!(settings.poll_interval_hours, 2);
        assert_eq!(
            settings.proxy,
            ProxySetting::Socks5 {
                host: "127.0.0.1".to_string(),
                port: 1080,
            }
        );
        assert_eq!(settings.resources.len(), 2);
        assert_eq!(
            settings.resources[0].source,
            SourceConfig::Modrinth {
                slug: "viaversion".to_string(),
                loader: "paper".to_string(),
            }
        );
        assert_eq!(
            settings.resources[1].resource_url.as_deref(),
            Some("https://luckperms.net/download")
        );
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, "{ \"resources\": [ { \"name\": 1 } ] }")
            .expect("settings file should be written");

        let error = AppSettings::load_from_path(&path).expect_err("bad settings should fail");

        assert!(matches!(error, SettingsError::Parse { .. }));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let temp_dir = tempfile::tempdir().expect("temporary directory should be created");
        let path = temp_dir.path().join("settings.json");

        std::fs::write(&path, json!({ "poll_interval_hours": 0 }).to_string())
            .expect("settings file should be written");
        let error = AppSettings::load_from_path(&path).expect_err("zero poll interval");
        assert!(matches!(
            error,
            SettingsError::Invalid {
                field: "poll_interval_hours",
                ..
            }
        ));

        std::fs::write(&path, json!({ "cache_window_minutes": 0 }).to_string())
            .expect("settings file should be written");
        let error = AppSettings::load_from_path(&path).expect_err("zero cache window");
        assert!(error.to_string().ends_with("`cache_window_minutes` must be greater than zero"));
    }
}
