use crate::domain::models::RrFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log file rotation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Rolling log file output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLogSettings {
    pub dir: PathBuf,
    pub prefix: String,
    pub rotation: LogRotation,
}

impl Default for FileLogSettings {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            prefix: "hr_bridge".to_string(),
            rotation: LogRotation::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directives, e.g. `"info,hr_bridge::bridge=debug"`
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub console: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default)]
    pub show_target: bool,
    /// Off unless present in the settings file
    #[serde(default)]
    pub file: Option<FileLogSettings>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console: true,
            ansi_colors: true,
            show_target: false,
            file: None,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_log_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("HeartRateBridge").join("logs"),
        None => PathBuf::from("logs"),
    }
}

/// Where heart-rate notifications come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorBackend {
    Ble,
    Simulated,
}

impl Default for SensorBackend {
    fn default() -> Self {
        if cfg!(windows) {
            SensorBackend::Ble
        } else {
            SensorBackend::Simulated
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Discovery
    #[serde(default = "default_name_filter")]
    pub name_filter: String,
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
    #[serde(default = "default_discovery_retry_delay_ms")]
    pub discovery_retry_delay_ms: u64,

    // Streaming
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,

    // Output
    #[serde(default = "default_publish_host")]
    pub publish_host: IpAddr,
    #[serde(default = "default_publish_port")]
    pub publish_port: u16,
    #[serde(default)]
    pub rr_format: RrFormat,

    // Sensor source
    #[serde(default)]
    pub sensor_backend: SensorBackend,
    #[serde(default)]
    pub simulated_rr_file: Option<PathBuf>,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            name_filter: default_name_filter(),
            scan_timeout_ms: default_scan_timeout_ms(),
            discovery_retry_delay_ms: default_discovery_retry_delay_ms(),
            receive_timeout_ms: default_receive_timeout_ms(),
            reconnect_backoff_ms: default_reconnect_backoff_ms(),
            publish_host: default_publish_host(),
            publish_port: default_publish_port(),
            rr_format: RrFormat::default(),
            sensor_backend: SensorBackend::default(),
            simulated_rr_file: None,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_name_filter() -> String {
    "polar".to_string()
}
fn default_scan_timeout_ms() -> u64 {
    10_000
}
fn default_discovery_retry_delay_ms() -> u64 {
    5_000
}
fn default_receive_timeout_ms() -> u64 {
    5_000
}
fn default_reconnect_backoff_ms() -> u64 {
    2_000
}
fn default_publish_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_publish_port() -> u16 {
    5055
}

impl Settings {
    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn discovery_retry_delay(&self) -> Duration {
        Duration::from_millis(self.discovery_retry_delay_ms)
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_backoff_ms)
    }

    pub fn publish_addr(&self) -> SocketAddr {
        SocketAddr::new(self.publish_host, self.publish_port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid settings in {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Read-only settings source. Nothing is ever written back.
pub struct SettingsService {
    settings: Settings,
    settings_path: Option<PathBuf>,
}

impl SettingsService {
    /// Load from the per-user config directory, falling back to defaults when
    /// no settings file exists there.
    pub fn new() -> Result<Self, SettingsError> {
        match Self::get_settings_path() {
            Some(path) => Self::from_path(&path),
            None => Ok(Self {
                settings: Settings::default(),
                settings_path: None,
            }),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self {
                settings: Settings::default(),
                settings_path: None,
            });
        }
        let settings = Self::load_from_file(path)?;
        Ok(Self {
            settings,
            settings_path: Some(path.to_path_buf()),
        })
    }

    fn get_settings_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("HeartRateBridge");
        path.push("settings.json");
        Some(path)
    }

    fn load_from_file(path: &Path) -> Result<Settings, SettingsError> {
        let contents = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    /// The file the settings came from, if any
    pub fn source(&self) -> Option<&Path> {
        self.settings_path.as_deref()
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.name_filter, "polar");
        assert_eq!(s.discovery_retry_delay(), Duration::from_secs(5));
        assert_eq!(s.receive_timeout(), Duration::from_secs(5));
        assert_eq!(s.reconnect_backoff(), Duration::from_secs(2));
        assert_eq!(s.publish_addr(), "127.0.0.1:5055".parse::<SocketAddr>().unwrap());
        assert_eq!(s.rr_format, RrFormat::List);
        assert!(s.log_settings.file.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let service = SettingsService::from_path(&dir.path().join("settings.json")).unwrap();
        assert!(service.source().is_none());
        assert_eq!(service.get().publish_port, 5055);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{ "publish_port": 6000, "rr_format": "latest", "sensor_backend": "simulated",
                 "log_settings": { "level": "debug", "file": { "rotation": "hourly" } } }"#,
        )
        .unwrap();

        let service = SettingsService::from_path(&path).unwrap();
        let s = service.get();
        assert_eq!(service.source(), Some(path.as_path()));
        assert_eq!(s.publish_port, 6000);
        assert_eq!(s.rr_format, RrFormat::Latest);
        assert_eq!(s.sensor_backend, SensorBackend::Simulated);
        assert_eq!(s.log_settings.level, "debug");
        assert!(s.log_settings.console);
        let file = s.log_settings.file.as_ref().unwrap();
        assert_eq!(file.rotation, LogRotation::Hourly);
        assert_eq!(file.prefix, "hr_bridge");
        assert_eq!(s.receive_timeout_ms, 5_000);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            SettingsService::from_path(&path),
            Err(SettingsError::Parse { .. })
        ));
    }
}
