use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RollcallError};

pub const DEFAULT_VENDOR_BASE_URI: &str = "https://127.0.0.1:443";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 60;
pub const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_VENDOR_TIMEOUT_MS: u64 = 30_000;

/// Top-level config (rollcall.toml + ROLLCALL_* env overrides).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollcallConfig {
    #[serde(default)]
    pub integration: IntegrationConfig,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub school: SchoolConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub csv: CsvConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// `"attendanceForwarder"` or `"csvUploader"`. Unknown values fall back
    /// to the forwarder when activated.
    #[serde(default = "default_integration")]
    pub active: String,
    /// Collector URL every delivery is POSTed to. Empty means not configured.
    #[serde(default)]
    pub endpoint: String,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            active: default_integration(),
            endpoint: String::new(),
        }
    }
}

/// Persisted schedule definition. Validation happens in the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSettings {
    /// Cron expression, used only when `daily_run_times` is empty.
    #[serde(default)]
    pub cron: String,
    /// `HH:MM` (24h) local run times.
    #[serde(default = "default_run_times")]
    pub daily_run_times: Vec<String>,
    /// Run the job once right after (re)activation.
    #[serde(default = "bool_true")]
    pub run_on_start: bool,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            cron: String::new(),
            daily_run_times: default_run_times(),
            run_on_start: true,
        }
    }
}

/// HikCentral OpenAPI (Artemis gateway) credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorConfig {
    #[serde(default = "default_vendor_base_uri")]
    pub base_uri: String,
    #[serde(default)]
    pub app_key: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_vendor_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            base_uri: default_vendor_base_uri(),
            app_key: String::new(),
            app_secret: String::new(),
            user_id: default_user_id(),
            timeout_ms: DEFAULT_VENDOR_TIMEOUT_MS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchoolConfig {
    #[serde(default = "default_school_id")]
    pub id: String,
    #[serde(default)]
    pub domain: String,
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            id: default_school_id(),
            domain: String::new(),
        }
    }
}

/// Retry and timeout settings shared by both delivery modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_seconds: u64,
    #[serde(default = "default_delivery_timeout_ms")]
    pub timeout_ms: u64,
    /// When false, a 4xx answer from the collector stops the retry loop.
    #[serde(default = "bool_true")]
    pub retry_client_errors: bool,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_seconds: DEFAULT_RETRY_DELAY_SECS,
            timeout_ms: DEFAULT_DELIVERY_TIMEOUT_MS,
            retry_client_errors: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvConfig {
    /// Directory the access-control software exports daily CSV files into.
    #[serde(default)]
    pub upload_dir: String,
}

fn bool_true() -> bool {
    true
}
fn default_integration() -> String {
    "attendanceForwarder".to_string()
}
fn default_run_times() -> Vec<String> {
    vec!["09:00".to_string(), "18:00".to_string()]
}
fn default_vendor_base_uri() -> String {
    DEFAULT_VENDOR_BASE_URI.to_string()
}
fn default_user_id() -> String {
    "admin".to_string()
}
fn default_vendor_timeout_ms() -> u64 {
    DEFAULT_VENDOR_TIMEOUT_MS
}
fn default_school_id() -> String {
    "0".to_string()
}
fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_retry_delay_secs() -> u64 {
    DEFAULT_RETRY_DELAY_SECS
}
fn default_delivery_timeout_ms() -> u64 {
    DEFAULT_DELIVERY_TIMEOUT_MS
}

/// Source of the live configuration record.
///
/// Everything that needs configuration calls [`load`](ConfigProvider::load)
/// at the moment it acts, so edits apply on the next schedule start or job
/// trigger without restarting the process.
pub trait ConfigProvider: Send + Sync {
    fn load(&self) -> Result<RollcallConfig>;
    fn save(&self, config: &RollcallConfig) -> Result<()>;
}

/// TOML file on disk with `ROLLCALL_*` environment overrides.
#[derive(Debug, Clone)]
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Explicit path, or `~/.rollcall/rollcall.toml`.
    pub fn at(config_path: Option<&str>) -> Self {
        Self::new(
            config_path
                .map(PathBuf::from)
                .unwrap_or_else(default_config_path),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigProvider for FileConfig {
    /// Defaults, then the TOML file (if present), then env vars.
    /// `__` separates nesting: `ROLLCALL_CSV__UPLOAD_DIR=/data/acs`.
    fn load(&self) -> Result<RollcallConfig> {
        Figment::from(Serialized::defaults(RollcallConfig::default()))
            .merge(Toml::file(&self.path))
            .merge(Env::prefixed("ROLLCALL_").ignore(&["CONFIG"]).split("__"))
            .extract()
            .map_err(|e| RollcallError::Config(e.to_string()))
    }

    fn save(&self, config: &RollcallConfig) -> Result<()> {
        let text =
            toml::to_string_pretty(config).map_err(|e| RollcallError::Config(e.to_string()))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, text)?;
        debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}

/// Process-local configuration, for tests and one-shot CLI runs.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    inner: Mutex<RollcallConfig>,
}

impl MemoryConfig {
    pub fn new(config: RollcallConfig) -> Self {
        Self {
            inner: Mutex::new(config),
        }
    }

    /// Apply an edit in place, as a settings UI would before calling save.
    pub fn update(&self, edit: impl FnOnce(&mut RollcallConfig)) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        edit(&mut guard);
    }
}

impl ConfigProvider for MemoryConfig {
    fn load(&self) -> Result<RollcallConfig> {
        Ok(self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, config: &RollcallConfig) -> Result<()> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        Ok(())
    }
}

fn default_config_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".rollcall").join("rollcall.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_settings() {
        let config = RollcallConfig::default();
        assert_eq!(config.integration.active, "attendanceForwarder");
        assert_eq!(config.schedule.daily_run_times, vec!["09:00", "18:00"]);
        assert!(config.schedule.run_on_start);
        assert_eq!(config.vendor.base_uri, DEFAULT_VENDOR_BASE_URI);
        assert_eq!(config.delivery.max_retries, 3);
        assert_eq!(config.delivery.retry_delay_seconds, 60);
        assert_eq!(config.delivery.timeout_ms, 120_000);
        assert!(config.csv.upload_dir.is_empty());
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = FileConfig::new(dir.path().join("absent.toml"));
        let config = provider.load().expect("load");
        assert_eq!(config.school.id, "0");
        assert_eq!(config.schedule.daily_run_times.len(), 2);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rollcall.toml");
        std::fs::write(
            &path,
            "[integration]\nactive = \"csvUploader\"\n\n[csv]\nupload_dir = \"/data/acs\"\n",
        )
        .expect("write");

        let config = FileConfig::new(&path).load().expect("load");
        assert_eq!(config.integration.active, "csvUploader");
        assert_eq!(config.csv.upload_dir, "/data/acs");
        assert_eq!(config.delivery.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.vendor.user_id, "admin");
    }

    #[test]
    fn save_then_load_preserves_edits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = FileConfig::new(dir.path().join("nested").join("rollcall.toml"));

        let mut config = RollcallConfig::default();
        config.schedule.daily_run_times = vec!["07:30".to_string()];
        config.schedule.cron = "*/15 * * * *".to_string();
        config.school.domain = "example.edu".to_string();
        provider.save(&config).expect("save");

        let loaded = provider.load().expect("load");
        assert_eq!(loaded.schedule.daily_run_times, vec!["07:30"]);
        assert_eq!(loaded.schedule.cron, "*/15 * * * *");
        assert_eq!(loaded.school.domain, "example.edu");
    }

    #[test]
    fn memory_config_update_is_visible_to_next_load() {
        let provider = MemoryConfig::new(RollcallConfig::default());
        provider.update(|c| c.integration.endpoint = "http://collector".to_string());
        assert_eq!(provider.load().unwrap().integration.endpoint, "http://collector");
    }
}
