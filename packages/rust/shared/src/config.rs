//! Application configuration for the almanac pipeline.
//!
//! User config lives at `~/.almanac/almanac.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AlmanacError, Result};
use crate::layout::ColumnLayout;
use crate::metrics::{MetricRegistry, MetricSpec, default_metric_specs};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "almanac.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".almanac";

/// Placeholder substituted with the year in the index URL template.
pub const YEAR_PLACEHOLDER: &str = "{year}";

// ---------------------------------------------------------------------------
// Config structs (matching almanac.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Stage input/output locations.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Where and what to scrape.
    #[serde(default)]
    pub source: SourceConfig,

    /// Page wait and rate-limit settings.
    #[serde(default)]
    pub navigation: NavigationConfig,

    /// League segments of a leader row.
    #[serde(default)]
    pub layout: ColumnLayout,

    /// Metric → table mapping.
    #[serde(default = "default_metric_specs")]
    pub metrics: Vec<MetricSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            source: SourceConfig::default(),
            navigation: NavigationConfig::default(),
            layout: ColumnLayout::default(),
            metrics: default_metric_specs(),
        }
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Raw per-metric CSV directory (scrape output, clean input).
    #[serde(default = "default_raw_dir")]
    pub raw_dir: PathBuf,

    /// Cleaned CSV directory (clean output, load input).
    #[serde(default = "default_cleaned_dir")]
    pub cleaned_dir: PathBuf,

    /// SQLite database file.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Directory for per-stage log files and reports.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_dir: default_raw_dir(),
            cleaned_dir: default_cleaned_dir(),
            database: default_database(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_raw_dir() -> PathBuf {
    "started_csv".into()
}
fn default_cleaned_dir() -> PathBuf {
    "cleaned_csv".into()
}
fn default_database() -> PathBuf {
    "baseball.db".into()
}
fn default_log_dir() -> PathBuf {
    "logs".into()
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Yearly index page URL, with `{year}` as placeholder.
    #[serde(default = "default_year_index_url")]
    pub year_index_url: String,

    /// First season to scrape (inclusive).
    #[serde(default = "default_first_year")]
    pub first_year: u16,

    /// Last season to scrape (inclusive).
    #[serde(default = "default_last_year")]
    pub last_year: u16,

    /// CSS selector of the leader tables.
    #[serde(default = "default_table_selector")]
    pub table_selector: String,

    /// CSS selector of metric anchors inside the index table.
    #[serde(default = "default_metric_link_selector")]
    pub metric_link_selector: String,

    /// Text of the pagination control.
    #[serde(default = "default_next_label")]
    pub next_label: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            year_index_url: default_year_index_url(),
            first_year: default_first_year(),
            last_year: default_last_year(),
            table_selector: default_table_selector(),
            metric_link_selector: default_metric_link_selector(),
            next_label: default_next_label(),
        }
    }
}

fn default_year_index_url() -> String {
    "https://www.baseball-almanac.com/yearly/yr{year}a.shtml".into()
}
fn default_first_year() -> u16 {
    1901
}
fn default_last_year() -> u16 {
    1903
}
fn default_table_selector() -> String {
    "div.ba-table table.boxed".into()
}
fn default_metric_link_selector() -> String {
    "td.datacolBlue a".into()
}
fn default_next_label() -> String {
    "Next".into()
}

impl SourceConfig {
    /// Index page URL for one season.
    pub fn year_index_url(&self, year: u16) -> Result<Url> {
        let raw = self
            .year_index_url
            .replace(YEAR_PLACEHOLDER, &year.to_string());
        Url::parse(&raw).map_err(|e| AlmanacError::config(format!("invalid index URL '{raw}': {e}")))
    }

    /// Seasons to scrape, in order.
    pub fn years(&self) -> std::ops::RangeInclusive<u16> {
        self.first_year..=self.last_year
    }
}

/// `[navigation]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Upper bound on waiting for a table to render or go stale.
    #[serde(default = "default_render_timeout")]
    pub render_timeout_ms: u64,

    /// Pause between render polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Lower bound of the random delay after a page change.
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,

    /// Upper bound of the random delay after a page change.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            render_timeout_ms: default_render_timeout(),
            poll_interval_ms: default_poll_interval(),
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_render_timeout() -> u64 {
    10_000
}
fn default_poll_interval() -> u64 {
    500
}
fn default_min_delay() -> u64 {
    1_000
}
fn default_max_delay() -> u64 {
    3_000
}
fn default_user_agent() -> String {
    concat!("almanac/", env!("CARGO_PKG_VERSION")).into()
}

impl NavigationConfig {
    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl AppConfig {
    /// Validate once at startup; returns the metric registry on success.
    pub fn validate(&self) -> Result<MetricRegistry> {
        self.layout.validate()?;

        if self.navigation.min_delay_ms > self.navigation.max_delay_ms {
            return Err(AlmanacError::config(format!(
                "min_delay_ms ({}) exceeds max_delay_ms ({})",
                self.navigation.min_delay_ms, self.navigation.max_delay_ms
            )));
        }
        if self.navigation.render_timeout_ms == 0 {
            return Err(AlmanacError::config("render_timeout_ms must be positive"));
        }
        if self.navigation.poll_interval_ms == 0 {
            return Err(AlmanacError::config("poll_interval_ms must be positive"));
        }
        if self.source.first_year > self.source.last_year {
            return Err(AlmanacError::config(format!(
                "first_year ({}) is after last_year ({})",
                self.source.first_year, self.source.last_year
            )));
        }
        if !self.source.year_index_url.contains(YEAR_PLACEHOLDER) {
            return Err(AlmanacError::config(format!(
                "year_index_url must contain {YEAR_PLACEHOLDER}"
            )));
        }
        self.source.year_index_url(self.source.first_year)?;

        MetricRegistry::new(self.metrics.clone())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.almanac/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AlmanacError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.almanac/almanac.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AlmanacError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AlmanacError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AlmanacError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AlmanacError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AlmanacError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("raw_dir"));
        assert!(toml_str.contains("[[layout]]"));
        assert!(toml_str.contains("[[metrics]]"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.source.first_year, 1901);
        assert_eq!(parsed.navigation.render_timeout_ms, 10_000);
        assert_eq!(parsed.layout, ColumnLayout::default());
        assert_eq!(parsed.metrics.len(), 7);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[paths]
database = "/tmp/stats.db"

[source]
first_year = 1920
last_year = 1921
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.paths.database, PathBuf::from("/tmp/stats.db"));
        assert_eq!(config.paths.raw_dir, PathBuf::from("started_csv"));
        assert_eq!(config.source.years().count(), 2);
        assert_eq!(config.layout.min_cells(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn year_url_substitution() {
        let source = SourceConfig::default();
        let url = source.year_index_url(1901).expect("url");
        assert_eq!(
            url.as_str(),
            "https://www.baseball-almanac.com/yearly/yr1901a.shtml"
        );
    }

    #[test]
    fn validation_rejects_bad_delays() {
        let mut config = AppConfig::default();
        config.navigation.min_delay_ms = 5_000;
        config.navigation.max_delay_ms = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_delay_ms"));
    }

    #[test]
    fn validation_rejects_zero_poll_interval() {
        let mut config = AppConfig::default();
        config.navigation.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn validation_rejects_metric_collisions() {
        let toml_str = r#"
[[metrics]]
name = "Home Runs"
table = "home_runs"
column = "home_runs"

[[metrics]]
name = "home runs"
table = "hr"
column = "hr"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(config.validate().is_err());
    }
}
