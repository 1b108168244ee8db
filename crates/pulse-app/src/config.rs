//! Application configuration.

use crate::error::{AppError, AppResult};
use pulse_core::{Category, ColumnConfig, ViewConfig};
use pulse_source::LoaderConfig;
use pulse_ws::ConnectionConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Where instruments and ticks come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// In-process simulated market for both bulk loads and ticks.
    #[default]
    Simulated,
    /// REST bulk loads and a WebSocket tick stream.
    Live,
}

/// Tick stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_ws_url")]
    pub ws_url: String,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 0 disables the idle watchdog.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// 0 retries forever.
    #[serde(default)]
    pub max_reconnect_attempts: u32,
}

fn default_ws_url() -> String {
    "ws://127.0.0.1:8080/ticks".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_connect_timeout_ms() -> u64 {
    10000
}

fn default_idle_timeout_ms() -> u64 {
    30000
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
            max_reconnect_attempts: 0,
        }
    }
}

impl FeedConfig {
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            reconnect_delay_ms: self.reconnect_delay_ms,
            connect_timeout_ms: self.connect_timeout_ms,
            idle_timeout_ms: self.idle_timeout_ms,
            max_reconnect_attempts: self.max_reconnect_attempts,
        }
    }
}

/// Bulk load settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_categories")]
    pub categories: Vec<Category>,
    #[serde(default = "default_refetch_interval_ms")]
    pub refetch_interval_ms: u64,
    #[serde(default = "default_stale_time_ms")]
    pub stale_time_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_categories() -> Vec<Category> {
    Category::ALL.to_vec()
}

fn default_refetch_interval_ms() -> u64 {
    60000
}

fn default_stale_time_ms() -> u64 {
    30000
}

fn default_request_timeout_ms() -> u64 {
    10000
}

impl Default for LoaderSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            categories: default_categories(),
            refetch_interval_ms: default_refetch_interval_ms(),
            stale_time_ms: default_stale_time_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl LoaderSection {
    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            categories: self.categories.clone(),
            refetch_interval_ms: self.refetch_interval_ms,
            stale_time_ms: self.stale_time_ms,
        }
    }
}

/// Flash marker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashConfig {
    #[serde(default = "default_flash_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

fn default_flash_window_ms() -> u64 {
    pulse_feed::flash::DEFAULT_FLASH_WINDOW_MS
}

fn default_sweep_interval_ms() -> u64 {
    1000
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            window_ms: default_flash_window_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

/// Simulated market settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_instruments_per_category")]
    pub instruments_per_category: usize,
    /// Artificial latency of a bulk fetch.
    #[serde(default = "default_fetch_delay_ms")]
    pub fetch_delay_ms: u64,
    /// Delay between connect and the session opening.
    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
    #[serde(default = "default_tick_interval_min_ms")]
    pub tick_interval_min_ms: u64,
    #[serde(default = "default_tick_interval_max_ms")]
    pub tick_interval_max_ms: u64,
    #[serde(default = "default_ticks_per_batch_min")]
    pub ticks_per_batch_min: usize,
    #[serde(default = "default_ticks_per_batch_max")]
    pub ticks_per_batch_max: usize,
    #[serde(default = "default_base_price_min")]
    pub base_price_min: f64,
    #[serde(default = "default_base_price_max")]
    pub base_price_max: f64,
    /// Largest relative move of one tick, in percent either way.
    #[serde(default = "default_max_move_pct")]
    pub max_move_pct: f64,
    #[serde(default = "default_price_floor")]
    pub price_floor: f64,
}

fn default_instruments_per_category() -> usize {
    25
}

fn default_fetch_delay_ms() -> u64 {
    500
}

fn default_connect_delay_ms() -> u64 {
    500
}

fn default_tick_interval_min_ms() -> u64 {
    1000
}

fn default_tick_interval_max_ms() -> u64 {
    2000
}

fn default_ticks_per_batch_min() -> usize {
    2
}

fn default_ticks_per_batch_max() -> usize {
    5
}

fn default_base_price_min() -> f64 {
    100.0
}

fn default_base_price_max() -> f64 {
    1000.0
}

fn default_max_move_pct() -> f64 {
    8.0
}

fn default_price_floor() -> f64 {
    10.0
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            instruments_per_category: default_instruments_per_category(),
            fetch_delay_ms: default_fetch_delay_ms(),
            connect_delay_ms: default_connect_delay_ms(),
            tick_interval_min_ms: default_tick_interval_min_ms(),
            tick_interval_max_ms: default_tick_interval_max_ms(),
            ticks_per_batch_min: default_ticks_per_batch_min(),
            ticks_per_batch_max: default_ticks_per_batch_max(),
            base_price_min: default_base_price_min(),
            base_price_max: default_base_price_max(),
            max_move_pct: default_max_move_pct(),
            price_floor: default_price_floor(),
        }
    }
}

impl SimulatorConfig {
    fn validate(&self) -> AppResult<()> {
        if self.tick_interval_min_ms == 0 || self.tick_interval_min_ms > self.tick_interval_max_ms {
            return Err(AppError::Config(format!(
                "simulator tick interval must satisfy 0 < min <= max, got {}..{}",
                self.tick_interval_min_ms, self.tick_interval_max_ms
            )));
        }
        if self.ticks_per_batch_min == 0 || self.ticks_per_batch_min > self.ticks_per_batch_max {
            return Err(AppError::Config(format!(
                "simulator ticks per batch must satisfy 0 < min <= max, got {}..{}",
                self.ticks_per_batch_min, self.ticks_per_batch_max
            )));
        }
        if !(self.price_floor > 0.0 && self.base_price_min <= self.base_price_max) {
            return Err(AppError::Config(
                "simulator prices must satisfy floor > 0 and base min <= base max".to_string(),
            ));
        }
        if !(0.0..100.0).contains(&self.max_move_pct) {
            return Err(AppError::Config(format!(
                "simulator max_move_pct must be in [0, 100), got {}",
                self.max_move_pct
            )));
        }
        Ok(())
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: RunMode,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub loader: LoaderSection,
    #[serde(default)]
    pub flash: FlashConfig,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Displayed columns. Defaults to one column per category.
    #[serde(default = "default_columns")]
    pub columns: Vec<ColumnConfig>,
    /// Period of the column summary log line (0 = disabled).
    #[serde(default = "default_summary_interval_ms")]
    pub summary_interval_ms: u64,
    /// Rows included per column in the summary log line.
    #[serde(default = "default_summary_rows")]
    pub summary_rows: usize,
}

fn default_columns() -> Vec<ColumnConfig> {
    Category::ALL
        .iter()
        .map(|&category| ColumnConfig::new(category.as_str(), category, ViewConfig::default()))
        .collect()
}

fn default_summary_interval_ms() -> u64 {
    10000
}

fn default_summary_rows() -> usize {
    3
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            feed: FeedConfig::default(),
            loader: LoaderSection::default(),
            flash: FlashConfig::default(),
            simulator: SimulatorConfig::default(),
            columns: default_columns(),
            summary_interval_ms: default_summary_interval_ms(),
            summary_rows: default_summary_rows(),
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.feed.reconnect_delay_ms == 0 {
            return Err(AppError::Config(
                "feed.reconnect_delay_ms must be positive".to_string(),
            ));
        }
        if self.feed.connect_timeout_ms == 0 {
            return Err(AppError::Config(
                "feed.connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.loader.categories.is_empty() {
            return Err(AppError::Config(
                "loader.categories must not be empty".to_string(),
            ));
        }
        if self.loader.refetch_interval_ms == 0 {
            return Err(AppError::Config(
                "loader.refetch_interval_ms must be positive".to_string(),
            ));
        }
        if self.flash.window_ms == 0 || self.flash.sweep_interval_ms == 0 {
            return Err(AppError::Config(
                "flash.window_ms and flash.sweep_interval_ms must be positive".to_string(),
            ));
        }
        if self.mode == RunMode::Simulated {
            self.simulator.validate()?;
        }

        let mut ids = HashSet::new();
        for column in &self.columns {
            column.validate()?;
            if !ids.insert(column.id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate column id: {}",
                    column.id
                )));
            }
        }
        Ok(())
    }

    pub fn is_simulated(&self) -> bool {
        self.mode == RunMode::Simulated
    }
}
