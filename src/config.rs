//! Configuration loader
//!
//! Infrastructure and session settings come from a TOML file; API keys and
//! the webhook URL are overlaid from the environment so they never need to
//! live on disk.

use anyhow::{anyhow, Result};
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::Level;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_name() -> String {
    "Options Catalyst".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

/// The underlying being traded and the news universe around it.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_ticker")]
    pub ticker: String,
    /// Lowercase company name matched in headlines.
    #[serde(default = "default_company")]
    pub company: String,
    #[serde(default = "default_sector_tickers")]
    pub sector_tickers: Vec<String>,
    /// Peers whose company news feeds the sector aggregator.
    #[serde(default = "default_news_tickers")]
    pub news_tickers: Vec<String>,
    #[serde(default = "default_sector_query")]
    pub sector_query: String,
    #[serde(default = "default_sector_keywords")]
    pub sector_keywords: Vec<String>,
}

fn default_ticker() -> String {
    "APP".to_string()
}

fn default_company() -> String {
    "applovin".to_string()
}

fn default_sector_tickers() -> Vec<String> {
    ["META", "GOOGL", "TTD", "MGNI", "PUBM", "DV", "APP"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_news_tickers() -> Vec<String> {
    vec!["META".to_string(), "GOOGL".to_string()]
}

fn default_sector_query() -> String {
    "digital advertising".to_string()
}

fn default_sector_keywords() -> Vec<String> {
    [
        "digital advertising",
        "ad spend",
        "ad revenue",
        "programmatic",
        "mobile advertising",
        "app monetization",
        "connected TV",
        "CTV advertising",
        "ROAS",
        "advertising budget",
        "ad market",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ticker: default_ticker(),
            company: default_company(),
            sector_tickers: default_sector_tickers(),
            news_tickers: default_news_tickers(),
            sector_query: default_sector_query(),
            sector_keywords: default_sector_keywords(),
        }
    }
}

/// Session clock, all times are exchange-local wall clock ("HH:MM").
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_active_days")]
    pub active_days: Vec<String>,
    #[serde(default = "default_premarket_start")]
    pub premarket_start: String,
    #[serde(default = "default_market_open")]
    pub market_open: String,
    #[serde(default = "default_market_close")]
    pub market_close: String,
    #[serde(default = "default_market_open")]
    pub entry_window_start: String,
    #[serde(default = "default_entry_window_end")]
    pub entry_window_end: String,
    #[serde(default = "default_check_interval")]
    pub check_interval_mins: u32,
    #[serde(default = "default_live_news_interval")]
    pub live_news_interval_mins: u32,
    #[serde(default = "default_averages_at")]
    pub averages_at: String,
    #[serde(default = "default_cleanup_at")]
    pub cleanup_at: String,
    #[serde(default = "default_summary_at")]
    pub summary_at: String,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
}

fn default_active_days() -> Vec<String> {
    vec!["Thursday".to_string(), "Friday".to_string()]
}

fn default_premarket_start() -> String {
    "09:00".to_string()
}

fn default_market_open() -> String {
    "09:30".to_string()
}

fn default_market_close() -> String {
    "16:00".to_string()
}

fn default_entry_window_end() -> String {
    "15:30".to_string()
}

fn default_check_interval() -> u32 {
    5
}

fn default_live_news_interval() -> u32 {
    2
}

fn default_averages_at() -> String {
    "16:01".to_string()
}

fn default_cleanup_at() -> String {
    "16:05".to_string()
}

fn default_summary_at() -> String {
    "16:10".to_string()
}

fn default_poll_secs() -> u64 {
    30
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            active_days: default_active_days(),
            premarket_start: default_premarket_start(),
            market_open: default_market_open(),
            market_close: default_market_close(),
            entry_window_start: default_market_open(),
            entry_window_end: default_entry_window_end(),
            check_interval_mins: default_check_interval(),
            live_news_interval_mins: default_live_news_interval(),
            averages_at: default_averages_at(),
            cleanup_at: default_cleanup_at(),
            summary_at: default_summary_at(),
            poll_secs: default_poll_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Cheapest-contract cap applied to live news strikes.
    #[serde(default = "default_max_option_price")]
    pub max_option_price: f64,
    /// 7.5 = a 750% gain.
    #[serde(default = "default_target_gain")]
    pub target_gain: f64,
}

fn default_max_option_price() -> f64 {
    1.0
}

fn default_target_gain() -> f64 {
    7.5
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_option_price: default_max_option_price(),
            target_gain: default_target_gain(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NewsConfig {
    #[serde(default)]
    pub finnhub_api_key: Option<String>,
    #[serde(default)]
    pub newsapi_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_history_weeks")]
    pub history_weeks: u32,
    #[serde(default = "default_status_path")]
    pub status_path: String,
}

fn default_db_path() -> String {
    "data/options_history.db".to_string()
}

fn default_history_weeks() -> u32 {
    6
}

fn default_status_path() -> String {
    "options_catalyst_status.json".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            history_weeks: default_history_weeks(),
            status_path: default_status_path(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults, then
    /// overlay secrets from the environment.
    pub fn load_or_default(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay secrets from an environment lookup. Non-empty values win over
    /// the file.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("FINNHUB_API_KEY") {
            self.news.finnhub_api_key = Some(key);
        }
        if let Some(key) = get("NEWSAPI_KEY") {
            self.news.newsapi_key = Some(key);
        }
        if let Some(url) = get("DISCORD_WEBHOOK_URL") {
            self.discord.webhook_url = Some(url);
        }
    }

    fn validate(&self) -> Result<()> {
        self.session.active_weekdays()?;
        for t in [
            &self.session.premarket_start,
            &self.session.market_open,
            &self.session.market_close,
            &self.session.entry_window_start,
            &self.session.entry_window_end,
            &self.session.averages_at,
            &self.session.cleanup_at,
            &self.session.summary_at,
        ] {
            parse_time(t)?;
        }
        if self.session.check_interval_mins == 0 || self.session.live_news_interval_mins == 0 {
            return Err(anyhow!("check intervals must be at least one minute"));
        }
        Ok(())
    }

    pub fn log_level(&self) -> Level {
        match self.system.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" | "warning" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    pub fn webhook_url(&self) -> Option<&str> {
        if !self.discord.enabled {
            return None;
        }
        self.discord.webhook_url.as_deref().filter(|u| !u.is_empty())
    }
}

impl SessionConfig {
    pub fn active_weekdays(&self) -> Result<Vec<Weekday>> {
        self.active_days
            .iter()
            .map(|d| {
                d.parse::<Weekday>()
                    .map_err(|_| anyhow!("invalid weekday in session.active_days: {}", d))
            })
            .collect()
    }
}

/// Parse an "HH:MM" (or "HH:MM:SS") time of day.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| anyhow!("invalid time of day: {}", s))
}
