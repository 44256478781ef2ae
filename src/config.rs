//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files with environment
//! variable support for API credentials. Every heuristic threshold used by the
//! signal engine lives here so it can be tuned without touching code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::Expectation;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub signals: SignalConfig,
    pub store: StoreConfig,
    pub feeds: FeedConfig,
    pub expectations: ExpectationConfig,
    pub sportsbooks: Vec<SportsbookConfig>,
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file {}", path.as_ref().display())
        })?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env();
        Ok(config)
    }

    /// Load from file when it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let mut config = Config::default();
            config.apply_env();
            Ok(config)
        }
    }

    /// Load API credentials from environment if set
    fn apply_env(&mut self) {
        if let Ok(api_key) = std::env::var("THEODDSAPI_KEY") {
            if !api_key.trim().is_empty() {
                self.feeds.odds_api_key = Some(api_key);
            }
        }
    }
}

/// All signal thresholds, grouped by engine stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub window: WindowConfig,
    pub indicators: IndicatorConfig,
    pub trend: TrendConfig,
    pub pace: PaceConfig,
    pub value: ValueConfig,
    pub rally: RallyConfig,
}

/// Trailing-window delta settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub pregame_window_secs: i64,
    pub live_window_secs: i64,
    /// Pre-game move (points) that flags a nascent rally/collapse
    pub pregame_threshold: f64,
    /// Live move (points) that confirms a live rally/collapse
    pub live_threshold: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            pregame_window_secs: 300,
            live_window_secs: 150,
            pregame_threshold: 1.5,
            live_threshold: 2.0,
        }
    }
}

/// Technical indicator periods and RSI bands
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub ema_short: usize,
    pub ema_long: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        IndicatorConfig {
            ema_short: 5,
            ema_long: 13,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 7,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
        }
    }
}

/// Slope thresholds (points per second) for the trend analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub flat_slope: f64,
    pub moderate_slope: f64,
    pub strong_slope: f64,
    pub inflexion_curvature: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        TrendConfig {
            flat_slope: 0.005,
            moderate_slope: 0.03,
            strong_slope: 0.08,
            inflexion_curvature: 0.02,
        }
    }
}

/// Game clock model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaceConfig {
    pub quarter_secs: u32,
    pub regulation_quarters: u8,
}

impl Default for PaceConfig {
    fn default() -> Self {
        PaceConfig {
            quarter_secs: 12 * 60,
            regulation_quarters: 4,
        }
    }
}

impl PaceConfig {
    pub fn game_secs(&self) -> f64 {
        self.quarter_secs as f64 * self.regulation_quarters as f64
    }
}

/// Noise floors for model-vs-market edges
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValueConfig {
    pub ou_noise_floor: f64,
    pub spread_noise_floor: f64,
    pub moneyline_min_edge: f64,
    /// Margin (points) scale of the logistic win-probability transform
    pub logistic_scale: f64,
}

impl Default for ValueConfig {
    fn default() -> Self {
        ValueConfig {
            ou_noise_floor: 2.0,
            spread_noise_floor: 1.0,
            moneyline_min_edge: 0.03,
            logistic_scale: 6.0,
        }
    }
}

/// Rally/collapse rule thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RallyConfig {
    pub rally_pace_delta: f64,
    pub rally_ou_edge: f64,
    pub fake_pace_delta: f64,
    pub base_confidence: f64,
    pub max_confidence_bonus: f64,
    pub edge_divisor: f64,
    pub fake_confidence: f64,
    /// Confirmed move = OU edge times this, clamped to the confirmed band
    pub confirmed_move_factor: f64,
    pub confirmed_move_min: f64,
    pub confirmed_move_max: f64,
    /// Fake move = half the raw-pace gap (this value when the gap is zero),
    /// clamped to the fake band
    pub fake_move_default: f64,
    pub fake_move_min: f64,
    pub fake_move_max: f64,
    pub late_quarter: u8,
    pub late_signal_window_secs: u32,
    pub early_signal_window_secs: u32,
}

impl Default for RallyConfig {
    fn default() -> Self {
        RallyConfig {
            rally_pace_delta: 8.0,
            rally_ou_edge: 1.5,
            fake_pace_delta: 3.0,
            base_confidence: 0.7,
            max_confidence_bonus: 0.25,
            edge_divisor: 10.0,
            fake_confidence: 0.6,
            confirmed_move_factor: 1.2,
            confirmed_move_min: 2.0,
            confirmed_move_max: 6.0,
            fake_move_default: 2.0,
            fake_move_min: 1.5,
            fake_move_max: 4.0,
            late_quarter: 3,
            late_signal_window_secs: 10,
            early_signal_window_secs: 20,
        }
    }
}

/// Snapshot store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: String,
    pub json_backup_path: Option<String>,
    pub max_snapshots: usize,
    /// Number of samples in the technical line tape
    pub line_tape_len: usize,
    /// Games that started longer ago than this are purged
    pub retention_hours: i64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            db_path: "data/odds_window.db".to_string(),
            json_backup_path: Some("data/odds_window.json".to_string()),
            max_snapshots: 120,
            line_tape_len: 12,
            retention_hours: 36,
        }
    }
}

/// Upstream feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub scoreboard_url: String,
    pub odds_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub odds_api_key: Option<String>,
    pub regions: String,
    pub markets: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmakers: Option<String>,
    pub request_timeout_secs: u64,
    pub score_ttl_min_ms: u64,
    pub score_ttl_max_ms: u64,
    pub odds_ttl_min_ms: u64,
    pub odds_ttl_max_ms: u64,
    pub poll_interval_min_ms: u64,
    pub poll_interval_max_ms: u64,
    pub output_path: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            scoreboard_url:
                "https://site.api.espn.com/apis/site/v2/sports/basketball/nba/scoreboard"
                    .to_string(),
            odds_url: "https://api.the-odds-api.com/v4/sports/basketball_nba/odds".to_string(),
            odds_api_key: None,
            regions: "us".to_string(),
            markets: "totals,spreads,h2h".to_string(),
            bookmakers: None,
            request_timeout_secs: 10,
            score_ttl_min_ms: 10_000,
            score_ttl_max_ms: 12_000,
            odds_ttl_min_ms: 40_000,
            odds_ttl_max_ms: 45_000,
            poll_interval_min_ms: 4_000,
            poll_interval_max_ms: 6_000,
            output_path: "data/live_signals.json".to_string(),
        }
    }
}

/// Pre-game expectation source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpectationConfig {
    pub default_home: f64,
    pub default_away: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_path: Option<String>,
}

impl Default for ExpectationConfig {
    fn default() -> Self {
        ExpectationConfig {
            default_home: 115.0,
            default_away: 112.0,
            book_path: None,
        }
    }
}

impl ExpectationConfig {
    pub fn default_expectation(&self) -> Expectation {
        Expectation {
            home: self.default_home,
            away: self.default_away,
        }
    }
}

/// Simulated sportsbook provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SportsbookConfig {
    pub name: String,
    /// Cents of American price worsened on every quote
    #[serde(default = "default_vig_cents")]
    pub vig_cents: f64,
    #[serde(default = "default_max_stake")]
    pub max_stake: rust_decimal::Decimal,
}

fn default_vig_cents() -> f64 {
    5.0
}

fn default_max_stake() -> rust_decimal::Decimal {
    rust_decimal::Decimal::from(500)
}
