//! Core data types used across the signal engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for market observations
#[derive(Debug, Error, PartialEq)]
pub enum ObservationError {
    #[error("observation for {game_id} carries neither a total nor a spread")]
    Empty { game_id: String },

    #[error("total ({0}) must be a finite positive number")]
    InvalidTotal(f64),

    #[error("spread ({0}) must be finite")]
    InvalidSpread(f64),
}

/// External game identifier using Arc<str> for cheap cloning
///
/// Game ids are cloned into every snapshot lookup, payload and log line,
/// so the backing string is shared rather than reallocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl GameId {
    pub fn new(s: impl AsRef<str>) -> Self {
        GameId(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Home/away display names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Teams {
    pub home: String,
    pub away: String,
}

impl Teams {
    pub fn new(home: impl Into<String>, away: impl Into<String>) -> Self {
        Teams {
            home: home.into(),
            away: away.into(),
        }
    }

    pub fn matchup(&self) -> String {
        format!("{} @ {}", self.away, self.home)
    }
}

/// Current score
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub home: u32,
    pub away: u32,
}

impl Score {
    pub fn new(home: u32, away: u32) -> Self {
        Score { home, away }
    }

    pub fn total(&self) -> u32 {
        self.home + self.away
    }

    /// Home minus away
    pub fn margin_home(&self) -> i64 {
        self.home as i64 - self.away as i64
    }
}

/// One sample of the technical line series (newest samples have the
/// smallest `seconds_ago`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinePoint {
    pub seconds_ago: f64,
    pub total: f64,
}

impl LinePoint {
    pub fn new(seconds_ago: f64, total: f64) -> Self {
        LinePoint { seconds_ago, total }
    }
}

/// A single timestamped market observation kept by the snapshot store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub total: Option<f64>,
    pub spread: Option<f64>,
}

/// Which market line a window computation tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tracked {
    Total,
    Spread,
}

impl Tracked {
    pub fn value(self, snap: &Snapshot) -> Option<f64> {
        match self {
            Tracked::Total => snap.total,
            Tracked::Spread => snap.spread,
        }
    }
}

/// Raw market observation as it arrives from the odds feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub game_id: GameId,
    pub teams: Teams,
    pub start_time: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
    pub total: Option<f64>,
    pub spread: Option<f64>,
    pub game_started: bool,
}

impl Observation {
    /// Check that at least one line is present and every present line is usable
    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.total.is_none() && self.spread.is_none() {
            return Err(ObservationError::Empty {
                game_id: self.game_id.to_string(),
            });
        }

        if let Some(total) = self.total {
            if !total.is_finite() || total <= 0.0 {
                return Err(ObservationError::InvalidTotal(total));
            }
        }

        if let Some(spread) = self.spread {
            if !spread.is_finite() {
                return Err(ObservationError::InvalidSpread(spread));
            }
        }

        Ok(())
    }
}

/// Live market lines for one game at evaluation time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketQuote {
    pub total: Option<f64>,
    /// Spread quoted for the home side (negative = home favourite)
    pub spread_home: Option<f64>,
    pub moneyline_home: Option<f64>,
    pub moneyline_away: Option<f64>,
}

/// Pre-game points expectation for a matchup
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    pub home: f64,
    pub away: f64,
}

impl Expectation {
    pub fn total(&self) -> f64 {
        self.home + self.away
    }
}

/// Ephemeral per-tick game state: score, clock and the technical line series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveGameState {
    pub game_id: GameId,
    pub teams: Teams,
    pub score: Score,
    /// 1..=4 in regulation, higher for overtime; 0 before tip-off
    pub quarter: u8,
    pub seconds_remaining_in_quarter: u32,
    pub line_history: Vec<LinePoint>,
}

/// Round to one decimal place for presentation
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to three decimal places for probabilities
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
