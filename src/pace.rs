//! Pace projection
//!
//! Extrapolates the final score from elapsed game time using a fixed quarter
//! clock. Overtime periods are placed on the same clock, so an overtime
//! quarter counts as time played beyond regulation.

use serde::{Deserialize, Serialize};

use crate::config::PaceConfig;
use crate::{Expectation, Score};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SidePace {
    pub expected: f64,
    pub projected: f64,
    pub delta: f64,
}

impl SidePace {
    fn new(expected: f64, projected: f64) -> Self {
        SidePace {
            expected,
            projected,
            delta: projected - expected,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaceProjection {
    pub home: SidePace,
    pub away: SidePace,
    pub total: SidePace,
    pub seconds_played: f64,
}

impl PaceProjection {
    /// Projected home margin
    pub fn margin_home(&self) -> f64 {
        self.home.projected - self.away.projected
    }
}

/// Seconds played so far. Zero or negative before tip-off.
pub fn seconds_played(quarter: u8, seconds_remaining: u32, cfg: &PaceConfig) -> f64 {
    let quarter_secs = cfg.quarter_secs as f64;
    let remaining = (seconds_remaining as f64).min(quarter_secs);
    (quarter as f64 - 1.0) * quarter_secs + (quarter_secs - remaining)
}

/// Full-game extrapolation factor, `None` until the clock has run
fn pace_factor(quarter: u8, seconds_remaining: u32, cfg: &PaceConfig) -> Option<f64> {
    let played = seconds_played(quarter, seconds_remaining, cfg);
    (played > 0.0).then(|| cfg.game_secs() / played)
}

/// Project the final score; before tip-off the expectation is returned as is
pub fn project(
    quarter: u8,
    seconds_remaining: u32,
    score: Score,
    expected: Expectation,
    cfg: &PaceConfig,
) -> PaceProjection {
    let (projected_home, projected_away) = match pace_factor(quarter, seconds_remaining, cfg) {
        Some(factor) => (score.home as f64 * factor, score.away as f64 * factor),
        None => (expected.home, expected.away),
    };

    PaceProjection {
        home: SidePace::new(expected.home, projected_home),
        away: SidePace::new(expected.away, projected_away),
        total: SidePace::new(expected.total(), projected_home + projected_away),
        seconds_played: seconds_played(quarter, seconds_remaining, cfg).max(0.0),
    }
}

/// Pace-only total projection (current points times the pace factor), with
/// no pre-game expectation involved. `None` before tip-off.
pub fn raw_total(quarter: u8, seconds_remaining: u32, score: Score, cfg: &PaceConfig) -> Option<f64> {
    pace_factor(quarter, seconds_remaining, cfg).map(|factor| score.total() as f64 * factor)
}
