//! Slope and curvature of the live total line
//!
//! Looks only at the three newest samples: the latest slope, the slope
//! before it, and their difference (curvature). An inflexion needs both a
//! sign flip and a material curvature, since at near-zero slopes a sign flip
//! alone is noise.

use serde::{Deserialize, Serialize};

use crate::config::TrendConfig;
use crate::LinePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Soft,
    Moderate,
    Strong,
}

impl Strength {
    /// Moderate or strong
    pub fn is_material(self) -> bool {
        self >= Strength::Moderate
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendMetrics {
    pub slope: f64,
    pub prev_slope: f64,
    pub curvature: f64,
    pub direction: Direction,
    pub strength: Strength,
    pub inflexion: bool,
    /// True when fewer than three samples were available
    pub insufficient_history: bool,
    pub label: String,
}

impl TrendMetrics {
    pub fn insufficient() -> Self {
        TrendMetrics {
            slope: 0.0,
            prev_slope: 0.0,
            curvature: 0.0,
            direction: Direction::Flat,
            strength: Strength::Soft,
            inflexion: false,
            insufficient_history: true,
            label: "Not enough history to evaluate the trend.".to_string(),
        }
    }
}

/// Analyze the three newest points of `history` (ordered oldest first)
pub fn analyze(history: &[LinePoint], cfg: &TrendConfig) -> TrendMetrics {
    let n = history.len();
    if n < 3 {
        return TrendMetrics::insufficient();
    }

    let p1 = history[n - 1];
    let p2 = history[n - 2];
    let p3 = history[n - 3];

    let dt1 = (p1.seconds_ago - p2.seconds_ago).abs().max(1.0);
    let dt2 = (p2.seconds_ago - p3.seconds_ago).abs().max(1.0);

    let slope = (p1.total - p2.total) / dt1;
    let prev_slope = (p2.total - p3.total) / dt2;
    let curvature = slope - prev_slope;

    let abs_slope = slope.abs();
    let direction = if abs_slope < cfg.flat_slope {
        Direction::Flat
    } else if slope > 0.0 {
        Direction::Up
    } else {
        Direction::Down
    };

    let strength = if abs_slope >= cfg.strong_slope {
        Strength::Strong
    } else if abs_slope >= cfg.moderate_slope {
        Strength::Moderate
    } else {
        Strength::Soft
    };

    let changed_sign = slope * prev_slope < 0.0;
    let inflexion = changed_sign && curvature.abs() >= cfg.inflexion_curvature;

    TrendMetrics {
        slope,
        prev_slope,
        curvature,
        direction,
        strength,
        inflexion,
        insufficient_history: false,
        label: describe(direction, strength, inflexion),
    }
}

fn describe(direction: Direction, strength: Strength, inflexion: bool) -> String {
    let mut label = match (direction, strength) {
        (Direction::Flat, _) => "Live line almost flat: the market is moving sideways.",
        (Direction::Up, Strength::Strong) => "Strong uptrend on the live line (pressure toward OVER).",
        (Direction::Up, Strength::Moderate) => "Moderate uptrend on the live line.",
        (Direction::Up, Strength::Soft) => "Live line drifting slightly higher.",
        (Direction::Down, Strength::Strong) => {
            "Strong downtrend on the live line (pressure toward UNDER)."
        }
        (Direction::Down, Strength::Moderate) => "Moderate downtrend on the live line.",
        (Direction::Down, Strength::Soft) => "Live line drifting slightly lower.",
    }
    .to_string();

    if inflexion {
        label.push_str(" Possible inflexion point: the slope recently changed sign.");
    }

    label
}
