//! Rally/collapse classifier
//!
//! An ordered cascade of rules over pace, OU edge, line trend and the raw
//! pace-only projection. The first rule whose guard matches decides the state;
//! when none match the game is NEUTRAL.
//!
//! RALLY_UP/COLLAPSE_DOWN read the expectation-adjusted OU edge, while the
//! FAKE_* rules compare the raw scoring pace against the live market line, so
//! a market that has run ahead of (or fallen behind) actual scoring is flagged
//! even when the model edge is flat.

use serde::{Deserialize, Serialize};

use crate::config::RallyConfig;
use crate::trend::{Direction, Strength};
use crate::types::round1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RallyState {
    RallyUp,
    CollapseDown,
    FakeRally,
    FakeCollapse,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeDirection {
    Over,
    Under,
    None,
}

/// Inputs of one classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RallyContext {
    /// Projected minus expected total
    pub pace_delta_total: f64,
    /// Model total minus live market total; `None` without a live total
    pub ou_edge_pts: Option<f64>,
    pub trend_direction: Direction,
    pub trend_strength: Strength,
    pub total_live: Option<f64>,
    /// Pace-only projection of the final total
    pub raw_pace_total: Option<f64>,
    pub quarter: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RallyPrediction {
    pub state: RallyState,
    pub confidence: f64,
    pub edge_direction: EdgeDirection,
    pub reason_tags: Vec<String>,
    pub comment: String,
    pub expected_move_pts: f64,
    pub signal_window_sec: u32,
}

/// One guarded rule of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RallyRule {
    RallyUp,
    CollapseDown,
    FakeRally,
    FakeCollapse,
}

/// Evaluation order; first match wins
pub const CASCADE: [RallyRule; 4] = [
    RallyRule::RallyUp,
    RallyRule::CollapseDown,
    RallyRule::FakeRally,
    RallyRule::FakeCollapse,
];

struct Outcome {
    state: RallyState,
    confidence: f64,
    edge_direction: EdgeDirection,
    reason_tags: [&'static str; 3],
    comment: &'static str,
    expected_move_pts: f64,
}

impl RallyRule {
    pub fn matches(self, ctx: &RallyContext, cfg: &RallyConfig) -> bool {
        let Some(edge) = ctx.ou_edge_pts else {
            return false;
        };
        let material = ctx.trend_strength.is_material();

        match self {
            RallyRule::RallyUp => {
                ctx.pace_delta_total >= cfg.rally_pace_delta
                    && edge > cfg.rally_ou_edge
                    && matches!(ctx.trend_direction, Direction::Up | Direction::Flat)
                    && material
            }
            RallyRule::CollapseDown => {
                ctx.pace_delta_total <= -cfg.rally_pace_delta
                    && edge < -cfg.rally_ou_edge
                    && matches!(ctx.trend_direction, Direction::Down | Direction::Flat)
                    && material
            }
            RallyRule::FakeRally => {
                ctx.pace_delta_total <= cfg.fake_pace_delta
                    && edge <= 0.0
                    && ctx.trend_direction == Direction::Up
                    && material
                    && matches!(raw_gap(ctx), Some(gap) if gap < 0.0)
            }
            RallyRule::FakeCollapse => {
                ctx.pace_delta_total >= cfg.fake_pace_delta
                    && edge >= 0.0
                    && ctx.trend_direction == Direction::Down
                    && material
                    && matches!(raw_gap(ctx), Some(gap) if gap > 0.0)
            }
        }
    }

    fn outcome(self, ctx: &RallyContext, cfg: &RallyConfig) -> Outcome {
        let edge = ctx.ou_edge_pts.unwrap_or(0.0).abs();
        let gap = raw_gap(ctx).unwrap_or(0.0).abs();
        let confirmed_confidence =
            cfg.base_confidence + (edge / cfg.edge_divisor).min(cfg.max_confidence_bonus);
        let confirmed_move = (edge * cfg.confirmed_move_factor)
            .clamp(cfg.confirmed_move_min, cfg.confirmed_move_max);
        let half_gap = if gap > 0.0 {
            gap / 2.0
        } else {
            cfg.fake_move_default
        };
        let fake_move = half_gap.clamp(cfg.fake_move_min, cfg.fake_move_max);

        match self {
            RallyRule::RallyUp => Outcome {
                state: RallyState::RallyUp,
                confidence: confirmed_confidence,
                edge_direction: EdgeDirection::Over,
                reason_tags: ["high_pace", "model_over_edge", "trend_up_or_flat"],
                comment: "Scoring pace is above expectation and the model projects more points \
                          than the live line, with the trend supporting the move. Looks like a real rally.",
                expected_move_pts: confirmed_move,
            },
            RallyRule::CollapseDown => Outcome {
                state: RallyState::CollapseDown,
                confidence: confirmed_confidence,
                edge_direction: EdgeDirection::Under,
                reason_tags: ["low_pace", "model_under_edge", "trend_down_or_flat"],
                comment: "Scoring pace is below expectation and the model projects fewer points \
                          than the live line, with the trend supporting the drop. Looks like a real collapse.",
                expected_move_pts: confirmed_move,
            },
            RallyRule::FakeRally => Outcome {
                state: RallyState::FakeRally,
                confidence: cfg.fake_confidence,
                edge_direction: EdgeDirection::Under,
                reason_tags: ["trend_up", "pace_not_supporting", "model_no_over_edge"],
                comment: "The live line climbed but raw scoring pace projects below it. \
                          The market looks overheated.",
                expected_move_pts: fake_move,
            },
            RallyRule::FakeCollapse => Outcome {
                state: RallyState::FakeCollapse,
                confidence: cfg.fake_confidence,
                edge_direction: EdgeDirection::Over,
                reason_tags: ["trend_down", "pace_supports_more", "model_no_under_edge"],
                comment: "The live line dropped but raw scoring pace projects above it. \
                          A cold stretch, with room for a recovery rally.",
                expected_move_pts: fake_move,
            },
        }
    }
}

/// Raw pace projection minus live total
fn raw_gap(ctx: &RallyContext) -> Option<f64> {
    Some(ctx.raw_pace_total? - ctx.total_live?)
}

/// Seconds the signal is expected to stay actionable
pub fn signal_window_secs(quarter: Option<u8>, cfg: &RallyConfig) -> u32 {
    match quarter {
        Some(q) if q < cfg.late_quarter => cfg.early_signal_window_secs,
        _ => cfg.late_signal_window_secs,
    }
}

/// Run the cascade
pub fn classify(ctx: &RallyContext, cfg: &RallyConfig) -> RallyPrediction {
    let signal_window_sec = signal_window_secs(ctx.quarter, cfg);

    match CASCADE.iter().find(|rule| rule.matches(ctx, cfg)) {
        Some(rule) => {
            let outcome = rule.outcome(ctx, cfg);
            RallyPrediction {
                state: outcome.state,
                confidence: outcome.confidence.clamp(0.0, 1.0),
                edge_direction: outcome.edge_direction,
                reason_tags: outcome.reason_tags.iter().map(|t| t.to_string()).collect(),
                comment: outcome.comment.to_string(),
                expected_move_pts: round1(outcome.expected_move_pts),
                signal_window_sec,
            }
        }
        None => RallyPrediction {
            state: RallyState::Neutral,
            confidence: 0.0,
            edge_direction: EdgeDirection::None,
            reason_tags: vec![],
            comment: "No clear rally or collapse signal right now.".to_string(),
            expected_move_pts: 0.0,
            signal_window_sec,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ctx(pace: f64, edge: f64, direction: Direction, strength: Strength) -> RallyContext {
        RallyContext {
            pace_delta_total: pace,
            ou_edge_pts: Some(edge),
            trend_direction: direction,
            trend_strength: strength,
            total_live: Some(226.0),
            raw_pace_total: Some(226.0),
            quarter: Some(3),
        }
    }

    #[test]
    fn test_rally_up() {
        let cfg = RallyConfig::default();
        let result = classify(&ctx(10.0, 2.0, Direction::Up, Strength::Strong), &cfg);
        assert_eq!(result.state, RallyState::RallyUp);
        assert_eq!(result.edge_direction, EdgeDirection::Over);
        assert_abs_diff_eq!(result.confidence, 0.9, epsilon = 1e-9);
        assert!(result.confidence >= 0.7 && result.confidence <= 0.95);
        assert_abs_diff_eq!(result.expected_move_pts, 2.4);
        assert_eq!(result.reason_tags.len(), 3);
        assert_eq!(result.signal_window_sec, 10);
    }

    #[test]
    fn test_confidence_bonus_is_capped() {
        let cfg = RallyConfig::default();
        let result = classify(&ctx(12.0, 9.0, Direction::Flat, Strength::Moderate), &cfg);
        assert_eq!(result.state, RallyState::RallyUp);
        assert_abs_diff_eq!(result.confidence, 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(result.expected_move_pts, 6.0);
    }

    #[test]
    fn test_collapse_down() {
        let cfg = RallyConfig::default();
        let result = classify(&ctx(-9.0, -3.0, Direction::Down, Strength::Moderate), &cfg);
        assert_eq!(result.state, RallyState::CollapseDown);
        assert_eq!(result.edge_direction, EdgeDirection::Under);
        assert_abs_diff_eq!(result.confidence, 0.95, epsilon = 1e-9);
        assert_abs_diff_eq!(result.expected_move_pts, 3.6);
    }

    #[test]
    fn test_neutral() {
        let cfg = RallyConfig::default();
        let result = classify(&ctx(0.0, 0.0, Direction::Flat, Strength::Soft), &cfg);
        assert_eq!(result.state, RallyState::Neutral);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.edge_direction, EdgeDirection::None);
        assert!(result.reason_tags.is_empty());
    }

    #[test]
    fn test_soft_trend_never_confirms() {
        let cfg = RallyConfig::default();
        let result = classify(&ctx(10.0, 2.0, Direction::Up, Strength::Soft), &cfg);
        assert_eq!(result.state, RallyState::Neutral);
    }

    #[test]
    fn test_fake_rally_when_raw_pace_lags_market() {
        let cfg = RallyConfig::default();
        let mut input = ctx(1.0, -0.5, Direction::Up, Strength::Strong);
        input.raw_pace_total = Some(220.0);
        let result = classify(&input, &cfg);
        assert_eq!(result.state, RallyState::FakeRally);
        assert_eq!(result.edge_direction, EdgeDirection::Under);
        assert_abs_diff_eq!(result.confidence, 0.6);
        assert_abs_diff_eq!(result.expected_move_pts, 3.0);
    }

    #[test]
    fn test_fake_rally_needs_raw_pace_below_market() {
        let cfg = RallyConfig::default();
        let mut input = ctx(1.0, -0.5, Direction::Up, Strength::Strong);
        input.raw_pace_total = Some(230.0);
        assert_eq!(classify(&input, &cfg).state, RallyState::Neutral);

        input.raw_pace_total = None;
        assert_eq!(classify(&input, &cfg).state, RallyState::Neutral);
    }

    #[test]
    fn test_fake_collapse_when_raw_pace_runs_ahead() {
        let cfg = RallyConfig::default();
        let mut input = ctx(4.0, 0.5, Direction::Down, Strength::Moderate);
        input.raw_pace_total = Some(236.0);
        input.quarter = Some(1);
        let result = classify(&input, &cfg);
        assert_eq!(result.state, RallyState::FakeCollapse);
        assert_eq!(result.edge_direction, EdgeDirection::Over);
        assert_abs_diff_eq!(result.expected_move_pts, 4.0);
        assert_eq!(result.signal_window_sec, 20);
    }

    #[test]
    fn test_move_sizes_follow_config() {
        let cfg: RallyConfig = serde_json::from_str(
            r#"{"confirmed_move_factor": 2.0, "confirmed_move_max": 3.5, "fake_move_max": 2.5}"#,
        )
        .unwrap();
        assert_abs_diff_eq!(cfg.confirmed_move_min, 2.0);

        let rally = classify(&ctx(10.0, 2.0, Direction::Up, Strength::Strong), &cfg);
        assert_eq!(rally.state, RallyState::RallyUp);
        assert_abs_diff_eq!(rally.expected_move_pts, 3.5);

        let mut input = ctx(1.0, -0.5, Direction::Up, Strength::Strong);
        input.raw_pace_total = Some(220.0);
        let fake = classify(&input, &cfg);
        assert_eq!(fake.state, RallyState::FakeRally);
        assert_abs_diff_eq!(fake.expected_move_pts, 2.5);
    }

    #[test]
    fn test_missing_live_total_is_neutral() {
        let cfg = RallyConfig::default();
        let mut input = ctx(10.0, 2.0, Direction::Up, Strength::Strong);
        input.ou_edge_pts = None;
        input.total_live = None;
        assert_eq!(classify(&input, &cfg).state, RallyState::Neutral);
    }

    #[test]
    fn test_signal_window() {
        let cfg = RallyConfig::default();
        assert_eq!(signal_window_secs(Some(1), &cfg), 20);
        assert_eq!(signal_window_secs(Some(2), &cfg), 20);
        assert_eq!(signal_window_secs(Some(4), &cfg), 10);
        assert_eq!(signal_window_secs(None, &cfg), 10);
    }
}
