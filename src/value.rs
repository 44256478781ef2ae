//! Model-vs-market edges for the total, spread and moneyline markets
//!
//! Each edge is `model - market`. Sides are only reported once the edge
//! clears the market's noise floor; a missing market line yields no edge at all.

use serde::{Deserialize, Serialize};
use statrs::function::logistic::logistic;

use crate::config::ValueConfig;
use crate::pace::PaceProjection;
use crate::types::round1;
use crate::MarketQuote;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OuSide {
    Over,
    Under,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeamSide {
    Favorite,
    Dog,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OuEdge {
    pub side: OuSide,
    pub edge_pts: f64,
    pub model_total: f64,
    pub market_total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpreadEdge {
    pub side: TeamSide,
    pub edge_pts: f64,
    pub spread_line: f64,
    pub model_margin_home: f64,
    pub market_margin_home: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoneylineEdge {
    pub best_side: TeamSide,
    /// Absolute probability edge of the reported side, 0 when no side
    pub edge_prob: f64,
    pub model_prob_home: f64,
    pub market_prob_home: f64,
    pub ml_home: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ml_away: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueAssessment {
    pub ou: Option<OuEdge>,
    pub spread: Option<SpreadEdge>,
    pub moneyline: Option<MoneylineEdge>,
}

impl ValueAssessment {
    pub fn compute(pace: &PaceProjection, market: &MarketQuote, cfg: &ValueConfig) -> Self {
        let model_margin = pace.margin_home();

        ValueAssessment {
            ou: market
                .total
                .map(|total| ou_edge(pace.total.projected, total, cfg)),
            spread: market
                .spread_home
                .map(|spread| spread_edge(model_margin, spread, cfg)),
            moneyline: market
                .moneyline_home
                .map(|ml| moneyline_edge(model_margin, ml, market.moneyline_away, cfg)),
        }
    }

    pub fn ou_edge_pts(&self) -> Option<f64> {
        self.ou.map(|ou| ou.edge_pts)
    }
}

/// The side is decided on the exact difference; `edge_pts` is reported to
/// one decimal and that rounded figure is what the rally cascade reads.
pub fn ou_edge(model_total: f64, market_total: f64, cfg: &ValueConfig) -> OuEdge {
    let edge = model_total - market_total;
    let side = if edge > cfg.ou_noise_floor {
        OuSide::Over
    } else if edge < -cfg.ou_noise_floor {
        OuSide::Under
    } else {
        OuSide::None
    };

    OuEdge {
        side,
        edge_pts: round1(edge),
        model_total,
        market_total,
    }
}

/// `spread_line` is the home handicap, so the market's home margin is its negation
pub fn spread_edge(model_margin_home: f64, spread_line: f64, cfg: &ValueConfig) -> SpreadEdge {
    let market_margin_home = -spread_line;
    let edge = model_margin_home - market_margin_home;
    let side = if edge > cfg.spread_noise_floor {
        TeamSide::Favorite
    } else if edge < -cfg.spread_noise_floor {
        TeamSide::Dog
    } else {
        TeamSide::None
    };

    SpreadEdge {
        side,
        edge_pts: round1(edge),
        spread_line,
        model_margin_home,
        market_margin_home,
    }
}

pub fn moneyline_edge(
    model_margin_home: f64,
    ml_home: f64,
    ml_away: Option<f64>,
    cfg: &ValueConfig,
) -> MoneylineEdge {
    let model_prob_home = margin_to_prob(model_margin_home, cfg.logistic_scale);
    let market_prob_home = american_to_prob(ml_home);
    let edge = model_prob_home - market_prob_home;

    let (best_side, edge_prob) = if edge.abs() < cfg.moneyline_min_edge {
        (TeamSide::None, 0.0)
    } else if edge > 0.0 {
        (TeamSide::Favorite, edge)
    } else {
        (TeamSide::Dog, -edge)
    };

    MoneylineEdge {
        best_side,
        edge_prob,
        model_prob_home,
        market_prob_home,
        ml_home,
        ml_away,
    }
}

/// Implied probability of American odds. Even money (0) reads as 0.5.
pub fn american_to_prob(odds: f64) -> f64 {
    if odds == 0.0 {
        0.5
    } else if odds < 0.0 {
        let abs = odds.abs();
        abs / (abs + 100.0)
    } else {
        100.0 / (odds + 100.0)
    }
}

/// Logistic win probability of a projected margin
pub fn margin_to_prob(margin: f64, scale: f64) -> f64 {
    logistic(margin / scale)
}
