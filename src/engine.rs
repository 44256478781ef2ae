//! Per-game evaluation pipeline
//!
//! `evaluate_game` is pure: every derived value is recomputed from the input
//! and dropped with the payload. Games share nothing, so `evaluate_all` fans
//! out across the rayon pool.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::SignalConfig;
use crate::indicators::{IndicatorBundle, TechnicalSignal};
use crate::pace::{self, PaceProjection};
use crate::patterns::{self, LiveFeatures, PatternReport};
use crate::rally::{self, RallyContext, RallyPrediction, RallyState};
use crate::trend::{self, TrendMetrics};
use crate::value::ValueAssessment;
use crate::window::WindowReport;
use crate::{Expectation, GameId, LinePoint, LiveGameState, MarketQuote, Score, Teams};

/// Everything one evaluation needs
#[derive(Debug, Clone, PartialEq)]
pub struct GameInput {
    pub state: LiveGameState,
    pub expectation: Expectation,
    pub market: MarketQuote,
    /// Window deltas from the snapshot store, when the game is tracked there
    pub windows: Option<WindowReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSummary {
    pub id: GameId,
    pub teams: Teams,
    pub quarter: u8,
    pub seconds_remaining: u32,
    pub score: Score,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSummary {
    pub total_live: Option<f64>,
    pub spread_live: Option<f64>,
    pub moneyline_home: Option<f64>,
    pub moneyline_away: Option<f64>,
    pub history: Vec<LinePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePayload {
    pub game: GameSummary,
    pub market: MarketSummary,
    pub technical: TechnicalSignal,
    pub trend: TrendMetrics,
    pub pace: PaceProjection,
    pub value: ValueAssessment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows: Option<WindowReport>,
    pub patterns: PatternReport,
    pub rally_predictor: RallyPrediction,
}

pub fn evaluate_game(input: &GameInput, cfg: &SignalConfig) -> GamePayload {
    let state = &input.state;
    let market = &input.market;

    let closes: Vec<f64> = state.line_history.iter().map(|p| p.total).collect();
    let technical =
        TechnicalSignal::from_bundle(IndicatorBundle::compute(&closes, &cfg.indicators), &cfg.indicators);
    let trend = trend::analyze(&state.line_history, &cfg.trend);

    let pace = pace::project(
        state.quarter,
        state.seconds_remaining_in_quarter,
        state.score,
        input.expectation,
        &cfg.pace,
    );
    let raw_pace_total = pace::raw_total(
        state.quarter,
        state.seconds_remaining_in_quarter,
        state.score,
        &cfg.pace,
    );

    let value = ValueAssessment::compute(&pace, market, &cfg.value);

    let patterns = patterns::match_profiles(&LiveFeatures {
        quarter: state.quarter,
        seconds_remaining: state.seconds_remaining_in_quarter,
        score: state.score,
        total_live: market.total,
        spread_live: market.spread_home,
        pace_delta_total: pace.total.delta,
    });

    let rally_predictor = rally::classify(
        &RallyContext {
            pace_delta_total: pace.total.delta,
            ou_edge_pts: value.ou_edge_pts(),
            trend_direction: trend.direction,
            trend_strength: trend.strength,
            total_live: market.total,
            raw_pace_total,
            quarter: (state.quarter > 0).then_some(state.quarter),
        },
        &cfg.rally,
    );

    GamePayload {
        game: GameSummary {
            id: state.game_id.clone(),
            teams: state.teams.clone(),
            quarter: state.quarter,
            seconds_remaining: state.seconds_remaining_in_quarter,
            score: state.score,
        },
        market: MarketSummary {
            total_live: market.total,
            spread_live: market.spread_home,
            moneyline_home: market.moneyline_home,
            moneyline_away: market.moneyline_away,
            history: state.line_history.clone(),
        },
        technical,
        trend,
        pace,
        value,
        windows: input.windows.clone(),
        patterns,
        rally_predictor,
    }
}

/// Evaluate independent games in parallel, preserving input order
pub fn evaluate_all(inputs: &[GameInput], cfg: &SignalConfig) -> Vec<GamePayload> {
    let payloads: Vec<GamePayload> = inputs
        .par_iter()
        .map(|input| evaluate_game(input, cfg))
        .collect();

    for payload in &payloads {
        let prediction = &payload.rally_predictor;
        if prediction.state == RallyState::Neutral {
            debug!(
                "{} {}: NEUTRAL ({:?})",
                payload.game.id,
                payload.game.teams.matchup(),
                payload.technical.live_signal
            );
        } else {
            info!(
                "{} {}: {:?} {:?} conf={:.2} move={:.1}pts window={}s",
                payload.game.id,
                payload.game.teams.matchup(),
                prediction.state,
                prediction.edge_direction,
                prediction.confidence,
                prediction.expected_move_pts,
                prediction.signal_window_sec
            );
        }
    }

    payloads
}
