//! Trailing-window line deltas
//!
//! Net change of a market line across a trailing time window, restricted to
//! either the pre-game or the live phase, plus the rally/collapse label for
//! that change.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::WindowConfig;
use crate::{Snapshot, Tracked};

/// Market phase of a snapshot relative to the scheduled start
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreGame,
    Live,
}

impl Phase {
    /// Phase filter: pre-game is strictly before start, live is at or after.
    /// Without a known start time everything counts as pre-game.
    pub fn contains(self, at: DateTime<Utc>, start: Option<DateTime<Utc>>) -> bool {
        match (self, start) {
            (Phase::PreGame, Some(start)) => at < start,
            (Phase::Live, Some(start)) => at >= start,
            (Phase::PreGame, None) => true,
            (Phase::Live, None) => false,
        }
    }
}

/// Classification of a window delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowSignal {
    NascentRally,
    NascentCollapse,
    LiveRally,
    LiveCollapse,
    Neutral,
}

/// Net change `last - first` of the tracked value over the entries with
/// `0 <= now - t <= window` that pass `phase_filter`.
///
/// Returns `None` with fewer than two matching entries or when the first or
/// last matching entry has no value for the tracked line.
pub fn delta<F>(
    history: &[Snapshot],
    now: DateTime<Utc>,
    window: Duration,
    tracked: Tracked,
    phase_filter: F,
) -> Option<f64>
where
    F: Fn(DateTime<Utc>) -> bool,
{
    let in_window: Vec<&Snapshot> = history
        .iter()
        .filter(|snap| {
            let age = now - snap.timestamp;
            age >= Duration::zero() && age <= window && phase_filter(snap.timestamp)
        })
        .collect();

    if in_window.len() < 2 {
        return None;
    }

    let first = tracked.value(in_window[0])?;
    let last = tracked.value(in_window[in_window.len() - 1])?;

    Some(last - first)
}

/// Label a delta using the threshold of its phase
pub fn classify(phase: Phase, delta: Option<f64>, cfg: &WindowConfig) -> WindowSignal {
    let Some(delta) = delta else {
        return WindowSignal::Neutral;
    };

    match phase {
        Phase::PreGame if delta >= cfg.pregame_threshold => WindowSignal::NascentRally,
        Phase::PreGame if delta <= -cfg.pregame_threshold => WindowSignal::NascentCollapse,
        Phase::Live if delta >= cfg.live_threshold => WindowSignal::LiveRally,
        Phase::Live if delta <= -cfg.live_threshold => WindowSignal::LiveCollapse,
        _ => WindowSignal::Neutral,
    }
}

/// Delta and label for one phase window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseWindow {
    pub phase: Phase,
    pub delta: Option<f64>,
    pub signal: WindowSignal,
}

/// Pre-game and live window readings for the total and spread lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub total_pregame: PhaseWindow,
    pub total_live: PhaseWindow,
    pub spread_pregame: PhaseWindow,
    pub spread_live: PhaseWindow,
}

impl WindowReport {
    pub fn compute(
        history: &[Snapshot],
        start: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        cfg: &WindowConfig,
    ) -> Self {
        let reading = |phase: Phase, tracked: Tracked| {
            let window = match phase {
                Phase::PreGame => Duration::seconds(cfg.pregame_window_secs),
                Phase::Live => Duration::seconds(cfg.live_window_secs),
            };
            let d = delta(history, now, window, tracked, |t| phase.contains(t, start));
            PhaseWindow {
                phase,
                delta: d,
                signal: classify(phase, d, cfg),
            }
        };

        WindowReport {
            total_pregame: reading(Phase::PreGame, Tracked::Total),
            total_live: reading(Phase::Live, Tracked::Total),
            spread_pregame: reading(Phase::PreGame, Tracked::Spread),
            spread_live: reading(Phase::Live, Tracked::Spread),
        }
    }
}
