//! ESPN scoreboard feed
//!
//! Maps the public NBA scoreboard into per-game score and clock updates.
//! Finished games are dropped: only `pre` and `in` events are evaluated.

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::{GameId, Score, Teams};

const FEED: &str = "scoreboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Pre,
    In,
    Post,
}

impl GameStatus {
    fn parse(state: Option<&str>) -> Self {
        match state {
            Some("in") => GameStatus::In,
            Some("post") => GameStatus::Post,
            _ => GameStatus::Pre,
        }
    }
}

/// Score and clock of one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    pub game_id: GameId,
    pub teams: Teams,
    pub score: Score,
    pub quarter: u8,
    pub seconds_remaining_in_quarter: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub status: GameStatus,
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct ScoreboardResponse {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Debug, Deserialize)]
struct EspnEvent {
    id: String,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    status: EspnStatus,
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnStatus {
    #[serde(default)]
    period: u8,
    #[serde(default)]
    display_clock: Option<String>,
    #[serde(rename = "type", default)]
    kind: EspnStatusType,
}

#[derive(Debug, Default, Deserialize)]
struct EspnStatusType {
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EspnCompetition {
    #[serde(default)]
    competitors: Vec<EspnCompetitor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnCompetitor {
    #[serde(default)]
    home_away: Option<String>,
    #[serde(default)]
    team: EspnTeam,
    /// String on the public endpoint, number on some mirrors
    #[serde(default)]
    score: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EspnTeam {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    short_display_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl EspnTeam {
    fn label(&self) -> String {
        self.display_name
            .as_ref()
            .or(self.short_display_name.as_ref())
            .or(self.name.as_ref())
            .cloned()
            .unwrap_or_default()
    }
}

fn score_value(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as u32,
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Seconds left in the period from an `M:SS` display clock.
///
/// "Final", "End of ..." and "Halftime" read as 0, as does anything that is
/// not a two-part clock. Sub-minute clocks such as "24.3" are rounded.
pub fn parse_display_clock(clock: &str) -> u32 {
    let lower = clock.trim().to_lowercase();
    if lower.is_empty()
        || lower.contains("final")
        || lower.contains("end")
        || lower.contains("halftime")
    {
        return 0;
    }

    let parts: Vec<&str> = lower.split(':').collect();
    match parts.as_slice() {
        [minutes, seconds] => {
            let minutes: u32 = minutes.trim().parse().unwrap_or(0);
            let seconds: f64 = seconds.trim().parse().unwrap_or(0.0);
            minutes * 60 + seconds.round() as u32
        }
        [seconds] => seconds.parse::<f64>().map(|s| s.round() as u32).unwrap_or(0),
        _ => 0,
    }
}

/// ESPN dates omit seconds ("2025-01-10T00:30Z"); accept both forms
pub fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Decode a scoreboard body, keeping pre-game and in-progress games
pub fn parse_scoreboard(body: &str) -> Result<Vec<ScoreUpdate>, FeedError> {
    let response: ScoreboardResponse =
        serde_json::from_str(body).map_err(|e| FeedError::Decode {
            feed: FEED,
            message: e.to_string(),
        })?;

    let updates = response
        .events
        .into_iter()
        .filter_map(|event| {
            let status = GameStatus::parse(event.status.kind.state.as_deref());
            if status == GameStatus::Post {
                return None;
            }

            let competitors = &event.competitions.first()?.competitors;
            let side = |wanted: &str, fallback: usize| {
                competitors
                    .iter()
                    .find(|c| c.home_away.as_deref() == Some(wanted))
                    .or_else(|| competitors.get(fallback))
            };
            let home = side("home", 0)?;
            let away = side("away", 1)?;

            Some(ScoreUpdate {
                game_id: GameId::new(&event.id),
                teams: Teams::new(home.team.label(), away.team.label()),
                score: Score::new(score_value(home.score.as_ref()), score_value(away.score.as_ref())),
                quarter: event.status.period,
                seconds_remaining_in_quarter: event
                    .status
                    .display_clock
                    .as_deref()
                    .map(parse_display_clock)
                    .unwrap_or(0),
                start_time: event.date.as_deref().and_then(parse_event_date),
                status,
            })
        })
        .collect();

    Ok(updates)
}

// =============================================================================
// Client
// =============================================================================

#[derive(Clone)]
pub struct ScoreboardClient {
    http: Client,
    url: String,
}

impl ScoreboardClient {
    pub fn new(cfg: &FeedConfig) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| FeedError::from_reqwest(FEED, e))?;

        Ok(Self {
            http,
            url: cfg.scoreboard_url.clone(),
        })
    }

    pub async fn fetch(&self) -> Result<Vec<ScoreUpdate>, FeedError> {
        let body = self
            .http
            .get(&self.url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| FeedError::from_reqwest(FEED, e))?
            .text()
            .await
            .map_err(|e| FeedError::from_reqwest(FEED, e))?;

        let updates = parse_scoreboard(&body)?;
        debug!("Scoreboard returned {} active games", updates.len());
        Ok(updates)
    }
}
