//! The Odds API feed
//!
//! One request returns every NBA event with its bookmakers. For each market
//! the first bookmaker offering it wins: totals take the Over point, spreads
//! the home point, h2h both American prices.

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::{GameId, MarketQuote, Observation, Teams};

const FEED: &str = "odds";

/// Market lines of one event at fetch time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsUpdate {
    pub game_id: GameId,
    pub teams: Teams,
    pub commence_time: DateTime<Utc>,
    pub quote: MarketQuote,
}

impl OddsUpdate {
    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        now >= self.commence_time
    }

    /// Snapshot-store observation of the total and home spread
    pub fn observation(&self, now: DateTime<Utc>) -> Observation {
        Observation {
            game_id: self.game_id.clone(),
            teams: self.teams.clone(),
            start_time: Some(self.commence_time),
            timestamp: now,
            total: self.quote.total,
            spread: self.quote.spread_home,
            game_started: self.has_started(now),
        }
    }
}

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Deserialize)]
struct OddsEvent {
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    #[serde(default)]
    bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    #[serde(default)]
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    #[serde(default)]
    outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    name: String,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    point: Option<f64>,
}

impl OddsEvent {
    fn first_market<T>(&self, key: &str, pick: impl Fn(&Market) -> Option<T>) -> Option<T> {
        self.bookmakers
            .iter()
            .flat_map(|book| book.markets.iter())
            .filter(|market| market.key == key)
            .find_map(pick)
    }

    fn quote(&self) -> MarketQuote {
        let outcome_named = |market: &Market, name: &str| {
            market
                .outcomes
                .iter()
                .find(|o| o.name.eq_ignore_ascii_case(name))
                .map(|o| (o.price, o.point))
        };

        let total = self.first_market("totals", |m| outcome_named(m, "over")?.1);
        let spread_home = self.first_market("spreads", |m| outcome_named(m, &self.home_team)?.1);
        let moneyline = self.first_market("h2h", |m| {
            let home = outcome_named(m, &self.home_team)?.0?;
            let away = outcome_named(m, &self.away_team).and_then(|(price, _)| price);
            Some((home, away))
        });

        MarketQuote {
            total,
            spread_home,
            moneyline_home: moneyline.map(|(home, _)| home),
            moneyline_away: moneyline.and_then(|(_, away)| away),
        }
    }
}

/// Decode an odds body into one update per event
pub fn parse_odds(body: &str) -> Result<Vec<OddsUpdate>, FeedError> {
    let events: Vec<OddsEvent> = serde_json::from_str(body).map_err(|e| FeedError::Decode {
        feed: FEED,
        message: e.to_string(),
    })?;

    Ok(events
        .into_iter()
        .map(|event| OddsUpdate {
            game_id: GameId::new(&event.id),
            teams: Teams::new(event.home_team.clone(), event.away_team.clone()),
            commence_time: event.commence_time,
            quote: event.quote(),
        })
        .collect())
}

// =============================================================================
// Client
// =============================================================================

#[derive(Clone)]
pub struct OddsClient {
    http: Client,
    url: String,
    api_key: Option<String>,
    regions: String,
    markets: String,
    bookmakers: Option<String>,
}

impl OddsClient {
    pub fn new(cfg: &FeedConfig) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .map_err(|e| FeedError::from_reqwest(FEED, e))?;

        Ok(Self {
            http,
            url: cfg.odds_url.clone(),
            api_key: cfg.odds_api_key.clone(),
            regions: cfg.regions.clone(),
            markets: cfg.markets.clone(),
            bookmakers: cfg.bookmakers.clone(),
        })
    }

    pub async fn fetch(&self) -> Result<Vec<OddsUpdate>, FeedError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| FeedError::NotConfigured {
            feed: FEED,
            message: "THEODDSAPI_KEY is not set".to_string(),
        })?;

        let mut query = vec![
            ("apiKey", api_key),
            ("regions", self.regions.as_str()),
            ("markets", self.markets.as_str()),
            ("oddsFormat", "american"),
        ];
        if let Some(bookmakers) = self.bookmakers.as_deref() {
            query.push(("bookmakers", bookmakers));
        }

        let body = self
            .http
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| FeedError::from_reqwest(FEED, e))?
            .text()
            .await
            .map_err(|e| FeedError::from_reqwest(FEED, e))?;

        let updates = parse_odds(&body)?;
        debug!("Odds feed returned {} events", updates.len());
        Ok(updates)
    }
}
