//! Watch Command
//!
//! Live polling loop:
//! - Scores and odds fetched through short-lived caches with jittered TTLs
//! - One store observation per freshly fetched odds event
//! - Parallel evaluation of every tracked game
//! - Signals written as a JSON array each tick
//! - Graceful shutdown on Ctrl+C

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use courtline::feeds::{
    jittered, join_games, ExpectationBook, OddsClient, OddsUpdate, ScoreUpdate, ScoreboardClient,
    TtlCache,
};
use courtline::rally::RallyState;
use courtline::{evaluate_all, Config, GameInput, GamePayload, LiveGameState, SnapshotStore};

const SCORES_KEY: &str = "scoreboard";
const ODDS_KEY: &str = "odds";

/// Result of one feed read
struct FeedRead<T> {
    items: Vec<T>,
    /// Fetched from upstream this tick rather than served from cache
    fresh: bool,
}

struct Watcher {
    config: Config,
    store: SnapshotStore,
    scoreboard: ScoreboardClient,
    odds: OddsClient,
    score_cache: TtlCache<&'static str, Vec<ScoreUpdate>>,
    odds_cache: TtlCache<&'static str, Vec<OddsUpdate>>,
    expectations: ExpectationBook,
    tick_count: u64,
}

impl Watcher {
    fn new(config: Config) -> Result<Self> {
        let store = SnapshotStore::from_config(&config.store).context("Failed to open snapshot store")?;
        let scoreboard =
            ScoreboardClient::new(&config.feeds).context("Failed to build scoreboard client")?;
        let odds = OddsClient::new(&config.feeds).context("Failed to build odds client")?;
        let expectations = ExpectationBook::from_config(&config.expectations)?;

        if config.feeds.odds_api_key.is_none() {
            warn!("THEODDSAPI_KEY not set, odds feed will return no data");
        }

        Ok(Watcher {
            config,
            store,
            scoreboard,
            odds,
            score_cache: TtlCache::new(),
            odds_cache: TtlCache::new(),
            expectations,
            tick_count: 0,
        })
    }

    /// Cached or freshly fetched scores; `None` when the poll failed
    async fn read_scores(&self) -> Option<FeedRead<ScoreUpdate>> {
        if let Some(items) = self.score_cache.get(&SCORES_KEY).await {
            return Some(FeedRead { items, fresh: false });
        }

        match self.scoreboard.fetch().await {
            Ok(items) => {
                let feeds = &self.config.feeds;
                let ttl = jittered(feeds.score_ttl_min_ms, feeds.score_ttl_max_ms);
                self.score_cache.insert(SCORES_KEY, items.clone(), ttl).await;
                Some(FeedRead { items, fresh: true })
            }
            Err(e) => {
                warn!("Scoreboard poll failed, skipping games in progress: {}", e);
                None
            }
        }
    }

    /// Cached or freshly fetched odds; `None` when the poll failed
    async fn read_odds(&self) -> Option<FeedRead<OddsUpdate>> {
        if let Some(items) = self.odds_cache.get(&ODDS_KEY).await {
            return Some(FeedRead { items, fresh: false });
        }

        match self.odds.fetch().await {
            Ok(items) => {
                let feeds = &self.config.feeds;
                let ttl = jittered(feeds.odds_ttl_min_ms, feeds.odds_ttl_max_ms);
                self.odds_cache.insert(ODDS_KEY, items.clone(), ttl).await;
                Some(FeedRead { items, fresh: true })
            }
            Err(e) => {
                warn!("Odds poll failed, skipping evaluation this tick: {}", e);
                None
            }
        }
    }

    async fn tick(&mut self) -> Result<Vec<GamePayload>> {
        self.tick_count += 1;
        let now = Utc::now();

        let scores = self.read_scores().await;
        let Some(odds) = self.read_odds().await else {
            info!(
                "Tick {}: no odds, store and signals left as they were ({} tracked)",
                self.tick_count,
                self.store.len()
            );
            return Ok(Vec::new());
        };

        let mut recorded = 0;
        if odds.fresh {
            for update in &odds.items {
                match self.store.record_observation(&update.observation(now)) {
                    Ok(_) => recorded += 1,
                    Err(e) => warn!("Skipping observation for {}: {}", update.game_id, e),
                }
            }
        }

        let inputs = build_inputs(
            &odds.items,
            scores.as_ref().map(|read| read.items.as_slice()),
            &self.store,
            &self.expectations,
            &self.config,
            now,
        );
        let payloads = evaluate_all(&inputs, &self.config.signals);

        write_payloads(&self.config.feeds.output_path, &payloads)?;
        if let Err(e) = self.store.export_json() {
            warn!("Store backup failed: {}", e);
        }
        match self.store.apply_retention(now, self.config.store.retention_hours) {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} finished games from the store", purged),
            Err(e) => warn!("Retention pass failed: {}", e),
        }

        let active = payloads
            .iter()
            .filter(|p| p.rally_predictor.state != RallyState::Neutral)
            .count();
        let score_status = match &scores {
            Some(read) if read.fresh => "fresh",
            Some(_) => "cached",
            None => "failed",
        };
        info!(
            "Tick {}: {} of {} games evaluated (scores {}, {} recorded), {} active signals, {} tracked",
            self.tick_count,
            payloads.len(),
            odds.items.len(),
            score_status,
            recorded,
            active,
            self.store.len()
        );

        Ok(payloads)
    }

    fn next_wait(&self, interval_override: Option<u64>) -> Duration {
        match interval_override {
            Some(secs) => Duration::from_secs(secs),
            None => jittered(
                self.config.feeds.poll_interval_min_ms,
                self.config.feeds.poll_interval_max_ms,
            ),
        }
    }

    fn shutdown(&self) {
        if let Err(e) = self.store.export_json() {
            error!("Final store backup failed: {}", e);
        }
        info!("Watcher stopped after {} ticks", self.tick_count);
    }
}

/// One `GameInput` per odds event, joined with its score when the
/// scoreboard lists the same matchup. Games without a score are pre-game.
///
/// `scores` is `None` when the scoreboard poll failed: games that have
/// already started are then skipped, since their clock and score are unknown.
fn build_inputs(
    odds: &[OddsUpdate],
    scores: Option<&[ScoreUpdate]>,
    store: &SnapshotStore,
    expectations: &ExpectationBook,
    config: &Config,
    now: DateTime<Utc>,
) -> Vec<GameInput> {
    let scores_available = scores.is_some();

    join_games(odds, scores.unwrap_or_default())
        .into_iter()
        .filter(|(event, _)| {
            let keep = scores_available || !event.has_started(now);
            if !keep {
                debug!("Skipping {} without a score this tick", event.teams.matchup());
            }
            keep
        })
        .map(|(event, score)| {
            let (score, quarter, clock) = match score {
                Some(s) => (s.score, s.quarter, s.seconds_remaining_in_quarter),
                None => {
                    debug!("No scoreboard entry for {}", event.teams.matchup());
                    (Default::default(), 0, config.signals.pace.quarter_secs)
                }
            };

            GameInput {
                state: LiveGameState {
                    game_id: event.game_id.clone(),
                    teams: event.teams.clone(),
                    score,
                    quarter,
                    seconds_remaining_in_quarter: clock,
                    line_history: store.line_tape(&event.game_id, now, config.store.line_tape_len),
                },
                expectation: expectations.lookup(&event.teams),
                market: event.quote,
                windows: store.window_report(&event.game_id, now, &config.signals.window),
            }
        })
        .collect()
}

fn write_payloads(path: &str, payloads: &[GamePayload]) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(payloads)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write signals to {}", path))?;
    debug!("Signals written to {}", path);
    Ok(())
}

pub fn run(config_path: String, interval: Option<u64>, once: bool) -> Result<()> {
    info!("Starting watcher");

    let config = Config::load_or_default(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config, interval, once))
}

async fn run_async(config: Config, interval: Option<u64>, once: bool) -> Result<()> {
    let mut watcher = Watcher::new(config)?;
    info!(
        "Watching {} stored games, output: {}",
        watcher.store.len(),
        watcher.config.feeds.output_path
    );

    loop {
        if let Err(e) = watcher.tick().await {
            error!("Tick {} failed: {:#}", watcher.tick_count, e);
        }
        if once {
            break;
        }

        let wait = watcher.next_wait(interval);
        tokio::select! {
            _ = sleep(wait) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, initiating shutdown...");
                break;
            }
        }
    }

    watcher.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use courtline::feeds::GameStatus;
    use courtline::{GameId, MarketQuote, Score, Teams};

    fn odds_event(id: &str, home: &str, away: &str, commence: DateTime<Utc>) -> OddsUpdate {
        OddsUpdate {
            game_id: GameId::new(id),
            teams: Teams::new(home, away),
            commence_time: commence,
            quote: MarketQuote {
                total: Some(221.5),
                spread_home: Some(-4.5),
                moneyline_home: Some(-180.0),
                moneyline_away: Some(155.0),
            },
        }
    }

    #[test]
    fn test_build_inputs_joins_scores_and_store() {
        let config = Config::default();
        let store = SnapshotStore::in_memory(config.store.max_snapshots).unwrap();
        let book = ExpectationBook::from_config(&config.expectations).unwrap();

        let start = Utc::now() - ChronoDuration::minutes(30);
        let live = odds_event("g1", "Boston Celtics", "Miami Heat", start);
        let later = odds_event("g2", "LA Clippers", "Utah Jazz", start + ChronoDuration::hours(3));

        for i in 0..3 {
            let at = start + ChronoDuration::minutes(5 + i);
            let mut obs = live.observation(at);
            obs.total = Some(221.5 + i as f64);
            store.record_observation(&obs).unwrap();
        }

        let scores = vec![ScoreUpdate {
            game_id: GameId::new("espn-1"),
            teams: Teams::new("Boston Celtics", "Miami Heat"),
            score: Score::new(60, 55),
            quarter: 2,
            seconds_remaining_in_quarter: 300,
            start_time: Some(start),
            status: GameStatus::In,
        }];

        let now = start + ChronoDuration::minutes(8);
        let inputs = build_inputs(
            &[live.clone(), later],
            Some(&scores),
            &store,
            &book,
            &config,
            now,
        );

        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].state.quarter, 2);
        assert_eq!(inputs[0].state.score, Score::new(60, 55));
        assert_eq!(inputs[0].state.line_history.len(), 3);
        assert!(inputs[0].windows.is_some());

        assert_eq!(inputs[1].state.quarter, 0);
        assert_eq!(inputs[1].state.seconds_remaining_in_quarter, 720);
        assert!(inputs[1].state.line_history.is_empty());
        assert!(inputs[1].windows.is_none());
    }

    #[test]
    fn test_build_inputs_without_scores_keeps_pregame_only() {
        let config = Config::default();
        let store = SnapshotStore::in_memory(config.store.max_snapshots).unwrap();
        let book = ExpectationBook::from_config(&config.expectations).unwrap();

        let now = Utc::now();
        let live = odds_event("g1", "Boston Celtics", "Miami Heat", now - ChronoDuration::minutes(30));
        let later = odds_event("g2", "LA Clippers", "Utah Jazz", now + ChronoDuration::hours(2));

        let inputs = build_inputs(&[live, later], None, &store, &book, &config, now);

        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].state.game_id, GameId::new("g2"));
        assert_eq!(inputs[0].state.quarter, 0);
    }

    #[tokio::test]
    async fn test_failed_polls_leave_store_and_output_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("signals.json");

        let mut config = Config::default();
        config.store.db_path = dir.path().join("courtline.db").to_string_lossy().into_owned();
        config.store.json_backup_path = None;
        config.feeds.scoreboard_url = "http://127.0.0.1:1/scoreboard".to_string();
        config.feeds.odds_url = "http://127.0.0.1:1/odds".to_string();
        config.feeds.odds_api_key = Some("test-key".to_string());
        config.feeds.request_timeout_secs = 1;
        config.feeds.output_path = output.to_string_lossy().into_owned();

        let mut watcher = Watcher::new(config).unwrap();

        let start = Utc::now() - ChronoDuration::minutes(20);
        let event = odds_event("g1", "Boston Celtics", "Miami Heat", start);
        watcher
            .store
            .record_observation(&event.observation(start + ChronoDuration::minutes(5)))
            .unwrap();
        let before = watcher.store.get(&GameId::new("g1")).unwrap();

        let payloads = watcher.tick().await.unwrap();

        assert!(payloads.is_empty());
        assert!(!output.exists());
        assert_eq!(watcher.store.len(), 1);
        assert_eq!(watcher.store.get(&GameId::new("g1")).unwrap(), before);
        assert_eq!(watcher.tick_count, 1);
    }

    #[test]
    fn test_write_payloads_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("signals.json");
        write_payloads(path.to_str().unwrap(), &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }
}
