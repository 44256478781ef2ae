// Snapshot Store
// SQLite-backed per-game market history with JSON backup
//
// One record per tracked game: open, pre-game close and live-last markers,
// a capped snapshot history and the capture timestamps of each marker.
// Records are kept in memory behind per-game locks and written through to
// SQLite on every update, so the store survives a process restart.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::{StoreConfig, WindowConfig};
use crate::error::{StoreError, StoreResult};
use crate::types::{GameId, LinePoint, Observation, ObservationError, Snapshot, Teams};
use crate::window::WindowReport;

// =============================================================================
// Data Models
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimestamps {
    pub created_at: DateTime<Utc>,
    pub open_captured_at: Option<DateTime<Utc>>,
    pub pregame_captured_at: Option<DateTime<Utc>>,
    pub live_updated_at: Option<DateTime<Utc>>,
}

/// Market history of one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameTimeSeries {
    pub game_id: GameId,
    pub teams: Teams,
    pub start_time: Option<DateTime<Utc>>,
    pub open_total: Option<f64>,
    pub open_spread: Option<f64>,
    pub pregame_close_total: Option<f64>,
    pub pregame_close_spread: Option<f64>,
    pub live_last_total: Option<f64>,
    pub live_last_spread: Option<f64>,
    pub timestamps: PhaseTimestamps,
    pub snapshots: VecDeque<Snapshot>,
}

impl GameTimeSeries {
    pub fn new(game_id: GameId, teams: Teams, created_at: DateTime<Utc>) -> Self {
        GameTimeSeries {
            game_id,
            teams,
            start_time: None,
            open_total: None,
            open_spread: None,
            pregame_close_total: None,
            pregame_close_spread: None,
            live_last_total: None,
            live_last_spread: None,
            timestamps: PhaseTimestamps {
                created_at,
                open_captured_at: None,
                pregame_captured_at: None,
                live_updated_at: None,
            },
            snapshots: VecDeque::new(),
        }
    }

    /// Fold one validated observation into the series.
    ///
    /// Open and pre-game close markers are write-once; live-last markers
    /// follow every post-start line. Only observations carrying a line are
    /// appended, and the history keeps the newest `max_snapshots` entries.
    pub fn apply(&mut self, obs: &Observation, max_snapshots: usize) {
        let now = obs.timestamp;

        if obs.start_time.is_some() {
            self.start_time = obs.start_time;
        }

        // Open
        if self.open_total.is_none() && obs.total.is_some() {
            self.open_total = obs.total;
            self.timestamps.open_captured_at = Some(now);
        }
        if self.open_spread.is_none() && obs.spread.is_some() {
            self.open_spread = obs.spread;
            self.timestamps.open_captured_at.get_or_insert(now);
        }

        if obs.game_started {
            // Pre-game close
            if self.pregame_close_total.is_none() && obs.total.is_some() {
                self.pregame_close_total = obs.total;
                self.timestamps.pregame_captured_at = Some(now);
            }
            if self.pregame_close_spread.is_none() && obs.spread.is_some() {
                self.pregame_close_spread = obs.spread;
                self.timestamps.pregame_captured_at.get_or_insert(now);
            }

            // Live last
            if obs.total.is_some() {
                self.live_last_total = obs.total;
                self.timestamps.live_updated_at = Some(now);
            }
            if obs.spread.is_some() {
                self.live_last_spread = obs.spread;
                self.timestamps.live_updated_at = Some(now);
            }
        }

        if obs.total.is_some() || obs.spread.is_some() {
            self.snapshots.push_back(Snapshot {
                timestamp: now,
                total: obs.total,
                spread: obs.spread,
            });
            while self.snapshots.len() > max_snapshots {
                self.snapshots.pop_front();
            }
        }
    }

    pub fn history(&self) -> Vec<Snapshot> {
        self.snapshots.iter().cloned().collect()
    }

    /// Trailing `len` non-null totals as `{seconds_ago, total}`, oldest first
    pub fn line_tape(&self, now: DateTime<Utc>, len: usize) -> Vec<LinePoint> {
        let mut tape: Vec<LinePoint> = self
            .snapshots
            .iter()
            .rev()
            .filter_map(|snap| {
                let total = snap.total?;
                let seconds_ago = (now - snap.timestamp).num_milliseconds() as f64 / 1000.0;
                Some(LinePoint::new(seconds_ago, total))
            })
            .take(len)
            .collect();
        tape.reverse();
        tape
    }

    pub fn latest_total(&self) -> Option<f64> {
        self.snapshots.iter().rev().find_map(|snap| snap.total)
    }

    pub fn latest_spread(&self) -> Option<f64> {
        self.snapshots.iter().rev().find_map(|snap| snap.spread)
    }
}

// =============================================================================
// Store Implementation
// =============================================================================

pub struct SnapshotStore {
    conn: Arc<Mutex<Connection>>,
    games: RwLock<HashMap<GameId, Arc<Mutex<GameTimeSeries>>>>,
    json_backup_path: Option<PathBuf>,
    max_snapshots: usize,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(
        db_path: P,
        json_backup_path: Option<PathBuf>,
        max_snapshots: usize,
    ) -> StoreResult<Self> {
        let db_path = db_path.as_ref();

        // Create parent directories
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        if let Some(parent) = json_backup_path.as_ref().and_then(|p| p.parent()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self::from_connection(conn, json_backup_path, max_snapshots)?;
        info!(
            "Snapshot store opened at {} ({} games)",
            db_path.display(),
            store.len()
        );
        Ok(store)
    }

    /// Non-durable store, mainly for tests and offline evaluation
    pub fn in_memory(max_snapshots: usize) -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?, None, max_snapshots)
    }

    pub fn from_config(cfg: &StoreConfig) -> StoreResult<Self> {
        Self::new(
            &cfg.db_path,
            cfg.json_backup_path.as_ref().map(PathBuf::from),
            cfg.max_snapshots,
        )
    }

    fn from_connection(
        conn: Connection,
        json_backup_path: Option<PathBuf>,
        max_snapshots: usize,
    ) -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            games: RwLock::new(HashMap::new()),
            json_backup_path,
            max_snapshots,
        };

        store.create_tables()?;
        store.load_all()?;
        Ok(store)
    }

    fn lock_conn(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Poisoned("sqlite connection"))
    }

    fn create_tables(&self) -> StoreResult<()> {
        let conn = self.lock_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS games (
                game_id TEXT PRIMARY KEY,
                record TEXT NOT NULL,
                updated_at TEXT
            )",
            [],
        )?;

        debug!("Database schema created/verified");
        Ok(())
    }

    fn load_all(&self) -> StoreResult<()> {
        let rows: Vec<(String, String)> = {
            let conn = self.lock_conn()?;
            let mut stmt = conn.prepare("SELECT game_id, record FROM games")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut games = self
            .games
            .write()
            .map_err(|_| StoreError::Poisoned("game map"))?;

        for (game_id, record) in rows {
            match serde_json::from_str::<GameTimeSeries>(&record) {
                Ok(series) => {
                    games.insert(series.game_id.clone(), Arc::new(Mutex::new(series)));
                }
                Err(e) => warn!("Skipping unreadable record for game {}: {}", game_id, e),
            }
        }

        debug!("Loaded {} game records", games.len());
        Ok(())
    }

    fn persist(&self, series: &GameTimeSeries) -> StoreResult<()> {
        let record = serde_json::to_string(series)?;
        let conn = self.lock_conn()?;

        conn.execute(
            "INSERT OR REPLACE INTO games (game_id, record, updated_at)
             VALUES (?1, ?2, ?3)",
            params![series.game_id.as_str(), record, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    fn entry(&self, obs: &Observation) -> StoreResult<Arc<Mutex<GameTimeSeries>>> {
        {
            let games = self
                .games
                .read()
                .map_err(|_| StoreError::Poisoned("game map"))?;
            if let Some(entry) = games.get(&obs.game_id) {
                return Ok(Arc::clone(entry));
            }
        }

        let mut games = self
            .games
            .write()
            .map_err(|_| StoreError::Poisoned("game map"))?;
        let entry = games.entry(obs.game_id.clone()).or_insert_with(|| {
            debug!("Tracking new game {} ({})", obs.game_id, obs.teams.matchup());
            Arc::new(Mutex::new(GameTimeSeries::new(
                obs.game_id.clone(),
                obs.teams.clone(),
                obs.timestamp,
            )))
        });
        Ok(Arc::clone(entry))
    }

    /// Record one market observation and write the game's record through.
    ///
    /// An observation with neither line still creates the series (and
    /// refreshes its start time) but appends nothing. Non-finite lines are
    /// rejected before anything is touched.
    pub fn record_observation(&self, obs: &Observation) -> StoreResult<GameTimeSeries> {
        match obs.validate() {
            Ok(()) | Err(ObservationError::Empty { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let entry = self.entry(obs)?;
        let mut series = entry
            .lock()
            .map_err(|_| StoreError::Poisoned("game series"))?;

        // Commit in memory only once the row is written
        let mut updated = series.clone();
        updated.apply(obs, self.max_snapshots);
        self.persist(&updated)?;
        *series = updated;

        debug!(
            "Recorded {} total={:?} spread={:?} ({} snapshots)",
            obs.game_id,
            obs.total,
            obs.spread,
            series.snapshots.len()
        );

        Ok(series.clone())
    }

    pub fn get(&self, game_id: &GameId) -> Option<GameTimeSeries> {
        let entry = {
            let games = self.games.read().ok()?;
            Arc::clone(games.get(game_id)?)
        };
        let series = entry.lock().ok()?;
        Some(series.clone())
    }

    pub fn game_ids(&self) -> Vec<GameId> {
        self.games
            .read()
            .map(|games| games.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.games.read().map(|games| games.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pre-game and live window deltas for a game
    pub fn window_report(
        &self,
        game_id: &GameId,
        now: DateTime<Utc>,
        cfg: &WindowConfig,
    ) -> Option<WindowReport> {
        let series = self.get(game_id)?;
        Some(WindowReport::compute(
            &series.history(),
            series.start_time,
            now,
            cfg,
        ))
    }

    pub fn line_tape(&self, game_id: &GameId, now: DateTime<Utc>, len: usize) -> Vec<LinePoint> {
        self.get(game_id)
            .map(|series| series.line_tape(now, len))
            .unwrap_or_default()
    }

    /// Drop games whose scheduled start is older than `cutoff`
    pub fn purge_before(&self, cutoff: DateTime<Utc>) -> StoreResult<usize> {
        let expired: Vec<GameId> = {
            let games = self
                .games
                .read()
                .map_err(|_| StoreError::Poisoned("game map"))?;
            games
                .iter()
                .filter_map(|(id, entry)| {
                    let series = entry.lock().ok()?;
                    match series.start_time {
                        Some(start) if start < cutoff => Some(id.clone()),
                        _ => None,
                    }
                })
                .collect()
        };

        if expired.is_empty() {
            return Ok(0);
        }

        {
            let mut games = self
                .games
                .write()
                .map_err(|_| StoreError::Poisoned("game map"))?;
            for id in &expired {
                games.remove(id);
            }
        }

        let conn = self.lock_conn()?;
        for id in &expired {
            conn.execute("DELETE FROM games WHERE game_id = ?1", params![id.as_str()])?;
        }

        info!("Purged {} finished games", expired.len());
        Ok(expired.len())
    }

    /// Purge using a retention horizon relative to `now`
    pub fn apply_retention(&self, now: DateTime<Utc>, retention_hours: i64) -> StoreResult<usize> {
        self.purge_before(now - Duration::hours(retention_hours))
    }

    /// Write every record to the JSON backup, keyed by game id
    pub fn export_json(&self) -> StoreResult<()> {
        let Some(path) = &self.json_backup_path else {
            return Ok(());
        };

        let entries: Vec<Arc<Mutex<GameTimeSeries>>> = {
            let games = self
                .games
                .read()
                .map_err(|_| StoreError::Poisoned("game map"))?;
            games.values().cloned().collect()
        };

        let mut snapshot = BTreeMap::new();
        for entry in entries {
            let series = entry
                .lock()
                .map_err(|_| StoreError::Poisoned("game series"))?;
            snapshot.insert(series.game_id.to_string(), series.clone());
        }

        std::fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        debug!("Store exported to: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn obs(
        id: &str,
        at: DateTime<Utc>,
        total: Option<f64>,
        spread: Option<f64>,
        started: bool,
    ) -> Observation {
        Observation {
            game_id: GameId::new(id),
            teams: Teams::new("Denver Nuggets", "Phoenix Suns"),
            start_time: None,
            timestamp: at,
            total,
            spread,
            game_started: started,
        }
    }

    #[test]
    fn test_open_is_write_once() {
        let store = SnapshotStore::in_memory(120).unwrap();
        let t0 = Utc::now();
        store
            .record_observation(&obs("g1", t0, Some(225.5), None, false))
            .unwrap();
        let series = store
            .record_observation(&obs("g1", t0 + Duration::seconds(30), Some(227.0), Some(-3.0), false))
            .unwrap();

        assert_eq!(series.open_total, Some(225.5));
        assert_eq!(series.open_spread, Some(-3.0));
        assert_eq!(series.timestamps.open_captured_at, Some(t0));
        assert_eq!(series.pregame_close_total, None);
        assert_eq!(series.live_last_total, None);
        assert_eq!(series.snapshots.len(), 2);
    }

    #[test]
    fn test_pregame_close_and_live_last() {
        let store = SnapshotStore::in_memory(120).unwrap();
        let t0 = Utc::now();
        store
            .record_observation(&obs("g1", t0, Some(225.5), Some(-2.5), false))
            .unwrap();
        store
            .record_observation(&obs("g1", t0 + Duration::seconds(60), Some(226.5), None, true))
            .unwrap();
        let series = store
            .record_observation(&obs("g1", t0 + Duration::seconds(90), Some(229.0), Some(-4.0), true))
            .unwrap();

        assert_eq!(series.open_total, Some(225.5));
        assert_eq!(series.pregame_close_total, Some(226.5));
        assert_eq!(series.pregame_close_spread, Some(-4.0));
        assert_eq!(series.live_last_total, Some(229.0));
        assert_eq!(series.live_last_spread, Some(-4.0));
        assert_eq!(
            series.timestamps.live_updated_at,
            Some(t0 + Duration::seconds(90))
        );
    }

    #[test]
    fn test_empty_observation_is_not_appended() {
        let store = SnapshotStore::in_memory(120).unwrap();
        let series = store
            .record_observation(&obs("g1", Utc::now(), None, None, false))
            .unwrap();
        assert!(series.snapshots.is_empty());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_line_is_rejected() {
        let store = SnapshotStore::in_memory(120).unwrap();
        let err = store
            .record_observation(&obs("g1", Utc::now(), Some(f64::NAN), None, false))
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_write_leaves_record_untouched() {
        let store = SnapshotStore::in_memory(120).unwrap();
        let t0 = Utc::now();
        store
            .record_observation(&obs("g1", t0, Some(225.5), None, false))
            .unwrap();

        store
            .lock_conn()
            .unwrap()
            .execute("DROP TABLE games", [])
            .unwrap();

        let err = store
            .record_observation(&obs("g1", t0 + Duration::seconds(30), Some(228.0), None, true))
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));

        let series = store.get(&GameId::new("g1")).unwrap();
        assert_eq!(series.snapshots.len(), 1);
        assert_eq!(series.latest_total(), Some(225.5));
        assert_eq!(series.pregame_close_total, None);
        assert_eq!(series.live_last_total, None);
    }

    #[test]
    fn test_retention_evicts_oldest() {
        let store = SnapshotStore::in_memory(5).unwrap();
        let t0 = Utc::now();
        for i in 0..8 {
            store
                .record_observation(&obs(
                    "g1",
                    t0 + Duration::seconds(i),
                    Some(220.0 + i as f64),
                    None,
                    false,
                ))
                .unwrap();
        }
        let series = store.get(&GameId::new("g1")).unwrap();
        assert_eq!(series.snapshots.len(), 5);
        assert_eq!(series.snapshots[0].total, Some(223.0));
        assert_eq!(series.open_total, Some(220.0));
    }

    #[test]
    fn test_line_tape_skips_null_totals() {
        let store = SnapshotStore::in_memory(120).unwrap();
        let t0 = Utc::now();
        store.record_observation(&obs("g1", t0, Some(220.0), None, true)).unwrap();
        store
            .record_observation(&obs("g1", t0 + Duration::seconds(10), None, Some(-2.0), true))
            .unwrap();
        store
            .record_observation(&obs("g1", t0 + Duration::seconds(20), Some(221.0), None, true))
            .unwrap();
        store
            .record_observation(&obs("g1", t0 + Duration::seconds(30), Some(222.0), None, true))
            .unwrap();

        let now = t0 + Duration::seconds(40);
        let tape = store.line_tape(&GameId::new("g1"), now, 2);
        assert_eq!(tape.len(), 2);
        assert_abs_diff_eq!(tape[0].seconds_ago, 20.0);
        assert_abs_diff_eq!(tape[0].total, 221.0);
        assert_abs_diff_eq!(tape[1].seconds_ago, 10.0);
        assert!(store.line_tape(&GameId::new("missing"), now, 5).is_empty());
    }

    #[test]
    fn test_window_report_uses_start_time() {
        let store = SnapshotStore::in_memory(120).unwrap();
        let now = Utc::now();
        let start = now - Duration::seconds(100);
        for (ago, total) in [(250, 220.0), (120, 221.5), (90, 222.0), (10, 225.0)] {
            let mut o = obs("g1", now - Duration::seconds(ago), Some(total), None, ago < 100);
            o.start_time = Some(start);
            store.record_observation(&o).unwrap();
        }

        let report = store
            .window_report(&GameId::new("g1"), now, &WindowConfig::default())
            .unwrap();
        assert_abs_diff_eq!(report.total_pregame.delta.unwrap(), 1.5);
        assert_abs_diff_eq!(report.total_live.delta.unwrap(), 3.0);
    }

    #[test]
    fn test_reopen_restores_records() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("odds_window.db");
        let backup = dir.path().join("odds_window.json");

        {
            let store = SnapshotStore::new(&db, Some(backup.clone()), 120).unwrap();
            store
                .record_observation(&obs("g1", Utc::now(), Some(224.0), Some(-1.5), false))
                .unwrap();
            store.export_json().unwrap();
        }

        let store = SnapshotStore::new(&db, Some(backup.clone()), 120).unwrap();
        let series = store.get(&GameId::new("g1")).unwrap();
        assert_eq!(series.open_total, Some(224.0));
        assert_eq!(series.teams.home, "Denver Nuggets");

        let json = std::fs::read_to_string(&backup).unwrap();
        assert!(json.contains("openTotal"));
        assert!(json.contains("\"g1\""));
    }

    #[test]
    fn test_purge_before_removes_old_games() {
        let store = SnapshotStore::in_memory(120).unwrap();
        let now = Utc::now();
        let mut old = obs("old", now, Some(220.0), None, true);
        old.start_time = Some(now - Duration::hours(48));
        let mut fresh = obs("fresh", now, Some(220.0), None, false);
        fresh.start_time = Some(now + Duration::hours(2));
        store.record_observation(&old).unwrap();
        store.record_observation(&fresh).unwrap();

        assert_eq!(store.apply_retention(now, 36).unwrap(), 1);
        assert!(store.get(&GameId::new("old")).is_none());
        assert!(store.get(&GameId::new("fresh")).is_some());
    }
}
