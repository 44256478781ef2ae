//! Pre-game points expectation per matchup
//!
//! A JSON book of `{home_team, away_team, expected_home, expected_away}`
//! entries, with the configured league default for unknown matchups.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

use super::normalize_team;
use crate::config::ExpectationConfig;
use crate::{Expectation, Teams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectationEntry {
    pub home_team: String,
    pub away_team: String,
    pub expected_home: f64,
    pub expected_away: f64,
}

#[derive(Debug, Clone)]
pub struct ExpectationBook {
    default: Expectation,
    entries: HashMap<(String, String), Expectation>,
}

impl ExpectationBook {
    pub fn new(default: Expectation) -> Self {
        Self {
            default,
            entries: HashMap::new(),
        }
    }

    pub fn from_entries(default: Expectation, entries: Vec<ExpectationEntry>) -> Self {
        let mut book = Self::new(default);
        for entry in entries {
            book.insert(
                &Teams::new(entry.home_team, entry.away_team),
                Expectation {
                    home: entry.expected_home,
                    away: entry.expected_away,
                },
            );
        }
        book
    }

    pub fn load(path: impl AsRef<Path>, default: Expectation) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read expectation book {}", path.as_ref().display())
        })?;
        let entries: Vec<ExpectationEntry> =
            serde_json::from_str(&contents).context("Failed to parse expectation book")?;

        let book = Self::from_entries(default, entries);
        info!("Loaded {} matchup expectations", book.len());
        Ok(book)
    }

    pub fn from_config(cfg: &ExpectationConfig) -> Result<Self> {
        match &cfg.book_path {
            Some(path) => Self::load(path, cfg.default_expectation()),
            None => Ok(Self::new(cfg.default_expectation())),
        }
    }

    pub fn insert(&mut self, teams: &Teams, expectation: Expectation) {
        self.entries.insert(key(teams), expectation);
    }

    pub fn lookup(&self, teams: &Teams) -> Expectation {
        match self.entries.get(&key(teams)) {
            Some(expectation) => *expectation,
            None => {
                debug!("No expectation for {}, using default", teams.matchup());
                self.default
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(teams: &Teams) -> (String, String) {
    (normalize_team(&teams.home), normalize_team(&teams.away))
}
