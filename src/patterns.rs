//! Similarity of the live game state to a few base game profiles
//!
//! Features are z-scored with fixed heuristic (mean, std) pairs and compared
//! by Euclidean distance; similarity is `1 / (1 + d)`.

use serde::{Deserialize, Serialize};

use crate::types::round3;
use crate::Score;

/// (mean, std) per feature, in feature order
const NORMS: [(f64, f64); 5] = [
    (2.5, 1.0),     // quarter
    (360.0, 180.0), // seconds remaining in quarter
    (0.0, 12.0),    // home margin
    (225.0, 12.0),  // live total
    (0.0, 20.0),    // pace delta vs expectation
];

pub const FEATURE_COUNT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileKey {
    HomeFav,
    HomeDog,
    AwayFav,
    AwayDog,
}

impl ProfileKey {
    pub fn label(self) -> &'static str {
        match self {
            ProfileKey::HomeFav => "Home favorite",
            ProfileKey::HomeDog => "Home underdog",
            ProfileKey::AwayFav => "Away favorite",
            ProfileKey::AwayDog => "Away underdog",
        }
    }

    fn alert(self) -> &'static str {
        match self {
            ProfileKey::HomeFav => {
                "Typical home-favorite dynamics (possible pressure toward OVER if the pace delta is positive)."
            }
            ProfileKey::HomeDog => {
                "Home underdog: pace tends to be erratic; watch for swings and a situational UNDER."
            }
            ProfileKey::AwayFav => {
                "Away favorite controlling the tempo; look for value on short spreads or ML if there is an edge."
            }
            ProfileKey::AwayDog => {
                "Away underdog pushing: consider live spreads in their favor and UNDER if the pace drops."
            }
        }
    }
}

/// Raw live inputs of the feature vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveFeatures {
    pub quarter: u8,
    pub seconds_remaining: u32,
    pub score: Score,
    pub total_live: Option<f64>,
    pub spread_live: Option<f64>,
    pub pace_delta_total: f64,
}

impl LiveFeatures {
    /// Normalised vector. A missing line reads as its mean; the home team is
    /// favored when the live spread is negative.
    pub fn vector(&self) -> [f64; FEATURE_COUNT] {
        let home_fav = matches!(self.spread_live, Some(s) if s < 0.0);
        features(
            self.quarter as f64,
            self.seconds_remaining as f64,
            self.score.margin_home() as f64,
            self.total_live.unwrap_or(NORMS[3].0),
            self.pace_delta_total,
            home_fav,
        )
    }
}

fn norm(x: f64, (mean, std): (f64, f64)) -> f64 {
    let std = if std == 0.0 { 1.0 } else { std };
    (x - mean) / std
}

fn features(
    quarter: f64,
    seconds_remaining: f64,
    margin: f64,
    total: f64,
    pace_delta: f64,
    home_fav: bool,
) -> [f64; FEATURE_COUNT] {
    [
        norm(quarter, NORMS[0]),
        norm(seconds_remaining, NORMS[1]),
        norm(margin, NORMS[2]),
        norm(total, NORMS[3]),
        norm(pace_delta, NORMS[4]),
        if home_fav { 1.0 } else { 0.0 },
    ]
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Profile {
    pub key: ProfileKey,
    pub vector: [f64; FEATURE_COUNT],
}

/// Mid-game centroids for each profile
pub fn base_profiles() -> [Profile; 4] {
    [
        Profile {
            key: ProfileKey::HomeFav,
            vector: features(2.0, 420.0, 4.0, 226.0, 5.0, true),
        },
        Profile {
            key: ProfileKey::HomeDog,
            vector: features(2.0, 420.0, -2.0, 222.0, -3.0, false),
        },
        Profile {
            key: ProfileKey::AwayFav,
            vector: features(2.0, 420.0, 3.0, 224.0, 2.0, false),
        },
        Profile {
            key: ProfileKey::AwayDog,
            vector: features(2.0, 420.0, -3.0, 223.0, -2.0, false),
        },
    ]
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileMatch {
    pub key: ProfileKey,
    pub label: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    pub top: Vec<ProfileMatch>,
    pub alert_text: String,
}

/// Top three profiles by similarity, best first
pub fn match_profiles(live: &LiveFeatures) -> PatternReport {
    let vector = live.vector();

    let mut scored: Vec<ProfileMatch> = base_profiles()
        .iter()
        .map(|profile| ProfileMatch {
            key: profile.key,
            label: profile.key.label().to_string(),
            similarity: round3(1.0 / (1.0 + euclidean(&vector, &profile.vector))),
        })
        .collect();

    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(3);

    let alert_text = scored
        .first()
        .map(|best| best.key.alert().to_string())
        .unwrap_or_default();

    PatternReport {
        top: scored,
        alert_text,
    }
}
