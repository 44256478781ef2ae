//! Upstream collaborators: live scores, market odds and pre-game expectations
//!
//! Score and odds feeds use different game ids, so they are joined on
//! normalized team names.

pub mod cache;
pub mod expectations;
pub mod odds;
pub mod scoreboard;

pub use cache::{jittered, TtlCache};
pub use expectations::ExpectationBook;
pub use odds::{OddsClient, OddsUpdate};
pub use scoreboard::{GameStatus, ScoreUpdate, ScoreboardClient};

use std::collections::HashMap;

/// Lowercase team name without whitespace, dots or dashes
pub fn normalize_team(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Pair every odds event with the score update of the same matchup, if any
pub fn join_games<'a>(
    odds: &'a [OddsUpdate],
    scores: &'a [ScoreUpdate],
) -> Vec<(&'a OddsUpdate, Option<&'a ScoreUpdate>)> {
    let by_matchup: HashMap<(String, String), &ScoreUpdate> = scores
        .iter()
        .map(|s| {
            (
                (normalize_team(&s.teams.home), normalize_team(&s.teams.away)),
                s,
            )
        })
        .collect();

    odds.iter()
        .map(|o| {
            let key = (normalize_team(&o.teams.home), normalize_team(&o.teams.away));
            (o, by_matchup.get(&key).copied())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GameId, MarketQuote, Score, Teams};
    use chrono::Utc;

    #[test]
    fn test_normalize_team() {
        assert_eq!(normalize_team("L.A. Clippers"), "laclippers");
        assert_eq!(normalize_team("Philadelphia 76ers"), "philadelphia76ers");
        assert_eq!(normalize_team(" Trail-Blazers "), "trailblazers");
    }

    #[test]
    fn test_join_by_matchup() {
        let odds = vec![
            OddsUpdate {
                game_id: GameId::new("odds-1"),
                teams: Teams::new("Boston Celtics", "Miami Heat"),
                commence_time: Utc::now(),
                quote: MarketQuote::default(),
            },
            OddsUpdate {
                game_id: GameId::new("odds-2"),
                teams: Teams::new("LA Clippers", "Utah Jazz"),
                commence_time: Utc::now(),
                quote: MarketQuote::default(),
            },
        ];
        let scores = vec![ScoreUpdate {
            game_id: GameId::new("espn-9"),
            teams: Teams::new("Boston Celtics", "Miami Heat"),
            score: Score::new(50, 44),
            quarter: 2,
            seconds_remaining_in_quarter: 200,
            start_time: None,
            status: GameStatus::In,
        }];

        let joined = join_games(&odds, &scores);
        assert_eq!(joined.len(), 2);
        assert_eq!(joined[0].1.map(|s| s.game_id.as_str()), Some("espn-9"));
        assert!(joined[1].1.is_none());
    }
}
