//! Evaluate command implementation
//!
//! Runs the full signal pipeline on one game described on the command line,
//! with the technical series read from a CSV line tape.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use courtline::{
    evaluate_game, Config, Expectation, GameId, GameInput, LinePoint, LiveGameState, MarketQuote,
    Score, Teams,
};

pub struct EvaluateArgs {
    pub tape: String,
    pub config: String,
    pub quarter: u8,
    pub clock: u32,
    pub home_score: u32,
    pub away_score: u32,
    pub expected_home: Option<f64>,
    pub expected_away: Option<f64>,
    pub total: Option<f64>,
    pub spread: Option<f64>,
    pub ml_home: Option<f64>,
    pub ml_away: Option<f64>,
    pub home: String,
    pub away: String,
}

/// Read a `seconds_ago,total` tape, oldest row first
pub fn load_line_tape(path: impl AsRef<Path>) -> Result<Vec<LinePoint>> {
    let mut reader = csv::Reader::from_path(path.as_ref())
        .with_context(|| format!("Failed to open line tape {}", path.as_ref().display()))?;

    let mut tape = Vec::new();
    for (row_idx, result) in reader.deserialize::<LinePoint>().enumerate() {
        let point = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        if !point.total.is_finite() || !point.seconds_ago.is_finite() {
            anyhow::bail!("Row {} has a non-numeric value", row_idx + 1);
        }
        tape.push(point);
    }
    Ok(tape)
}

fn build_input(args: &EvaluateArgs, config: &Config, tape: Vec<LinePoint>) -> GameInput {
    let default = config.expectations.default_expectation();
    let expectation = Expectation {
        home: args.expected_home.unwrap_or(default.home),
        away: args.expected_away.unwrap_or(default.away),
    };

    // Without an explicit live total the latest tape value is the market
    let total = args.total.or_else(|| tape.last().map(|p| p.total));

    GameInput {
        state: LiveGameState {
            game_id: GameId::new("cli"),
            teams: Teams::new(args.home.clone(), args.away.clone()),
            score: Score::new(args.home_score, args.away_score),
            quarter: args.quarter,
            seconds_remaining_in_quarter: args.clock,
            line_history: tape,
        },
        expectation,
        market: MarketQuote {
            total,
            spread_home: args.spread,
            moneyline_home: args.ml_home,
            moneyline_away: args.ml_away,
        },
        windows: None,
    }
}

pub fn run(args: EvaluateArgs) -> Result<()> {
    let config = Config::load_or_default(&args.config)?;
    debug!("Loaded configuration from: {}", args.config);

    let tape = load_line_tape(&args.tape)?;
    info!("Loaded {} tape points from {}", tape.len(), args.tape);

    let input = build_input(&args, &config, tape);
    let payload = evaluate_game(&input, &config.signals);
    info!(
        "{}: {:?} ({:?})",
        payload.game.teams.matchup(),
        payload.rally_predictor.state,
        payload.technical.live_signal
    );

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtline::rally::RallyState;
    use std::io::Write;

    fn args(tape: &str) -> EvaluateArgs {
        EvaluateArgs {
            tape: tape.to_string(),
            config: "does-not-exist.json".to_string(),
            quarter: 3,
            clock: 360,
            home_score: 95,
            away_score: 90,
            expected_home: None,
            expected_away: None,
            total: None,
            spread: Some(-3.0),
            ml_home: None,
            ml_away: None,
            home: "Home".to_string(),
            away: "Away".to_string(),
        }
    }

    #[test]
    fn test_load_line_tape() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seconds_ago,total").unwrap();
        writeln!(file, "60,220.5").unwrap();
        writeln!(file, "30,221").unwrap();
        writeln!(file, "0,222.5").unwrap();

        let tape = load_line_tape(file.path()).unwrap();
        assert_eq!(tape.len(), 3);
        assert_eq!(tape[0], LinePoint::new(60.0, 220.5));
        assert_eq!(tape[2].total, 222.5);
    }

    #[test]
    fn test_bad_row_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "seconds_ago,total").unwrap();
        writeln!(file, "60,abc").unwrap();
        assert!(load_line_tape(file.path()).is_err());
    }

    #[test]
    fn test_live_total_defaults_to_last_tape_value() {
        let config = Config::default();
        let tape = vec![
            LinePoint::new(60.0, 220.0),
            LinePoint::new(30.0, 221.0),
            LinePoint::new(0.0, 224.0),
        ];
        let input = build_input(&args("unused.csv"), &config, tape);

        assert_eq!(input.market.total, Some(224.0));
        assert_eq!(input.expectation.total(), 227.0);

        // Q3 at 95-90 with 6:00 left projects 296 against 224: a confirmed rally
        let payload = evaluate_game(&input, &config.signals);
        assert_eq!(payload.rally_predictor.state, RallyState::RallyUp);
    }
}
