//! Courtline - main entry point
//!
//! This binary provides three subcommands:
//! - watch: Poll score and odds feeds and write live signals
//! - evaluate: Evaluate one game offline from a CSV line tape
//! - quote: Quote (and dry-run place) against the sportsbook providers

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{info, Subscriber};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "courtline")]
#[command(about = "Momentum and rally/collapse signals for live basketball markets", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll live feeds and emit signals every tick
    Watch {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: String,

        /// Fixed poll interval in seconds (overrides the jittered band)
        #[arg(long)]
        interval: Option<u64>,

        /// Run a single tick and exit
        #[arg(long)]
        once: bool,
    },

    /// Evaluate one game from a CSV line tape (seconds_ago,total)
    Evaluate {
        /// CSV file with the line tape, oldest row first
        #[arg(long)]
        tape: String,

        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: String,

        /// Current quarter (0 before tip-off)
        #[arg(short, long, default_value = "1")]
        quarter: u8,

        /// Seconds remaining in the quarter
        #[arg(long, default_value = "720")]
        clock: u32,

        /// Home score
        #[arg(long, default_value = "0")]
        home_score: u32,

        /// Away score
        #[arg(long, default_value = "0")]
        away_score: u32,

        /// Pre-game expected home points (config default when omitted)
        #[arg(long)]
        expected_home: Option<f64>,

        /// Pre-game expected away points (config default when omitted)
        #[arg(long)]
        expected_away: Option<f64>,

        /// Live total (last tape value when omitted)
        #[arg(long)]
        total: Option<f64>,

        /// Live home spread
        #[arg(long, allow_hyphen_values = true)]
        spread: Option<f64>,

        /// Home moneyline (American)
        #[arg(long, allow_hyphen_values = true)]
        ml_home: Option<f64>,

        /// Away moneyline (American)
        #[arg(long, allow_hyphen_values = true)]
        ml_away: Option<f64>,

        /// Home team name
        #[arg(long, default_value = "Home")]
        home: String,

        /// Away team name
        #[arg(long, default_value = "Away")]
        away: String,
    },

    /// Quote a bet with the sportsbook providers
    Quote {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: String,

        /// Providers to ask (comma-separated, all when omitted)
        #[arg(short, long)]
        providers: Option<String>,

        /// Market: OU, Spread or ML
        #[arg(short, long, default_value = "OU")]
        market: String,

        /// Side valid for the market (over, under, favorite, dog, home, away)
        #[arg(short, long, default_value = "over")]
        side: String,

        /// Requested American price
        #[arg(long, default_value = "-110", allow_hyphen_values = true)]
        price: f64,

        /// Stake for a dry-run placement
        #[arg(long)]
        stake: Option<String>,

        /// Worst acceptable American price for the placement
        #[arg(long, allow_hyphen_values = true)]
        price_limit: Option<f64>,

        /// Only list the registered providers
        #[arg(long)]
        list: bool,
    },
}

fn setup_logging(verbose: bool, command_name: &str, file_only: bool) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    // Set log level - filter out noisy external crates
    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    log_subscriber(env_filter, Path::new("logs"), &log_filename, file_only).init();

    info!("Logging initialized");
    info!("Log file: {}", log_path.display());

    Ok(())
}

/// Console plus file subscriber; the console layer is left out when `file_only`
fn log_subscriber(
    env_filter: EnvFilter,
    dir: &Path,
    log_filename: &str,
    file_only: bool,
) -> impl Subscriber + Send + Sync {
    let file_appender = tracing_appender::rolling::never(dir, log_filename);

    // File layer - same format as the console but without ANSI colors
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    // Keep stdout clean for JSON output when file_only
    let console_layer = (!file_only).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_line_number(true)
            .with_file(true)
            .with_ansi(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // evaluate and quote print JSON on stdout
    let (command_name, file_only) = match &cli.command {
        Commands::Watch { .. } => ("watch", false),
        Commands::Evaluate { .. } => ("evaluate", true),
        Commands::Quote { .. } => ("quote", true),
    };

    setup_logging(cli.verbose, command_name, file_only)?;

    match cli.command {
        Commands::Watch {
            config,
            interval,
            once,
        } => commands::watch::run(config, interval, once),

        Commands::Evaluate {
            tape,
            config,
            quarter,
            clock,
            home_score,
            away_score,
            expected_home,
            expected_away,
            total,
            spread,
            ml_home,
            ml_away,
            home,
            away,
        } => commands::evaluate::run(commands::evaluate::EvaluateArgs {
            tape,
            config,
            quarter,
            clock,
            home_score,
            away_score,
            expected_home,
            expected_away,
            total,
            spread,
            ml_home,
            ml_away,
            home,
            away,
        }),

        Commands::Quote {
            config,
            providers,
            market,
            side,
            price,
            stake,
            price_limit,
            list,
        } => commands::quote::run(commands::quote::QuoteArgs {
            config,
            providers,
            market,
            side,
            price,
            stake,
            price_limit,
            list,
        }),
    }
}
