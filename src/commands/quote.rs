//! Quote command implementation

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use tracing::info;

use courtline::sportsbook::{
    BetMarket, BetSide, OrderRequest, Placement, ProviderRegistry, Quote,
};
use courtline::Config;

pub struct QuoteArgs {
    pub config: String,
    pub providers: Option<String>,
    pub market: String,
    pub side: String,
    pub price: f64,
    pub stake: Option<String>,
    pub price_limit: Option<f64>,
    pub list: bool,
}

/// Per-provider line of the printed report
#[derive(Debug, Serialize)]
struct ProviderResult<T> {
    provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ProviderResult<T> {
    fn from_result<E: std::fmt::Display>(provider: String, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => ProviderResult {
                provider,
                result: Some(value),
                error: None,
            },
            Err(e) => ProviderResult {
                provider,
                result: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct QuoteReport {
    quotes: Vec<ProviderResult<Quote>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    placements: Vec<ProviderResult<Placement>>,
}

fn provider_names(registry: &ProviderRegistry, requested: Option<&str>) -> Vec<String> {
    match requested {
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from)
            .collect(),
        None => registry.names(),
    }
}

pub fn run(args: QuoteArgs) -> Result<()> {
    let config = Config::load_or_default(&args.config)?;
    let registry = ProviderRegistry::from_config(&config.sportsbooks)
        .context("Failed to build sportsbook registry")?;

    if args.list {
        println!("{}", serde_json::to_string_pretty(&registry.list())?);
        return Ok(());
    }

    let market = BetMarket::from_str(&args.market)?;
    let side = BetSide::parse_for(market, &args.side)?;
    let stake = args
        .stake
        .as_deref()
        .map(Decimal::from_str)
        .transpose()
        .context("Stake must be a decimal amount")?;
    let names = provider_names(&registry, args.providers.as_deref());

    info!(
        "Quoting {} {} @ {:+} with {}",
        market,
        side,
        args.price,
        names.join(",")
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let report = runtime.block_on(async {
        let quotes = registry.quote_all(&names, market, side, args.price).await;

        let placements = match stake {
            Some(stake) => {
                let order = OrderRequest {
                    market,
                    side,
                    price: args.price,
                    stake,
                    price_limit: args.price_limit,
                };
                registry.place_all(&names, &order).await
            }
            None => Vec::new(),
        };

        QuoteReport {
            quotes: quotes
                .into_iter()
                .map(|(name, result)| ProviderResult::from_result(name, result))
                .collect(),
            placements: placements
                .into_iter()
                .map(|(name, result)| ProviderResult::from_result(name, result))
                .collect(),
        }
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_names() {
        let registry = ProviderRegistry::from_config(&[]).unwrap();
        assert_eq!(provider_names(&registry, None), vec!["betA", "betB"]);
        assert_eq!(
            provider_names(&registry, Some("betB, nope,")),
            vec!["betB", "nope"]
        );
    }

    #[test]
    fn test_error_entry_serializes_without_result() {
        let entry: ProviderResult<Quote> =
            ProviderResult::from_result("nope".to_string(), Err("unknown provider: nope"));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["error"], "unknown provider: nope");
        assert!(json.get("result").is_none());
    }
}
