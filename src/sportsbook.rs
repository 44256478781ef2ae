//! Sportsbook providers
//!
//! Any provider that can price a market side and accept or reject a dry-run
//! order plugs into the registry. Prices are American odds; stakes are
//! `Decimal` units.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::SportsbookConfig;
use crate::error::SportsbookError;
use crate::value::american_to_prob;

// =============================================================================
// Markets and sides
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BetMarket {
    #[serde(rename = "OU")]
    OverUnder,
    Spread,
    #[serde(rename = "ML")]
    Moneyline,
}

pub const ALL_MARKETS: [BetMarket; 3] = [BetMarket::OverUnder, BetMarket::Spread, BetMarket::Moneyline];

impl BetMarket {
    pub fn allows(self, side: BetSide) -> bool {
        match self {
            BetMarket::OverUnder => matches!(side, BetSide::Over | BetSide::Under),
            BetMarket::Spread | BetMarket::Moneyline => !matches!(side, BetSide::Over | BetSide::Under),
        }
    }
}

impl fmt::Display for BetMarket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BetMarket::OverUnder => write!(f, "OU"),
            BetMarket::Spread => write!(f, "Spread"),
            BetMarket::Moneyline => write!(f, "ML"),
        }
    }
}

impl FromStr for BetMarket {
    type Err = SportsbookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OU" | "TOTAL" | "TOTALS" => Ok(BetMarket::OverUnder),
            "SPREAD" | "SPREADS" => Ok(BetMarket::Spread),
            "ML" | "MONEYLINE" | "H2H" => Ok(BetMarket::Moneyline),
            _ => Err(SportsbookError::InvalidMarket(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetSide {
    Over,
    Under,
    Favorite,
    Dog,
    Home,
    Away,
}

impl fmt::Display for BetSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BetSide::Over => "OVER",
            BetSide::Under => "UNDER",
            BetSide::Favorite => "FAVORITE",
            BetSide::Dog => "DOG",
            BetSide::Home => "HOME",
            BetSide::Away => "AWAY",
        };
        write!(f, "{}", s)
    }
}

impl BetSide {
    /// Parse a side and check it against the market
    pub fn parse_for(market: BetMarket, s: &str) -> Result<Self, SportsbookError> {
        let side = match s.trim().to_uppercase().as_str() {
            "OVER" => BetSide::Over,
            "UNDER" => BetSide::Under,
            "FAVORITE" | "FAV" => BetSide::Favorite,
            "DOG" | "UNDERDOG" => BetSide::Dog,
            "HOME" => BetSide::Home,
            "AWAY" => BetSide::Away,
            _ => {
                return Err(SportsbookError::InvalidSide {
                    market: market.to_string(),
                    side: s.to_string(),
                })
            }
        };
        validate_side(market, side)?;
        Ok(side)
    }
}

fn validate_side(market: BetMarket, side: BetSide) -> Result<(), SportsbookError> {
    if market.allows(side) {
        Ok(())
    } else {
        Err(SportsbookError::InvalidSide {
            market: market.to_string(),
            side: side.to_string(),
        })
    }
}

/// American prices live outside (-100, +100); +100 and -100 are both even money
fn validate_price(price: f64) -> Result<(), SportsbookError> {
    if price.is_finite() && price.abs() >= 100.0 {
        Ok(())
    } else {
        Err(SportsbookError::InvalidPrice(price))
    }
}

/// Worsen an American price by `cents`, continuing through even money
/// (+102 less 5 cents is -103).
pub fn worsen_price(price: f64, cents: f64) -> f64 {
    let shifted = price - cents;
    if price > 0.0 && shifted < 100.0 {
        -(200.0 - shifted)
    } else {
        shifted
    }
}

/// True when `price` pays at least as well as `limit`
pub fn not_worse_than(price: f64, limit: f64) -> bool {
    american_to_prob(price) <= american_to_prob(limit) + 1e-12
}

// =============================================================================
// Provider contract
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub provider: String,
    pub market: BetMarket,
    pub side: BetSide,
    pub requested_price: f64,
    pub quoted_price: f64,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub market: BetMarket,
    pub side: BetSide,
    pub price: f64,
    pub stake: Decimal,
    pub price_limit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub provider: String,
    pub market: BetMarket,
    pub side: BetSide,
    pub stake: Decimal,
    pub quoted_price: f64,
    pub price_limit: Option<f64>,
    pub accepted: bool,
    pub message: String,
    pub ts: DateTime<Utc>,
}

#[async_trait]
pub trait SportsbookProvider: Send + Sync {
    fn name(&self) -> &str;

    fn markets(&self) -> &[BetMarket] {
        &ALL_MARKETS
    }

    async fn quote(&self, market: BetMarket, side: BetSide, price: f64) -> Result<Quote, SportsbookError>;

    /// Dry-run placement; a rejection is `Ok` with `accepted == false`
    async fn place(&self, order: &OrderRequest) -> Result<Placement, SportsbookError>;
}

// =============================================================================
// Simulated book
// =============================================================================

/// Deterministic mock book: fixed vig, stake ceiling
#[derive(Debug, Clone)]
pub struct SimulatedBook {
    name: String,
    vig_cents: f64,
    max_stake: Decimal,
}

impl SimulatedBook {
    pub fn new(name: impl Into<String>, vig_cents: f64, max_stake: Decimal) -> Self {
        Self {
            name: name.into(),
            vig_cents,
            max_stake,
        }
    }

    pub fn from_config(cfg: &SportsbookConfig) -> Self {
        Self::new(cfg.name.clone(), cfg.vig_cents, cfg.max_stake)
    }
}

#[async_trait]
impl SportsbookProvider for SimulatedBook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(&self, market: BetMarket, side: BetSide, price: f64) -> Result<Quote, SportsbookError> {
        validate_side(market, side)?;
        validate_price(price)?;

        Ok(Quote {
            provider: self.name.clone(),
            market,
            side,
            requested_price: price,
            quoted_price: worsen_price(price, self.vig_cents),
            ts: Utc::now(),
        })
    }

    async fn place(&self, order: &OrderRequest) -> Result<Placement, SportsbookError> {
        if order.stake <= Decimal::ZERO {
            return Err(SportsbookError::InvalidStake(order.stake));
        }
        if let Some(limit) = order.price_limit {
            validate_price(limit)?;
        }
        let quote = self.quote(order.market, order.side, order.price).await?;

        let (accepted, message) = if order.stake > self.max_stake {
            (false, format!("stake {} above limit {}", order.stake, self.max_stake))
        } else {
            match order.price_limit {
                Some(limit) if !not_worse_than(quote.quoted_price, limit) => (
                    false,
                    format!("quoted {:+} is worse than limit {:+}", quote.quoted_price, limit),
                ),
                _ => (true, "simulated OK".to_string()),
            }
        };

        debug!(
            "{} place {} {} stake={} @ {:+}: {}",
            self.name, order.market, order.side, order.stake, quote.quoted_price, message
        );

        Ok(Placement {
            provider: self.name.clone(),
            market: order.market,
            side: order.side,
            stake: order.stake,
            quoted_price: quote.quoted_price,
            price_limit: order.price_limit,
            accepted,
            message,
            ts: quote.ts,
        })
    }
}

// =============================================================================
// Registry
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    pub name: String,
    pub markets: Vec<BetMarket>,
}

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn SportsbookProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry of simulated books; two stock books when none are configured
    pub fn from_config(books: &[SportsbookConfig]) -> Result<Self, SportsbookError> {
        let mut registry = Self::new();
        if books.is_empty() {
            registry.register(Arc::new(SimulatedBook::new("betA", 5.0, Decimal::from(500))))?;
            registry.register(Arc::new(SimulatedBook::new("betB", 3.0, Decimal::from(250))))?;
        } else {
            for book in books {
                registry.register(Arc::new(SimulatedBook::from_config(book)))?;
            }
        }
        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn SportsbookProvider>) -> Result<(), SportsbookError> {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(SportsbookError::DuplicateProvider(name));
        }
        self.providers.insert(name, provider);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn SportsbookProvider>, SportsbookError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| SportsbookError::UnknownProvider(name.to_string()))
    }

    pub fn list(&self) -> Vec<ProviderInfo> {
        self.providers
            .values()
            .map(|p| ProviderInfo {
                name: p.name().to_string(),
                markets: p.markets().to_vec(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Quote every named provider, one result per name in request order
    pub async fn quote_all(
        &self,
        names: &[String],
        market: BetMarket,
        side: BetSide,
        price: f64,
    ) -> Vec<(String, Result<Quote, SportsbookError>)> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let result = match self.get(name) {
                Ok(provider) => provider.quote(market, side, price).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!("Quote from {} failed: {}", name, e);
            }
            results.push((name.clone(), result));
        }
        results
    }

    pub async fn place_all(
        &self,
        names: &[String],
        order: &OrderRequest,
    ) -> Vec<(String, Result<Placement, SportsbookError>)> {
        let mut results = Vec::with_capacity(names.len());
        for name in names {
            let result = match self.get(name) {
                Ok(provider) => provider.place(order).await,
                Err(e) => Err(e),
            };
            if let Err(e) = &result {
                warn!("Placement with {} failed: {}", name, e);
            }
            results.push((name.clone(), result));
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(price: f64, stake: Decimal, limit: Option<f64>) -> OrderRequest {
        OrderRequest {
            market: BetMarket::OverUnder,
            side: BetSide::Over,
            price,
            stake,
            price_limit: limit,
        }
    }

    #[test]
    fn test_parse_market_and_side() {
        assert_eq!("ou".parse::<BetMarket>().unwrap(), BetMarket::OverUnder);
        assert_eq!("ML".parse::<BetMarket>().unwrap(), BetMarket::Moneyline);
        assert!(matches!(
            "parlay".parse::<BetMarket>(),
            Err(SportsbookError::InvalidMarket(_))
        ));

        assert_eq!(BetSide::parse_for(BetMarket::OverUnder, "over").unwrap(), BetSide::Over);
        assert!(BetSide::parse_for(BetMarket::OverUnder, "HOME").is_err());
        assert!(BetSide::parse_for(BetMarket::Spread, "UNDER").is_err());
        assert_eq!(BetSide::parse_for(BetMarket::Moneyline, "dog").unwrap(), BetSide::Dog);
    }

    #[test]
    fn test_worsen_price() {
        assert_eq!(worsen_price(-110.0, 5.0), -115.0);
        assert_eq!(worsen_price(120.0, 5.0), 115.0);
        assert_eq!(worsen_price(102.0, 5.0), -103.0);
        assert_eq!(worsen_price(100.0, 0.0), 100.0);
    }

    #[test]
    fn test_price_comparison() {
        assert!(not_worse_than(-110.0, -115.0));
        assert!(!not_worse_than(-120.0, -115.0));
        assert!(not_worse_than(105.0, -105.0));
        assert!(not_worse_than(-110.0, -110.0));
    }

    #[tokio::test]
    async fn test_simulated_quote() {
        let book = SimulatedBook::new("betA", 5.0, dec!(500));
        let quote = book.quote(BetMarket::OverUnder, BetSide::Under, -110.0).await.unwrap();
        assert_eq!(quote.quoted_price, -115.0);
        assert_eq!(quote.provider, "betA");

        let err = book.quote(BetMarket::OverUnder, BetSide::Under, -50.0).await.unwrap_err();
        assert_eq!(err, SportsbookError::InvalidPrice(-50.0));

        let err = book.quote(BetMarket::OverUnder, BetSide::Home, -110.0).await.unwrap_err();
        assert!(matches!(err, SportsbookError::InvalidSide { .. }));
    }

    #[tokio::test]
    async fn test_simulated_place() {
        let book = SimulatedBook::new("betA", 5.0, dec!(500));

        let ok = book.place(&order(-110.0, dec!(100), Some(-120.0))).await.unwrap();
        assert!(ok.accepted);
        assert_eq!(ok.quoted_price, -115.0);

        let too_big = book.place(&order(-110.0, dec!(500.01), None)).await.unwrap();
        assert!(!too_big.accepted);

        let limit = book.place(&order(-110.0, dec!(10), Some(-112.0))).await.unwrap();
        assert!(!limit.accepted);
        assert!(limit.message.contains("worse"));

        let err = book.place(&order(-110.0, dec!(0), None)).await.unwrap_err();
        assert_eq!(err, SportsbookError::InvalidStake(dec!(0)));
    }

    #[tokio::test]
    async fn test_registry_fan_out() {
        let registry = ProviderRegistry::from_config(&[]).unwrap();
        assert_eq!(registry.names(), vec!["betA".to_string(), "betB".to_string()]);

        let names = vec!["betB".to_string(), "nope".to_string(), "betA".to_string()];
        let results = registry
            .quote_all(&names, BetMarket::Spread, BetSide::Favorite, -110.0)
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].1.as_ref().unwrap().quoted_price, -113.0);
        assert_eq!(
            results[1].1.as_ref().unwrap_err(),
            &SportsbookError::UnknownProvider("nope".to_string())
        );
        assert_eq!(results[2].1.as_ref().unwrap().quoted_price, -115.0);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(SimulatedBook::new("betA", 5.0, dec!(100))))
            .unwrap();
        let err = registry
            .register(Arc::new(SimulatedBook::new("betA", 1.0, dec!(100))))
            .unwrap_err();
        assert_eq!(err, SportsbookError::DuplicateProvider("betA".to_string()));
        assert!(registry.get("betA").is_ok());
        assert_eq!(registry.list()[0].markets.len(), 3);
    }
}
