//! Strategy input shapes.
//!
//! A closed set of market shapes, each dispatched to the matching detector.
//! All prices are cents on the 0-99 scale; liquidity figures are dollars.

use super::id::MarketId;
use super::money::{Cents, Dollars};

/// A binary YES/NO market on one venue.
#[derive(Debug, Clone)]
pub struct SingleMarket {
    pub market_id: MarketId,
    pub question: String,
    pub yes_price: Cents,
    pub no_price: Cents,
    pub liquidity_usd: Dollars,
}

/// One outcome in a multi-outcome market.
#[derive(Debug, Clone)]
pub struct OutcomeQuote {
    pub name: String,
    pub yes_price: Cents,
    pub liquidity_usd: Dollars,
}

/// A market with three or more mutually exclusive outcomes.
///
/// For N exclusive outcomes the YES prices must sum to 100 cents at fair
/// value; a sum below that is an arbitrage.
#[derive(Debug, Clone)]
pub struct MultiOutcomeMarket {
    pub market_id: MarketId,
    pub question: String,
    pub outcomes: Vec<OutcomeQuote>,
}

impl MultiOutcomeMarket {
    /// Minimum liquidity across all outcomes; bounds executable size.
    #[must_use]
    pub fn min_liquidity(&self) -> Dollars {
        self.outcomes
            .iter()
            .map(|o| o.liquidity_usd)
            .min()
            .unwrap_or_default()
    }
}

/// YES/NO quote for one team in a three-way market.
#[derive(Debug, Clone)]
pub struct TeamQuote {
    pub yes_price: Cents,
    pub no_price: Cents,
}

/// A sports market with home/away/draw outcomes.
#[derive(Debug, Clone)]
pub struct ThreeWayMarket {
    pub market_id: MarketId,
    pub question: String,
    pub home: TeamQuote,
    pub away: TeamQuote,
    pub draw_price: Cents,
    pub liquidity_usd: Dollars,
}

/// The same economic event quoted on two venues.
///
/// Counter-venue prices are optional: the counter book may be missing one
/// side, in which case only the feasible leg combination is evaluated.
#[derive(Debug, Clone)]
pub struct CrossPlatformPair {
    pub market_id: MarketId,
    pub counter_market_id: MarketId,
    pub question: String,
    pub yes_price: Cents,
    pub no_price: Cents,
    pub liquidity_usd: Dollars,
    pub counter_yes_price: Option<Cents>,
    pub counter_no_price: Option<Cents>,
    pub counter_liquidity_usd: Dollars,
}

/// A cached market snapshot, tagged by shape.
#[derive(Debug, Clone)]
pub enum MarketSnapshot {
    Single(SingleMarket),
    MultiOutcome(MultiOutcomeMarket),
    ThreeWay(ThreeWayMarket),
}

impl MarketSnapshot {
    /// The market this snapshot describes.
    #[must_use]
    pub fn market_id(&self) -> &MarketId {
        match self {
            Self::Single(m) => &m.market_id,
            Self::MultiOutcome(m) => &m.market_id,
            Self::ThreeWay(m) => &m.market_id,
        }
    }
}
