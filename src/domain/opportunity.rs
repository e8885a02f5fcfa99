//! Arbitrage opportunity type.

use std::fmt;

use rust_decimal::Decimal;

use super::id::MarketId;
use super::money::{Cents, Dollars};

/// Detection strategy that produced an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// YES + NO below 100 cents on the same book.
    SingleMarket,
    /// Sum of all YES outcomes below 100 cents.
    MultiOutcome,
    /// Home/away/draw combination below 100 cents.
    ThreeWay,
    /// YES on one venue plus NO on the other below 100 cents.
    CrossPlatform,
}

impl Strategy {
    /// Stable identifier used in opportunity keys, logs and broadcasts.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingleMarket => "single_market",
            Self::MultiOutcome => "multi_outcome",
            Self::ThreeWay => "three_way",
            Self::CrossPlatform => "cross_platform",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpportunityStatus {
    Active,
    Expired,
    Closed,
}

impl OpportunityStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Closed => "closed",
        }
    }
}

/// A detected arbitrage opportunity.
///
/// Identity is the `strategy:market` key; a re-detection with a changed
/// spread supersedes the previous instance rather than mutating it.
/// Detectors never emit instances with negative net profit.
#[derive(Debug, Clone)]
pub struct Opportunity {
    pub strategy: Strategy,
    pub market_id: MarketId,
    pub question: String,

    /// Price of the primary (or combined) YES leg in cents.
    pub yes_price: Cents,
    /// Price of the NO leg in cents; zero when the strategy has none.
    pub no_price: Cents,
    /// Counter-venue leg price for cross-platform opportunities.
    pub counter_price: Option<Cents>,

    /// Profit spread in percentage points (cents per 100-cent payout).
    pub spread_pct: Decimal,
    pub gross_profit_cents: Cents,
    pub fees_cents: Cents,
    pub net_profit_cents: Cents,
    pub net_profit_usd: Dollars,

    pub min_size_usd: Dollars,
    pub max_size_usd: Dollars,
    pub liquidity_usd: Dollars,
    pub slippage_estimate_cents: Decimal,

    /// Heuristic confidence in [0, 1].
    pub confidence: f64,
    /// Risk score 1-10, lower is safer.
    pub risk_score: u8,

    /// Epoch milliseconds when the detector produced this instance.
    pub discovered_at: i64,
    pub time_sensitive: bool,
    pub status: OpportunityStatus,
}

impl Opportunity {
    /// Dedup key: one live opportunity per strategy and market.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.strategy, self.market_id)
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == OpportunityStatus::Active
    }

    /// Age relative to `now_ms`.
    #[must_use]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.discovered_at
    }
}
