//! Order book types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::money::{Cents, Dollars};

/// Which side of a binary market a book belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
        }
    }
}

/// A single price level in an order book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price in cents.
    pub price: Cents,
    /// Available size in dollars at this price.
    pub size: Dollars,
}

impl PriceLevel {
    #[must_use]
    pub const fn new(price: Cents, size: Dollars) -> Self {
        Self { price, size }
    }
}

/// L2 order book for one instrument, levels ordered best-first.
///
/// Bids descend from the highest buy price; asks ascend from the lowest
/// sell price. Mutated only by cache updates, read-only to detectors.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    /// Epoch milliseconds of the last update.
    pub updated_at: i64,
}

impl OrderBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a book from pre-sorted levels.
    #[must_use]
    pub fn with_levels(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>, updated_at: i64) -> Self {
        Self {
            bids,
            asks,
            updated_at,
        }
    }

    /// Best bid (highest buy price).
    #[must_use]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    /// Best ask (lowest sell price).
    #[must_use]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Bid-ask spread in cents, zero when either side is empty.
    #[must_use]
    pub fn spread(&self) -> Cents {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask.price - bid.price,
            _ => Decimal::ZERO,
        }
    }

    /// Age of the book relative to `now_ms`.
    #[must_use]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.updated_at
    }
}
