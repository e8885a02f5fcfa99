//! Venue-agnostic domain logic.

mod book;
mod id;
mod market;
mod money;
mod opportunity;
mod signal;
mod trade;

// Core domain types
pub use id::{MarketId, Venue};
pub use money::{Cents, Dollars};

// Order book types
pub use book::{Outcome, OrderBook, PriceLevel};

// Strategy input shapes
pub use market::{
    CrossPlatformPair, MarketSnapshot, MultiOutcomeMarket, OutcomeQuote, SingleMarket, TeamQuote,
    ThreeWayMarket,
};

// Opportunities, signals and alerts
pub use opportunity::{Opportunity, OpportunityStatus, Strategy};
pub use signal::{Alert, AlertPriority, Recommendation, Signal, SignalStrength, Urgency};

// Trade lifecycle types
pub use trade::{DailyMetrics, Position, TradeResult};

/// Return the current time as epoch milliseconds.
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
