//! Trade lifecycle types consumed by the risk gate.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::id::MarketId;
use super::money::{Cents, Dollars};

/// Outcome of a successfully executed trade, reported back to the risk gate.
#[derive(Debug, Clone)]
pub struct TradeResult {
    pub market_id: MarketId,
    /// Size filled, in dollars.
    pub size_usd: Dollars,
    /// Average fill price in cents.
    pub fill_price: Cents,
    /// Realized profit or loss in dollars.
    pub realized_pnl_usd: Dollars,
    pub gas_cost_usd: Dollars,
    pub execution_time_ms: Option<u64>,
}

/// Open exposure in one market.
///
/// Created on the first fill, updated on subsequent fills. Removal is owned
/// by the risk gate's caller, never automatic.
#[derive(Debug, Clone)]
pub struct Position {
    pub market_id: MarketId,
    /// Total size in dollars.
    pub quantity: Dollars,
    /// Size-weighted average entry price in cents.
    pub avg_entry_price: Cents,
    pub unrealized_pnl_usd: Dollars,
    pub opened_at: i64,
    pub last_updated: i64,
}

impl Position {
    /// Open a position from a first fill.
    #[must_use]
    pub fn open(market_id: MarketId, size_usd: Dollars, price: Cents, now_ms: i64) -> Self {
        Self {
            market_id,
            quantity: size_usd,
            avg_entry_price: price,
            unrealized_pnl_usd: Decimal::ZERO,
            opened_at: now_ms,
            last_updated: now_ms,
        }
    }

    /// Fold a subsequent fill into the position, reweighting the entry price.
    pub fn apply_fill(&mut self, size_usd: Dollars, price: Cents, now_ms: i64) {
        let new_quantity = self.quantity + size_usd;
        if new_quantity > Decimal::ZERO {
            self.avg_entry_price =
                (self.avg_entry_price * self.quantity + price * size_usd) / new_quantity;
        }
        self.quantity = new_quantity;
        self.last_updated = now_ms;
    }
}

/// One record per UTC calendar day; replaced wholesale at rollover.
#[derive(Debug, Clone)]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub total_trades: u32,
    pub successful_trades: u32,
    pub failed_trades: u32,
    pub total_pnl_usd: Dollars,
    pub total_gas_spent_usd: Dollars,
    pub consecutive_errors: u32,
}

impl DailyMetrics {
    /// Fresh zeroed record for the given day.
    #[must_use]
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            total_trades: 0,
            successful_trades: 0,
            failed_trades: 0,
            total_pnl_usd: Decimal::ZERO,
            total_gas_spent_usd: Decimal::ZERO,
            consecutive_errors: 0,
        }
    }
}
