//! Execution sizing against real order-book depth.
//!
//! Volume-weighted average price calculations that walk the top levels of
//! an L2 book to find the largest order size whose slippage stays within
//! tolerance. Only a configurable fraction of displayed liquidity is
//! assumed fillable.
//!
//! The walk is deliberately discrete: the reported VWAP and slippage are
//! those of the deepest admissible price-level prefix, even when the
//! optimal size is clipped below that prefix's cumulative size. There is
//! no interpolation inside the last level.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{Cents, Dollars, OrderBook};

/// Configuration for VWAP sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct SizingConfig {
    /// Fraction of displayed size assumed actually fillable.
    #[serde(default = "default_liquidity_factor")]
    pub liquidity_factor: Decimal,

    /// Maximum book depth to walk, in levels.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum acceptable slippage per leg, in cents.
    #[serde(default = "default_max_slippage")]
    pub max_slippage_cents: Cents,

    /// Minimum combined size for a two-leg execution to be feasible.
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity_usd: Dollars,
}

fn default_liquidity_factor() -> Decimal {
    Decimal::new(5, 1)
}

fn default_max_depth() -> usize {
    5
}

fn default_max_slippage() -> Cents {
    Decimal::TWO
}

fn default_min_liquidity() -> Dollars {
    Decimal::from(50)
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            liquidity_factor: default_liquidity_factor(),
            max_depth: default_max_depth(),
            max_slippage_cents: default_max_slippage(),
            min_liquidity_usd: default_min_liquidity(),
        }
    }
}

/// Result of a VWAP sizing calculation. Recomputed per call, no identity.
#[derive(Debug, Clone, PartialEq)]
pub struct VwapResult {
    /// Largest size within the slippage bound, capped at the target.
    pub optimal_size: Dollars,
    /// VWAP of the admissible prefix, in cents.
    pub vwap_cents: Cents,
    /// Slippage of the admissible prefix relative to top of book.
    pub slippage_cents: Cents,
    /// Usable liquidity across the admissible prefix.
    pub total_liquidity: Dollars,
    /// Number of price levels in the admissible prefix.
    pub levels_used: usize,
    /// Dollar cost of executing `optimal_size` at the VWAP.
    pub execution_cost_usd: Dollars,
}

impl VwapResult {
    /// Zero-size result reporting the given reference price.
    fn empty(reference_price: Cents) -> Self {
        Self {
            optimal_size: Decimal::ZERO,
            vwap_cents: reference_price,
            slippage_cents: Decimal::ZERO,
            total_liquidity: Decimal::ZERO,
            levels_used: 0,
            execution_cost_usd: Decimal::ZERO,
        }
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.optimal_size.is_zero()
    }
}

/// Which side of the book a walk consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkSide {
    /// Buy order walking up the asks.
    Buy,
    /// Sell order walking down the bids.
    Sell,
}

/// VWAP for a buy order walking up the ask side.
///
/// Starts at the best ask, accumulates liquidity-factor-adjusted size level
/// by level, and stops at the deepest prefix whose VWAP slippage is still
/// within tolerance. Returns a zero-size result (never an error) when the
/// ask side is empty, the best ask is zero, or no prefix qualifies.
#[must_use]
pub fn buy_vwap(book: &OrderBook, target_size_usd: Dollars, config: &SizingConfig) -> VwapResult {
    walk_levels(&book.asks, target_size_usd, config, WalkSide::Buy)
}

/// VWAP for a sell order walking down the bid side.
#[must_use]
pub fn sell_vwap(book: &OrderBook, target_size_usd: Dollars, config: &SizingConfig) -> VwapResult {
    walk_levels(&book.bids, target_size_usd, config, WalkSide::Sell)
}

fn walk_levels(
    levels: &[crate::domain::PriceLevel],
    target_size_usd: Dollars,
    config: &SizingConfig,
    side: WalkSide,
) -> VwapResult {
    let Some(best) = levels.first() else {
        return VwapResult::empty(Decimal::ZERO);
    };
    if best.price.is_zero() {
        return VwapResult::empty(Decimal::ZERO);
    }

    let best_price = best.price;
    let depth = levels.len().min(config.max_depth);

    let mut cumulative_size = Decimal::ZERO;
    let mut cumulative_cost = Decimal::ZERO;
    let mut admissible: Option<(Dollars, Cents, Cents, usize)> = None;

    for (index, level) in levels[..depth].iter().enumerate() {
        let usable = level.size * config.liquidity_factor;
        cumulative_size += usable;
        cumulative_cost += level.price * usable;

        if cumulative_size.is_zero() {
            continue;
        }

        let vwap = cumulative_cost / cumulative_size;
        let slippage = match side {
            WalkSide::Buy => vwap - best_price,
            WalkSide::Sell => best_price - vwap,
        };

        if slippage <= config.max_slippage_cents {
            admissible = Some((cumulative_size, vwap, slippage, index + 1));
        }
    }

    let Some((size, vwap, slippage, levels_used)) = admissible else {
        // Nothing fits the slippage bound; report top of book with zero size.
        return VwapResult::empty(best_price);
    };

    let optimal_size = size.min(target_size_usd);

    VwapResult {
        optimal_size,
        vwap_cents: vwap,
        slippage_cents: slippage,
        total_liquidity: size,
        levels_used,
        execution_cost_usd: optimal_size * vwap / Decimal::ONE_HUNDRED,
    }
}

/// Combined sizing for both legs of an arbitrage trade.
#[derive(Debug, Clone)]
pub struct ArbitrageSizing {
    pub yes_leg: VwapResult,
    pub no_leg: VwapResult,
    /// Both legs must fill; the thinner leg bounds the trade.
    pub combined_optimal_size: Dollars,
    pub total_slippage_cents: Cents,
    pub can_execute: bool,
}

/// Size both legs of an arbitrage at the same target.
///
/// Each leg is priced independently; the combined size is the minimum of
/// the two, total slippage is their sum, and execution is feasible only if
/// the combined size meets the liquidity floor and total slippage stays
/// within double the per-leg allowance.
#[must_use]
pub fn arbitrage_vwap(
    yes_book: &OrderBook,
    no_book: &OrderBook,
    target_size_usd: Dollars,
    config: &SizingConfig,
) -> ArbitrageSizing {
    let yes_leg = buy_vwap(yes_book, target_size_usd, config);
    let no_leg = buy_vwap(no_book, target_size_usd, config);

    let combined_optimal_size = yes_leg.optimal_size.min(no_leg.optimal_size);
    let total_slippage_cents = yes_leg.slippage_cents + no_leg.slippage_cents;

    let can_execute = combined_optimal_size >= config.min_liquidity_usd
        && total_slippage_cents <= config.max_slippage_cents * Decimal::TWO;

    ArbitrageSizing {
        yes_leg,
        no_leg,
        combined_optimal_size,
        total_slippage_cents,
        can_execute,
    }
}

/// Order-book imbalance over the top `depth` levels.
///
/// `(bid_liquidity - ask_liquidity) / (bid_liquidity + ask_liquidity)`,
/// ranging from -1 (all asks) to +1 (all bids). Zero for an empty book.
#[must_use]
pub fn imbalance(book: &OrderBook, depth: usize) -> Decimal {
    let bid_liquidity: Decimal = book.bids.iter().take(depth).map(|l| l.size).sum();
    let ask_liquidity: Decimal = book.asks.iter().take(depth).map(|l| l.size).sum();

    let total = bid_liquidity + ask_liquidity;
    if total.is_zero() {
        return Decimal::ZERO;
    }
    (bid_liquidity - ask_liquidity) / total
}

/// Total displayed liquidity across both sides, up to `depth` levels each.
#[must_use]
pub fn total_liquidity(book: &OrderBook, depth: usize) -> Dollars {
    let bids: Decimal = book.bids.iter().take(depth).map(|l| l.size).sum();
    let asks: Decimal = book.asks.iter().take(depth).map(|l| l.size).sum();
    bids + asks
}
