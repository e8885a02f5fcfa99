//! Single-market arbitrage detection.
//!
//! The simplest strategy: buy both YES and NO on the same book. When
//! YES + NO + fees is below 100 cents, one leg must pay out 100 cents at
//! settlement, so the difference is locked in.

use rust_decimal::Decimal;

use super::{DetectorConfig, FULL_PAYOUT_CENTS};
use crate::domain::{epoch_millis, Opportunity, OpportunityStatus, SingleMarket, Strategy};

/// Detect YES + NO below 100 cents on a single binary market.
///
/// Both legs trade on the same book, so this carries the lowest risk score
/// and the highest confidence of the four strategies.
#[must_use]
pub fn detect_single_market(market: &SingleMarket, config: &DetectorConfig) -> Option<Opportunity> {
    let total_cost = market.yes_price + market.no_price + config.fees_cents;

    if total_cost >= FULL_PAYOUT_CENTS {
        return None;
    }

    let profit_cents = FULL_PAYOUT_CENTS - total_cost;

    Some(Opportunity {
        strategy: Strategy::SingleMarket,
        market_id: market.market_id.clone(),
        question: market.question.clone(),
        yes_price: market.yes_price,
        no_price: market.no_price,
        counter_price: None,
        spread_pct: profit_cents,
        gross_profit_cents: profit_cents + config.fees_cents,
        fees_cents: config.fees_cents,
        net_profit_cents: profit_cents,
        net_profit_usd: profit_cents / FULL_PAYOUT_CENTS,
        min_size_usd: config.min_size_usd,
        max_size_usd: market.liquidity_usd * Decimal::new(5, 1),
        liquidity_usd: market.liquidity_usd,
        slippage_estimate_cents: Decimal::new(1, 1),
        confidence: 0.95,
        risk_score: 1,
        discovered_at: epoch_millis(),
        time_sensitive: true,
        status: OpportunityStatus::Active,
    })
}
