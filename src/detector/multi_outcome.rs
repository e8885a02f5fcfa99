//! Multi-outcome arbitrage detection.
//!
//! For N mutually exclusive outcomes the YES prices must sum to 100 cents
//! at fair value. When the sum plus fees comes in below that, buying every
//! outcome locks in the difference. Execution risk grows with the number
//! of legs, so risk scales with the outcome count and confidence decays
//! 5% per outcome.

use rust_decimal::Decimal;

use super::{DetectorConfig, FULL_PAYOUT_CENTS};
use crate::domain::{epoch_millis, MultiOutcomeMarket, Opportunity, OpportunityStatus, Strategy};

/// Detect sum-of-outcomes arbitrage on a market with three or more legs.
#[must_use]
pub fn detect_multi_outcome(
    market: &MultiOutcomeMarket,
    config: &DetectorConfig,
) -> Option<Opportunity> {
    if market.outcomes.len() < 3 {
        return None;
    }

    let total_price: Decimal = market.outcomes.iter().map(|o| o.yes_price).sum();
    let total_cost = total_price + config.fees_cents;

    if total_cost >= FULL_PAYOUT_CENTS {
        return None;
    }

    let profit_cents = FULL_PAYOUT_CENTS - total_cost;
    let outcome_count = market.outcomes.len();
    let min_liquidity = market.min_liquidity();

    let risk_score = (outcome_count / 2 + 1).min(10) as u8;
    let confidence = (1.0 - outcome_count as f64 * 0.05).max(0.0);

    Some(Opportunity {
        strategy: Strategy::MultiOutcome,
        market_id: market.market_id.clone(),
        question: market.question.clone(),
        yes_price: total_price,
        no_price: Decimal::ZERO,
        counter_price: None,
        spread_pct: profit_cents,
        gross_profit_cents: profit_cents + config.fees_cents,
        fees_cents: config.fees_cents,
        net_profit_cents: profit_cents,
        net_profit_usd: profit_cents / FULL_PAYOUT_CENTS,
        min_size_usd: config.min_size_usd,
        max_size_usd: min_liquidity * Decimal::new(5, 1),
        liquidity_usd: min_liquidity,
        slippage_estimate_cents: Decimal::new(1, 1) * Decimal::from(outcome_count as u32),
        confidence,
        risk_score,
        discovered_at: epoch_millis(),
        time_sensitive: true,
        status: OpportunityStatus::Active,
    })
}
