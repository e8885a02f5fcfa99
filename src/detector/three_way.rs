//! Three-way sports market arbitrage detection.
//!
//! Home/away/draw markets admit two legal covering combinations:
//! home YES + away NO + draw YES, and away YES + home NO + draw YES.
//! The detector prices both and keeps the cheaper; cross-leg correlation
//! keeps the risk score fixed at 6.

use rust_decimal::Decimal;

use super::{DetectorConfig, FULL_PAYOUT_CENTS};
use crate::domain::{epoch_millis, Opportunity, OpportunityStatus, Strategy, ThreeWayMarket};

/// Detect covering-combination arbitrage on a home/away/draw market.
#[must_use]
pub fn detect_three_way(market: &ThreeWayMarket, config: &DetectorConfig) -> Option<Opportunity> {
    let option1_cost = market.home.yes_price + market.away.no_price + market.draw_price;
    let option2_cost = market.away.yes_price + market.home.no_price + market.draw_price;

    let (best_cost, yes_price, no_price) = if option1_cost < option2_cost {
        (option1_cost, market.home.yes_price, market.away.no_price)
    } else {
        (option2_cost, market.away.yes_price, market.home.no_price)
    };

    let total_cost = best_cost + config.fees_cents;

    if total_cost >= FULL_PAYOUT_CENTS {
        return None;
    }

    let profit_cents = FULL_PAYOUT_CENTS - total_cost;

    Some(Opportunity {
        strategy: Strategy::ThreeWay,
        market_id: market.market_id.clone(),
        question: market.question.clone(),
        yes_price,
        no_price,
        counter_price: None,
        spread_pct: profit_cents,
        gross_profit_cents: profit_cents + config.fees_cents,
        fees_cents: config.fees_cents,
        net_profit_cents: profit_cents,
        net_profit_usd: profit_cents / FULL_PAYOUT_CENTS,
        min_size_usd: config.three_way_min_size_usd,
        max_size_usd: market.liquidity_usd * Decimal::new(4, 1),
        liquidity_usd: market.liquidity_usd,
        slippage_estimate_cents: Decimal::new(3, 1),
        confidence: 0.7,
        risk_score: 6,
        discovered_at: epoch_millis(),
        time_sensitive: true,
        status: OpportunityStatus::Active,
    })
}
