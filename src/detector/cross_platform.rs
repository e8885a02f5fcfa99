//! Cross-platform arbitrage detection.
//!
//! The same economic event quoted on two venues admits two leg
//! combinations: YES here + NO there, and YES there + NO here. Either
//! counter-venue side may be missing, in which case only the feasible
//! combination is priced. The cheaper feasible combination wins.

use rust_decimal::Decimal;

use super::{DetectorConfig, FULL_PAYOUT_CENTS};
use crate::domain::{epoch_millis, Cents, CrossPlatformPair, Opportunity, OpportunityStatus, Strategy};

/// One priced leg combination across the two venues.
struct LegCombo {
    cost: Decimal,
    yes_price: Cents,
    no_price: Cents,
    counter_price: Cents,
}

/// Detect cross-venue arbitrage on a mapped market pair.
#[must_use]
pub fn detect_cross_platform(
    pair: &CrossPlatformPair,
    config: &DetectorConfig,
) -> Option<Opportunity> {
    let mut best: Option<LegCombo> = None;

    // Option 1: primary YES + counter NO
    if let Some(counter_no) = pair.counter_no_price {
        if pair.yes_price > Decimal::ZERO {
            best = Some(LegCombo {
                cost: pair.yes_price + counter_no,
                yes_price: pair.yes_price,
                no_price: Decimal::ZERO,
                counter_price: counter_no,
            });
        }
    }

    // Option 2: counter YES + primary NO
    if let Some(counter_yes) = pair.counter_yes_price {
        if pair.no_price > Decimal::ZERO {
            let cost = counter_yes + pair.no_price;
            if best.as_ref().map_or(true, |combo| cost < combo.cost) {
                best = Some(LegCombo {
                    cost,
                    yes_price: Decimal::ZERO,
                    no_price: pair.no_price,
                    counter_price: counter_yes,
                });
            }
        }
    }

    let combo = best?;
    let total_cost = combo.cost + config.fees_cents;

    if total_cost >= FULL_PAYOUT_CENTS {
        return None;
    }

    let profit_cents = FULL_PAYOUT_CENTS - total_cost;
    let min_liquidity = pair.liquidity_usd.min(pair.counter_liquidity_usd);

    Some(Opportunity {
        strategy: Strategy::CrossPlatform,
        market_id: pair.market_id.clone(),
        question: pair.question.clone(),
        yes_price: combo.yes_price,
        no_price: combo.no_price,
        counter_price: Some(combo.counter_price),
        spread_pct: profit_cents,
        gross_profit_cents: profit_cents + config.fees_cents,
        fees_cents: config.fees_cents,
        net_profit_cents: profit_cents,
        net_profit_usd: profit_cents / FULL_PAYOUT_CENTS,
        min_size_usd: config.min_size_usd,
        max_size_usd: min_liquidity * Decimal::new(5, 1),
        liquidity_usd: min_liquidity,
        slippage_estimate_cents: Decimal::new(15, 2),
        confidence: 0.85,
        risk_score: 2,
        discovered_at: epoch_millis(),
        time_sensitive: true,
        status: OpportunityStatus::Active,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MarketId;
    use rust_decimal_macros::dec;

    fn make_pair(
        yes: Decimal,
        no: Decimal,
        counter_yes: Option<Decimal>,
        counter_no: Option<Decimal>,
    ) -> CrossPlatformPair {
        CrossPlatformPair {
            market_id: MarketId::new("fed-cut"),
            counter_market_id: MarketId::new("0xfedcut"),
            question: "Fed cuts rates?".into(),
            yes_price: yes,
            no_price: no,
            liquidity_usd: dec!(5000),
            counter_yes_price: counter_yes,
            counter_no_price: counter_no,
            counter_liquidity_usd: dec!(3000),
        }
    }

    #[test]
    fn detects_primary_yes_counter_no() {
        // 68 + 28 + 3 = 99 -> 1 cent profit
        let pair = make_pair(dec!(68), dec!(35), None, Some(dec!(28)));
        let opp = detect_cross_platform(&pair, &DetectorConfig::default()).unwrap();

        assert_eq!(opp.net_profit_cents, dec!(1));
        assert_eq!(opp.yes_price, dec!(68));
        assert_eq!(opp.counter_price, Some(dec!(28)));
        assert_eq!(opp.liquidity_usd, dec!(3000));
        assert_eq!(opp.risk_score, 2);
    }

    #[test]
    fn detects_counter_yes_primary_no() {
        // counter YES 60 + primary NO 30 + 3 = 93 -> 7 cents
        let pair = make_pair(dec!(75), dec!(30), Some(dec!(60)), None);
        let opp = detect_cross_platform(&pair, &DetectorConfig::default()).unwrap();

        assert_eq!(opp.net_profit_cents, dec!(7));
        assert_eq!(opp.no_price, dec!(30));
        assert_eq!(opp.counter_price, Some(dec!(60)));
    }

    #[test]
    fn picks_cheaper_of_two_feasible_combinations() {
        // Option 1: 68 + 28 = 96; option 2: 65 + 30 = 95 -> option 2 wins
        let pair = make_pair(dec!(68), dec!(30), Some(dec!(65)), Some(dec!(28)));
        let opp = detect_cross_platform(&pair, &DetectorConfig::default()).unwrap();

        assert_eq!(opp.net_profit_cents, dec!(2));
        assert_eq!(opp.counter_price, Some(dec!(65)));
    }

    #[test]
    fn zero_primary_leg_is_not_a_cheap_leg() {
        // A zero price means "no quote", not a free leg.
        let pair = make_pair(dec!(0), dec!(0), None, Some(dec!(28)));
        assert!(detect_cross_platform(&pair, &DetectorConfig::default()).is_none());
    }

    #[test]
    fn rejects_when_no_counter_prices() {
        let pair = make_pair(dec!(40), dec!(40), None, None);
        assert!(detect_cross_platform(&pair, &DetectorConfig::default()).is_none());
    }

    #[test]
    fn rejects_when_cost_reaches_payout() {
        // 69 + 28 + 3 = 100 exactly
        let pair = make_pair(dec!(69), dec!(50), None, Some(dec!(28)));
        assert!(detect_cross_platform(&pair, &DetectorConfig::default()).is_none());
    }
}
