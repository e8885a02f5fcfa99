//! Strategy detectors.
//!
//! Pure functions mapping a market snapshot to at most one opportunity.
//! All four strategies share the same shape: sum the cents-denominated leg
//! prices plus a fee estimate into a total cost, and emit an opportunity
//! only when that cost is strictly below the 100-cent payout. Profit is
//! `100 - total_cost`.

mod cross_platform;
mod multi_outcome;
mod single_market;
mod three_way;

pub use cross_platform::detect_cross_platform;
pub use multi_outcome::detect_multi_outcome;
pub use single_market::detect_single_market;
pub use three_way::detect_three_way;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{Cents, Dollars, Opportunity};

/// Full payout of a settled winning leg, in cents.
pub(crate) const FULL_PAYOUT_CENTS: Decimal = Decimal::ONE_HUNDRED;

/// Configuration shared by all detectors.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Estimated fees per round trip, in cents.
    #[serde(default = "default_fees_cents")]
    pub fees_cents: Cents,

    /// Minimum trade size in dollars.
    #[serde(default = "default_min_size")]
    pub min_size_usd: Dollars,

    /// Higher minimum for three-way markets.
    #[serde(default = "default_three_way_min_size")]
    pub three_way_min_size_usd: Dollars,

    /// Maximum opportunity age before revalidation rejects it.
    #[serde(default = "default_max_age_ms")]
    pub max_age_ms: i64,

    /// Maximum tracked-price drift before revalidation rejects, in cents.
    #[serde(default = "default_max_price_drift")]
    pub max_price_drift_cents: Cents,
}

fn default_fees_cents() -> Cents {
    Decimal::from(3)
}

fn default_min_size() -> Dollars {
    Decimal::from(10)
}

fn default_three_way_min_size() -> Dollars {
    Decimal::from(25)
}

fn default_max_age_ms() -> i64 {
    1_000
}

fn default_max_price_drift() -> Cents {
    Decimal::ONE
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            fees_cents: default_fees_cents(),
            min_size_usd: default_min_size(),
            three_way_min_size_usd: default_three_way_min_size(),
            max_age_ms: default_max_age_ms(),
            max_price_drift_cents: default_max_price_drift(),
        }
    }
}

/// Composite confidence score from profit, liquidity, risk and slippage.
///
/// Starts at a 0.5 base, adds a profit contribution capped at 0.3 and a
/// log-liquidity contribution capped at 0.2, subtracts up to 0.3 for risk
/// and up to 0.2 for slippage, then clamps to [0, 1].
#[must_use]
pub fn composite_confidence(
    profit_cents: Cents,
    liquidity_usd: Dollars,
    risk_score: u8,
    slippage_estimate_cents: Decimal,
) -> f64 {
    let profit = profit_cents.to_f64().unwrap_or(0.0);
    let liquidity = liquidity_usd.to_f64().unwrap_or(0.0);
    let slippage = slippage_estimate_cents.to_f64().unwrap_or(0.0);

    let mut confidence = 0.5;
    confidence += (profit * 0.02).min(0.3);
    confidence += (liquidity.max(1.0).log10() * 0.05).min(0.2);
    confidence += ((5.0 - f64::from(risk_score)) * 0.05).max(-0.3);
    confidence += ((0.5 - slippage) * 0.2).max(-0.2);

    confidence.clamp(0.0, 1.0)
}

/// Revalidate an opportunity before any downstream use.
///
/// Rejects instances older than the configured maximum age, or whose
/// tracked YES price has since drifted beyond the configured bound.
#[must_use]
pub fn revalidate(
    opportunity: &Opportunity,
    current_yes_price: Option<Cents>,
    now_ms: i64,
    config: &DetectorConfig,
) -> bool {
    if opportunity.age_ms(now_ms) > config.max_age_ms {
        return false;
    }

    if let Some(price) = current_yes_price {
        let drift = (opportunity.yes_price - price).abs();
        if drift > config.max_price_drift_cents {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketId, OpportunityStatus, Strategy};
    use rust_decimal_macros::dec;

    fn make_opportunity(discovered_at: i64) -> Opportunity {
        Opportunity {
            strategy: Strategy::SingleMarket,
            market_id: MarketId::new("m1"),
            question: "Test?".into(),
            yes_price: dec!(40),
            no_price: dec!(55),
            counter_price: None,
            spread_pct: dec!(2),
            gross_profit_cents: dec!(5),
            fees_cents: dec!(3),
            net_profit_cents: dec!(2),
            net_profit_usd: dec!(0.02),
            min_size_usd: dec!(10),
            max_size_usd: dec!(500),
            liquidity_usd: dec!(1000),
            slippage_estimate_cents: dec!(0.1),
            confidence: 0.95,
            risk_score: 1,
            discovered_at,
            time_sensitive: true,
            status: OpportunityStatus::Active,
        }
    }

    #[test]
    fn confidence_is_clamped() {
        // Huge profit, deep book, minimal risk maxes out at 1.0
        let high = composite_confidence(dec!(50), dec!(1_000_000), 1, dec!(0));
        assert_eq!(high, 1.0);

        // Tiny profit, no liquidity, maximum risk bottoms out above 0
        let low = composite_confidence(dec!(0), dec!(0), 10, dec!(5));
        assert!((0.0..=1.0).contains(&low));
    }

    #[test]
    fn confidence_rewards_profit_and_liquidity() {
        let base = composite_confidence(dec!(1), dec!(100), 5, dec!(0.5));
        let richer = composite_confidence(dec!(5), dec!(100), 5, dec!(0.5));
        let deeper = composite_confidence(dec!(1), dec!(10000), 5, dec!(0.5));

        assert!(richer > base);
        assert!(deeper > base);
    }

    #[test]
    fn revalidate_rejects_stale_opportunity() {
        let config = DetectorConfig::default();
        let opp = make_opportunity(1_000);

        assert!(revalidate(&opp, None, 2_000, &config));
        assert!(!revalidate(&opp, None, 2_001, &config));
    }

    #[test]
    fn revalidate_rejects_price_drift() {
        let config = DetectorConfig::default();
        let opp = make_opportunity(1_000);

        // Within one cent: fine
        assert!(revalidate(&opp, Some(dec!(41)), 1_500, &config));
        // Moved more than one cent: stale
        assert!(!revalidate(&opp, Some(dec!(41.5)), 1_500, &config));
    }
}
