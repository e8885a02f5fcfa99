//! Circuit breaker state machine round trips.

use std::sync::Arc;

use edgewire::domain::{MarketId, TradeResult};
use edgewire::risk::{BreakerState, CircuitBreaker, RiskConfig, RiskViolation};
use rust_decimal_macros::dec;

fn fill(market: &str, size: rust_decimal::Decimal) -> TradeResult {
    TradeResult {
        market_id: MarketId::new(market),
        size_usd: size,
        fill_price: dec!(48),
        realized_pnl_usd: dec!(0),
        gas_cost_usd: dec!(0.25),
        execution_time_ms: Some(80),
    }
}

#[test]
fn daily_loss_trip_cooldown_and_recovery() {
    let breaker = CircuitBreaker::new(RiskConfig {
        error_cooldown_ms: 20,
        ..RiskConfig::default()
    })
    .unwrap();

    assert_eq!(breaker.get_state(), BreakerState::Closed);

    // A trade whose worst case blows the daily loss budget trips it.
    let verdict = breaker.validate_trade(&MarketId::new("m1"), dec!(100), dec!(600));
    assert!(!verdict.can_execute());
    assert!(matches!(
        verdict.violation(),
        Some(RiskViolation::DailyLossLimit { .. })
    ));
    assert_eq!(breaker.get_state(), BreakerState::Open);
    assert!(!breaker.can_trade());

    // While open, everything fails closed.
    let while_open = breaker.validate_trade(&MarketId::new("m1"), dec!(1), dec!(0));
    assert!(matches!(
        while_open.violation(),
        Some(RiskViolation::TradingHalted { .. })
    ));

    // After the cooldown the breaker re-opens provisionally.
    std::thread::sleep(std::time::Duration::from_millis(40));
    assert_eq!(breaker.get_state(), BreakerState::HalfOpen);
    assert!(breaker.can_trade());

    // Healthy P&L and a clean error counter close it fully.
    breaker.record_success(&fill("m1", dec!(50)));
    assert_eq!(breaker.get_state(), BreakerState::Closed);
}

#[test]
fn consecutive_errors_trip_and_one_success_resets() {
    let breaker = CircuitBreaker::new(RiskConfig {
        max_consecutive_errors: 5,
        ..RiskConfig::default()
    })
    .unwrap();

    for _ in 0..4 {
        breaker.handle_error("venue timeout");
    }
    assert_eq!(breaker.get_state(), BreakerState::Closed);

    breaker.handle_error("venue timeout");
    assert_eq!(breaker.get_state(), BreakerState::Open);

    breaker.force_reset();
    breaker.handle_error("venue timeout");
    breaker.record_success(&fill("m1", dec!(10)));
    assert_eq!(breaker.status().error_count, 0);
    assert_eq!(breaker.status().consecutive_errors, 0);
}

#[test]
fn concurrent_validations_cannot_oversubscribe_a_market() {
    let breaker = Arc::new(
        CircuitBreaker::new(RiskConfig {
            max_position_per_market_usd: dec!(1000),
            max_total_position_usd: dec!(10000),
            ..RiskConfig::default()
        })
        .unwrap(),
    );

    // Eight racers each try to reserve 400 in the same market; at most
    // two fit under the 1000 cap.
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let breaker = breaker.clone();
            std::thread::spawn(move || {
                breaker
                    .validate_trade(&MarketId::new("m1"), dec!(400), dec!(1))
                    .can_execute()
            })
        })
        .collect();

    let approvals = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|&approved| approved)
        .count();
    assert_eq!(approvals, 2);
}

#[test]
fn validation_order_daily_loss_before_per_trade() {
    let breaker = CircuitBreaker::new(RiskConfig::default()).unwrap();

    // 600 breaches both the daily budget (500) and the per-trade cap (5);
    // the daily check wins and trips the breaker.
    let verdict = breaker.validate_trade(&MarketId::new("m1"), dec!(10), dec!(600));
    assert!(matches!(
        verdict.violation(),
        Some(RiskViolation::DailyLossLimit { .. })
    ));
    assert_eq!(breaker.get_state(), BreakerState::Open);
}

#[test]
fn daily_metrics_accumulate_and_report() {
    let breaker = CircuitBreaker::new(RiskConfig::default()).unwrap();

    breaker.record_success(&TradeResult {
        realized_pnl_usd: dec!(12),
        ..fill("m1", dec!(100))
    });
    breaker.handle_error("partial fill");
    breaker.record_success(&TradeResult {
        realized_pnl_usd: dec!(-2),
        ..fill("m2", dec!(50))
    });

    let metrics = breaker.daily_metrics();
    assert_eq!(metrics.total_trades, 2);
    assert_eq!(metrics.successful_trades, 2);
    assert_eq!(metrics.failed_trades, 1);
    assert_eq!(metrics.total_pnl_usd, dec!(10));
    assert_eq!(metrics.total_gas_spent_usd, dec!(0.5));
    assert_eq!(metrics.consecutive_errors, 0);

    assert_eq!(breaker.positions().len(), 2);
    assert_eq!(breaker.total_position(), dec!(150));
}

#[test]
fn released_reservation_does_not_become_a_position() {
    let breaker = CircuitBreaker::new(RiskConfig {
        max_position_per_market_usd: dec!(500),
        max_total_position_usd: dec!(5000),
        ..RiskConfig::default()
    })
    .unwrap();
    let market = MarketId::new("m1");

    assert!(breaker.validate_trade(&market, dec!(400), dec!(1)).can_execute());
    // Execution fell through; free the headroom.
    breaker.handle_error("order rejected");
    breaker.release_reservation(&market, dec!(400));

    assert!(breaker.position(&market).is_none());
    assert!(breaker.validate_trade(&market, dec!(400), dec!(1)).can_execute());
}
