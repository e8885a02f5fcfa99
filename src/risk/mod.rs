//! Circuit breaker risk management.
//!
//! Every proposed trade passes through [`CircuitBreaker::validate_trade`]
//! before execution, and every outcome is reported back through
//! [`CircuitBreaker::record_success`] or [`CircuitBreaker::handle_error`].
//! The breaker enforces position, loss and error limits and halts trading
//! automatically when they are breached.
//!
//! State transitions:
//! - `Closed` → `Open` when a limit trips
//! - `Open` → `HalfOpen` after the cooldown elapses (error count halved,
//!   not zeroed, to stay cautious)
//! - `HalfOpen` → `Closed` once conditions recover, or back to `Open` on
//!   renewed failure
//!
//! Approval atomically reserves the trade size for its market inside the
//! validation critical section, so two concurrent validations cannot both
//! pass a position cap against a stale snapshot. A reservation is committed
//! by `record_success` or freed with `release_reservation`.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::domain::{epoch_millis, Cents, DailyMetrics, Dollars, MarketId, Position, TradeResult};

/// Risk limit configuration. Validated at construction.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_position_per_market")]
    pub max_position_per_market_usd: Dollars,

    #[serde(default = "default_max_total_position")]
    pub max_total_position_usd: Dollars,

    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss_usd: Dollars,

    #[serde(default = "default_max_loss_per_trade")]
    pub max_loss_per_trade_usd: Dollars,

    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    #[serde(default = "default_error_cooldown_ms")]
    pub error_cooldown_ms: i64,

    /// Reserve headroom for gas when estimating worst-case loss, in cents.
    #[serde(default = "default_gas_buffer_cents")]
    pub gas_buffer_cents: Cents,
}

fn default_max_position_per_market() -> Dollars {
    Decimal::from(50_000)
}

fn default_max_total_position() -> Dollars {
    Decimal::from(100_000)
}

fn default_max_daily_loss() -> Dollars {
    Decimal::from(500)
}

fn default_max_loss_per_trade() -> Dollars {
    Decimal::from(5)
}

fn default_max_consecutive_errors() -> u32 {
    5
}

fn default_error_cooldown_ms() -> i64 {
    60_000
}

fn default_gas_buffer_cents() -> Cents {
    Decimal::from(3)
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_per_market_usd: default_max_position_per_market(),
            max_total_position_usd: default_max_total_position(),
            max_daily_loss_usd: default_max_daily_loss(),
            max_loss_per_trade_usd: default_max_loss_per_trade(),
            max_consecutive_errors: default_max_consecutive_errors(),
            error_cooldown_ms: default_error_cooldown_ms(),
            gas_buffer_cents: default_gas_buffer_cents(),
        }
    }
}

/// Invalid risk configuration, rejected at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskConfigError {
    #[error("max_position_per_market_usd must be positive")]
    NonPositiveMarketLimit,

    #[error("max_total_position_usd must be positive")]
    NonPositiveTotalLimit,

    #[error("max_total_position_usd must be >= max_position_per_market_usd")]
    TotalBelowMarketLimit,

    #[error("max_daily_loss_usd must be positive")]
    NonPositiveDailyLoss,

    #[error("max_loss_per_trade_usd must be non-negative")]
    NegativePerTradeLoss,

    #[error("max_consecutive_errors must be positive")]
    ZeroErrorLimit,

    #[error("gas_buffer_cents must be non-negative")]
    NegativeGasBuffer,
}

impl RiskConfig {
    /// Validate limit relationships.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), RiskConfigError> {
        if self.max_position_per_market_usd <= Decimal::ZERO {
            return Err(RiskConfigError::NonPositiveMarketLimit);
        }
        if self.max_total_position_usd <= Decimal::ZERO {
            return Err(RiskConfigError::NonPositiveTotalLimit);
        }
        if self.max_total_position_usd < self.max_position_per_market_usd {
            return Err(RiskConfigError::TotalBelowMarketLimit);
        }
        if self.max_daily_loss_usd <= Decimal::ZERO {
            return Err(RiskConfigError::NonPositiveDailyLoss);
        }
        if self.max_loss_per_trade_usd < Decimal::ZERO {
            return Err(RiskConfigError::NegativePerTradeLoss);
        }
        if self.max_consecutive_errors == 0 {
            return Err(RiskConfigError::ZeroErrorLimit);
        }
        if self.gas_buffer_cents < Decimal::ZERO {
            return Err(RiskConfigError::NegativeGasBuffer);
        }
        Ok(())
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Trading allowed (normal operation).
    Closed,
    /// Trading halted (tripped).
    Open,
    /// Trading provisionally allowed while conditions are re-checked.
    HalfOpen,
}

impl BreakerState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// A specific risk check violation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskViolation {
    #[error("circuit breaker is {}", state.as_str())]
    TradingHalted { state: BreakerState },

    #[error("daily loss limit would be exceeded: projected {projected}")]
    DailyLossLimit { projected: Dollars },

    #[error("per-trade loss limit exceeded: {estimated} > {limit}")]
    PerTradeLossLimit { estimated: Dollars, limit: Dollars },

    #[error("position limit for market {market_id} would be exceeded: {projected} > {limit}")]
    MarketPositionLimit {
        market_id: String,
        projected: Dollars,
        limit: Dollars,
    },

    #[error("total position limit would be exceeded: {projected} > {limit}")]
    TotalPositionLimit { projected: Dollars, limit: Dollars },
}

/// Outcome of a trade validation. A rejection is a normal, expected value,
/// never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Approved,
    Rejected(RiskViolation),
}

impl Verdict {
    #[must_use]
    pub const fn can_execute(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Human-readable rejection reason, if rejected.
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Approved => None,
            Self::Rejected(violation) => Some(violation.to_string()),
        }
    }

    #[must_use]
    pub const fn violation(&self) -> Option<&RiskViolation> {
        match self {
            Self::Approved => None,
            Self::Rejected(violation) => Some(violation),
        }
    }
}

/// Point-in-time breaker status for observability.
#[derive(Debug, Clone)]
pub struct BreakerStatus {
    pub state: BreakerState,
    pub can_trade: bool,
    pub error_count: u32,
    pub consecutive_errors: u32,
    pub daily_pnl_usd: Dollars,
    pub daily_loss_remaining_usd: Dollars,
    pub total_positions: usize,
    pub trip_time: Option<i64>,
}

struct BreakerInner {
    state: BreakerState,
    trip_time: Option<i64>,
    error_count: u32,
    positions: HashMap<MarketId, Position>,
    /// Approved-but-uncommitted trade sizes per market.
    reserved: HashMap<MarketId, Dollars>,
    daily: DailyMetrics,
}

impl BreakerInner {
    fn total_position(&self) -> Dollars {
        self.positions.values().map(|p| p.quantity).sum()
    }

    fn total_reserved(&self) -> Dollars {
        self.reserved.values().copied().sum()
    }

    fn release(&mut self, market_id: &MarketId, size_usd: Dollars) {
        let drained = match self.reserved.get_mut(market_id) {
            Some(reserved) => {
                *reserved -= size_usd;
                *reserved <= Decimal::ZERO
            }
            None => false,
        };
        if drained {
            self.reserved.remove(market_id);
        }
    }

    fn market_exposure(&self, market_id: &MarketId) -> Dollars {
        let held = self
            .positions
            .get(market_id)
            .map(|p| p.quantity)
            .unwrap_or_default();
        let reserved = self.reserved.get(market_id).copied().unwrap_or_default();
        held + reserved
    }

    /// Replace the daily record when the UTC date has rolled over.
    fn roll_day(&mut self) {
        let today = Utc::now().date_naive();
        if self.daily.date != today {
            info!(date = %today, "Daily metrics rolled over");
            self.daily = DailyMetrics::for_date(today);
        }
    }

    fn trip(&mut self, reason: &str, now_ms: i64) {
        self.state = BreakerState::Open;
        self.trip_time = Some(now_ms);
        error!(reason, "Circuit breaker tripped");
    }

    /// Lazy transitions performed on every read.
    fn transition(&mut self, config: &RiskConfig, now_ms: i64) {
        self.roll_day();

        if self.state == BreakerState::HalfOpen
            && self.error_count == 0
            && self.daily.consecutive_errors < config.max_consecutive_errors
            && self.daily.total_pnl_usd > -config.max_daily_loss_usd
        {
            self.state = BreakerState::Closed;
            self.error_count = 0;
            self.trip_time = None;
            info!("Circuit breaker half_open -> closed (conditions improved)");
        }

        if self.state == BreakerState::Open {
            if let Some(trip_time) = self.trip_time {
                if now_ms - trip_time > config.error_cooldown_ms {
                    self.state = BreakerState::HalfOpen;
                    // Halve rather than zero the error count to stay cautious.
                    self.error_count = (self.error_count / 2).max(1);
                    info!("Circuit breaker open -> half_open (cooldown elapsed)");
                }
            }
        }
    }
}

/// Circuit breaker gating all trade execution.
///
/// Explicitly constructed and passed by reference; holds one mutex over all
/// breaker state so that validation, reservation and commit are serialized.
pub struct CircuitBreaker {
    config: RiskConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker in the `Closed` state.
    ///
    /// # Errors
    ///
    /// Fails fast on an invalid configuration.
    pub fn new(config: RiskConfig) -> Result<Self, RiskConfigError> {
        config.validate()?;
        info!(
            max_daily_loss = %config.max_daily_loss_usd,
            max_total_position = %config.max_total_position_usd,
            "Circuit breaker initialized (closed)"
        );
        Ok(Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                trip_time: None,
                error_count: 0,
                positions: HashMap::new(),
                reserved: HashMap::new(),
                daily: DailyMetrics::for_date(Utc::now().date_naive()),
            }),
        })
    }

    /// Current state, applying any pending lazy transitions.
    pub fn get_state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        inner.transition(&self.config, epoch_millis());
        inner.state
    }

    /// Whether trading is currently allowed.
    pub fn can_trade(&self) -> bool {
        matches!(
            self.get_state(),
            BreakerState::Closed | BreakerState::HalfOpen
        )
    }

    /// Validate a proposed trade and, on approval, reserve its size.
    ///
    /// Checks run in order: breaker state, projected daily loss (a breach
    /// trips the breaker), per-trade loss cap, per-market position cap,
    /// total position cap. The first violated check wins. Approval reserves
    /// `size_usd` against the market inside the same critical section;
    /// commit it with [`record_success`](Self::record_success) or free it
    /// with [`release_reservation`](Self::release_reservation).
    pub fn validate_trade(
        &self,
        market_id: &MarketId,
        size_usd: Dollars,
        estimated_loss_usd: Dollars,
    ) -> Verdict {
        let now_ms = epoch_millis();
        let mut inner = self.inner.lock();
        inner.transition(&self.config, now_ms);

        if !matches!(inner.state, BreakerState::Closed | BreakerState::HalfOpen) {
            return Verdict::Rejected(RiskViolation::TradingHalted { state: inner.state });
        }

        let projected = inner.daily.total_pnl_usd - estimated_loss_usd;
        if projected < -self.config.max_daily_loss_usd {
            inner.trip(&format!("daily loss limit exceeded: {projected}"), now_ms);
            return Verdict::Rejected(RiskViolation::DailyLossLimit { projected });
        }

        if estimated_loss_usd > self.config.max_loss_per_trade_usd {
            return Verdict::Rejected(RiskViolation::PerTradeLossLimit {
                estimated: estimated_loss_usd,
                limit: self.config.max_loss_per_trade_usd,
            });
        }

        let market_projected = inner.market_exposure(market_id) + size_usd;
        if market_projected > self.config.max_position_per_market_usd {
            warn!(
                market = %market_id,
                projected = %market_projected,
                limit = %self.config.max_position_per_market_usd,
                "Per-market position limit would be exceeded"
            );
            return Verdict::Rejected(RiskViolation::MarketPositionLimit {
                market_id: market_id.to_string(),
                projected: market_projected,
                limit: self.config.max_position_per_market_usd,
            });
        }

        let total_projected = inner.total_position() + inner.total_reserved() + size_usd;
        if total_projected > self.config.max_total_position_usd {
            return Verdict::Rejected(RiskViolation::TotalPositionLimit {
                projected: total_projected,
                limit: self.config.max_total_position_usd,
            });
        }

        *inner.reserved.entry(market_id.clone()).or_default() += size_usd;
        Verdict::Approved
    }

    /// Free a reservation made by a previous approval.
    ///
    /// Call after a failed or abandoned execution attempt.
    pub fn release_reservation(&self, market_id: &MarketId, size_usd: Dollars) {
        let mut inner = self.inner.lock();
        inner.release(market_id, size_usd);
    }

    /// Record a successful trade, committing its reservation into the
    /// position book and resetting the error counters.
    pub fn record_success(&self, result: &TradeResult) {
        let now_ms = epoch_millis();
        let mut inner = self.inner.lock();
        inner.roll_day();

        // Commit the reservation into a position.
        inner.release(&result.market_id, result.size_usd);
        match inner.positions.get_mut(&result.market_id) {
            Some(position) => position.apply_fill(result.size_usd, result.fill_price, now_ms),
            None => {
                let position = Position::open(
                    result.market_id.clone(),
                    result.size_usd,
                    result.fill_price,
                    now_ms,
                );
                inner.positions.insert(result.market_id.clone(), position);
            }
        }

        inner.daily.total_trades += 1;
        inner.daily.successful_trades += 1;
        inner.daily.total_pnl_usd += result.realized_pnl_usd;
        inner.daily.total_gas_spent_usd += result.gas_cost_usd;

        inner.error_count = 0;
        inner.daily.consecutive_errors = 0;

        info!(
            market = %result.market_id,
            size = %result.size_usd,
            pnl = %result.realized_pnl_usd,
            "Trade recorded"
        );
    }

    /// Record a failed trade execution.
    ///
    /// Trips the breaker once the live error count reaches the configured
    /// maximum.
    pub fn handle_error(&self, message: &str) {
        let now_ms = epoch_millis();
        let mut inner = self.inner.lock();
        inner.roll_day();

        inner.error_count += 1;
        inner.daily.consecutive_errors += 1;
        inner.daily.failed_trades += 1;

        error!(
            errors = inner.error_count,
            limit = self.config.max_consecutive_errors,
            error = message,
            "Trade execution error"
        );

        if inner.error_count >= self.config.max_consecutive_errors {
            let reason = format!("too many consecutive errors: {}", inner.error_count);
            inner.trip(&reason, now_ms);
        }
    }

    /// Manually reset to `Closed`, clearing counters and the trip time.
    pub fn force_reset(&self) {
        warn!("Circuit breaker manual reset");
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.error_count = 0;
        inner.trip_time = None;
        inner.daily.consecutive_errors = 0;
    }

    /// Manually trip to `Open` (emergency stop).
    pub fn force_trip(&self, reason: &str) {
        warn!(reason, "Circuit breaker manual trip");
        let mut inner = self.inner.lock();
        inner.trip(&format!("manual: {reason}"), epoch_millis());
    }

    /// Position for one market, if any.
    pub fn position(&self, market_id: &MarketId) -> Option<Position> {
        self.inner.lock().positions.get(market_id).cloned()
    }

    /// All open positions.
    pub fn positions(&self) -> Vec<Position> {
        self.inner.lock().positions.values().cloned().collect()
    }

    /// Total position size across all markets.
    pub fn total_position(&self) -> Dollars {
        self.inner.lock().total_position()
    }

    /// Sum of unrealized P&L across positions.
    pub fn unrealized_pnl(&self) -> Dollars {
        self.inner
            .lock()
            .positions
            .values()
            .map(|p| p.unrealized_pnl_usd)
            .sum()
    }

    /// Today's metrics, rolling the record over if the UTC date changed.
    pub fn daily_metrics(&self) -> DailyMetrics {
        let mut inner = self.inner.lock();
        inner.roll_day();
        inner.daily.clone()
    }

    /// Point-in-time status snapshot.
    pub fn status(&self) -> BreakerStatus {
        let mut inner = self.inner.lock();
        inner.transition(&self.config, epoch_millis());

        let state = inner.state;
        BreakerStatus {
            state,
            can_trade: matches!(state, BreakerState::Closed | BreakerState::HalfOpen),
            error_count: inner.error_count,
            consecutive_errors: inner.daily.consecutive_errors,
            daily_pnl_usd: inner.daily.total_pnl_usd,
            daily_loss_remaining_usd: self.config.max_daily_loss_usd
                - inner.daily.total_pnl_usd.abs(),
            total_positions: inner.positions.len(),
            trip_time: inner.trip_time,
        }
    }

    /// The configuration the breaker was built with.
    #[must_use]
    pub const fn config(&self) -> &RiskConfig {
        &self.config
    }
}
