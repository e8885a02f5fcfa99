//! Detection engine.
//!
//! Owns the market data cache, runs the periodic scan, invokes the
//! strategy detectors, deduplicates opportunities and emits signals and
//! alerts. The scan is synchronous and effectively atomic: a tick either
//! fully completes or is abandoned before mutating engine-visible state.

mod cache;

pub use cache::{MarketDataCache, PriceQuote};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::detector::{
    composite_confidence, detect_cross_platform, detect_multi_outcome, detect_single_market,
    detect_three_way, DetectorConfig,
};
use crate::domain::{
    epoch_millis, Alert, AlertPriority, Opportunity, OpportunityStatus, Recommendation, Signal,
    SignalStrength, Urgency,
};
use crate::feed::FeedManager;

/// Detection engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Scan period in milliseconds.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// Snapshots older than this are skipped by the scan.
    #[serde(default = "default_stale_threshold_ms")]
    pub stale_data_threshold_ms: i64,

    /// Spread change below this is not treated as an update, in
    /// percentage points.
    #[serde(default = "default_spread_update_threshold")]
    pub spread_update_threshold_pct: Decimal,

    /// Spread at or above this raises a high-priority alert.
    #[serde(default = "default_high_spread_threshold")]
    pub high_spread_threshold_pct: Decimal,

    /// Signal validity window in seconds.
    #[serde(default = "default_signal_validity_secs")]
    pub signal_validity_secs: i64,
}

fn default_scan_interval_ms() -> u64 {
    1_000
}

fn default_stale_threshold_ms() -> i64 {
    5_000
}

fn default_spread_update_threshold() -> Decimal {
    Decimal::new(1, 1)
}

fn default_high_spread_threshold() -> Decimal {
    Decimal::TWO
}

fn default_signal_validity_secs() -> i64 {
    60
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: default_scan_interval_ms(),
            stale_data_threshold_ms: default_stale_threshold_ms(),
            spread_update_threshold_pct: default_spread_update_threshold(),
            high_spread_threshold_pct: default_high_spread_threshold(),
            signal_validity_secs: default_signal_validity_secs(),
        }
    }
}

/// Counters describing one scan tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Opportunities produced by detectors this tick.
    pub detected: usize,
    /// Previously unseen keys.
    pub new: usize,
    /// Keys whose spread moved beyond the update threshold.
    pub updated: usize,
    /// Active opportunities that aged out without re-confirmation.
    pub expired: usize,
}

/// Engine status counters for health reporting.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub total_opportunities_found: u64,
    pub active_opportunities: usize,
    pub active_signals: usize,
    pub pending_alerts: usize,
    pub tracked_polymarket_markets: usize,
    pub tracked_limitless_markets: usize,
    pub tracked_books: usize,
    pub asset_mappings: usize,
}

struct EngineState {
    opportunities: HashMap<String, Opportunity>,
    signals: Vec<Signal>,
    alerts: Vec<Alert>,
    total_found: u64,
}

/// Detection engine over the market data cache.
///
/// Explicitly constructed and shared by reference; the scan loop is the
/// single mutator of opportunity state.
pub struct DetectionEngine {
    config: EngineConfig,
    detector_config: DetectorConfig,
    cache: MarketDataCache,
    state: Mutex<EngineState>,
}

impl DetectionEngine {
    #[must_use]
    pub fn new(config: EngineConfig, detector_config: DetectorConfig) -> Self {
        Self {
            config,
            detector_config,
            cache: MarketDataCache::new(),
            state: Mutex::new(EngineState {
                opportunities: HashMap::new(),
                signals: Vec::new(),
                alerts: Vec::new(),
                total_found: 0,
            }),
        }
    }

    /// The cache fed by venue adapters.
    #[must_use]
    pub fn cache(&self) -> &MarketDataCache {
        &self.cache
    }

    /// The detector configuration in use.
    #[must_use]
    pub const fn detector_config(&self) -> &DetectorConfig {
        &self.detector_config
    }

    /// Run one scan over every cached instrument and mapped pair.
    ///
    /// Stale snapshots are skipped. A detection with an unseen key counts
    /// as new and generates exactly one signal, plus one alert when its
    /// spread reaches the high-spread threshold. A re-detection whose
    /// spread moved beyond the update threshold supersedes the stored
    /// instance without duplicate notifications. Active opportunities
    /// that aged out without re-confirmation are marked expired.
    pub fn scan(&self) -> ScanSummary {
        let now = epoch_millis();
        let staleness = self.config.stale_data_threshold_ms;

        let mut detections: Vec<Opportunity> = Vec::new();
        for market in self.cache.fresh_single_markets(now, staleness) {
            detections.extend(detect_single_market(&market, &self.detector_config));
        }
        for market in self.cache.fresh_multi_outcome(now, staleness) {
            detections.extend(detect_multi_outcome(&market, &self.detector_config));
        }
        for market in self.cache.fresh_three_way(now, staleness) {
            detections.extend(detect_three_way(&market, &self.detector_config));
        }
        for pair in self.cache.fresh_cross_pairs(now, staleness) {
            detections.extend(detect_cross_platform(&pair, &self.detector_config));
        }

        let mut summary = ScanSummary {
            detected: detections.len(),
            ..ScanSummary::default()
        };

        let mut state = self.state.lock();
        let mut seen: HashSet<String> = HashSet::with_capacity(detections.len());

        for opportunity in detections {
            let key = opportunity.key();
            seen.insert(key.clone());

            match state.opportunities.get(&key) {
                None => {
                    summary.new += 1;
                    state.total_found += 1;
                    info!(
                        key = %key,
                        spread = %opportunity.spread_pct,
                        profit = %opportunity.net_profit_usd,
                        "New opportunity"
                    );
                    self.on_new_opportunity(&mut state, &opportunity, now);
                    state.opportunities.insert(key, opportunity);
                }
                Some(existing) => {
                    let delta = (opportunity.spread_pct - existing.spread_pct).abs();
                    if delta > self.config.spread_update_threshold_pct {
                        summary.updated += 1;
                        debug!(key = %key, delta = %delta, "Opportunity superseded");
                        state.opportunities.insert(key, opportunity);
                    }
                }
            }
        }

        // Expire actives that were not re-confirmed and have aged out.
        for (key, opportunity) in state.opportunities.iter_mut() {
            if opportunity.is_active()
                && !seen.contains(key)
                && opportunity.age_ms(now) > staleness
            {
                opportunity.status = OpportunityStatus::Expired;
                summary.expired += 1;
            }
        }

        summary
    }

    fn on_new_opportunity(&self, state: &mut EngineState, opportunity: &Opportunity, now: i64) {
        let signal = self.generate_signal(opportunity, now);
        state.signals.push(signal);

        if opportunity.spread_pct >= self.config.high_spread_threshold_pct {
            let alert = self.generate_alert(opportunity, now);
            state.alerts.push(alert);
        }
    }

    fn generate_signal(&self, opportunity: &Opportunity, now: i64) -> Signal {
        let strength = SignalStrength::from_net_profit_pct(opportunity.net_profit_cents);

        let (recommendation, urgency) =
            if opportunity.risk_score <= 3 && opportunity.confidence >= 0.7 {
                let urgency = if opportunity.time_sensitive {
                    Urgency::Immediate
                } else {
                    Urgency::Soon
                };
                (Recommendation::Execute, urgency)
            } else if opportunity.risk_score <= 5 {
                (Recommendation::Wait, Urgency::Monitor)
            } else {
                (Recommendation::Skip, Urgency::Monitor)
            };

        Signal {
            id: Signal::next_id(),
            opportunity_key: opportunity.key(),
            strength,
            confidence: composite_confidence(
                opportunity.net_profit_cents,
                opportunity.liquidity_usd,
                opportunity.risk_score,
                opportunity.slippage_estimate_cents,
            ),
            entry_price: opportunity.yes_price,
            target_profit_pct: opportunity.net_profit_cents,
            stop_loss_pct: -opportunity.net_profit_cents / Decimal::TWO,
            recommendation,
            urgency,
            rationale: format!(
                "Spread: {:.2}%, net profit: {:.2}%, risk: {}/10",
                opportunity.spread_pct, opportunity.net_profit_cents, opportunity.risk_score
            ),
            generated_at: now,
            valid_until: now + self.config.signal_validity_secs * 1_000,
        }
    }

    fn generate_alert(&self, opportunity: &Opportunity, now: i64) -> Alert {
        let priority = if opportunity.spread_pct >= self.config.high_spread_threshold_pct {
            AlertPriority::High
        } else if opportunity.net_profit_cents >= Decimal::ONE {
            AlertPriority::Medium
        } else {
            AlertPriority::Low
        };

        let mut question = opportunity.question.clone();
        question.truncate(50);

        Alert {
            id: Alert::next_id(),
            priority,
            title: format!("Arbitrage: {:.2}% spread", opportunity.spread_pct),
            message: format!(
                "{question} - net profit: ${:.2}",
                opportunity.net_profit_usd
            ),
            opportunity_key: opportunity.key(),
            created_at: now,
            acknowledged: false,
        }
    }

    /// All active opportunities. Iteration order is not meaningful;
    /// consumers sort by profit or confidence themselves.
    pub fn active_opportunities(&self) -> Vec<Opportunity> {
        self.state
            .lock()
            .opportunities
            .values()
            .filter(|o| o.is_active())
            .cloned()
            .collect()
    }

    /// The most recent `limit` signals, oldest first.
    pub fn recent_signals(&self, limit: usize) -> Vec<Signal> {
        let state = self.state.lock();
        let skip = state.signals.len().saturating_sub(limit);
        state.signals[skip..].to_vec()
    }

    /// All unacknowledged alerts.
    pub fn unacknowledged_alerts(&self) -> Vec<Alert> {
        self.state
            .lock()
            .alerts
            .iter()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect()
    }

    /// Acknowledge one alert. Returns false for an unknown id.
    pub fn acknowledge_alert(&self, alert_id: &str) -> bool {
        let mut state = self.state.lock();
        match state.alerts.iter_mut().find(|a| a.id == alert_id) {
            Some(alert) => {
                alert.acknowledged = true;
                true
            }
            None => false,
        }
    }

    /// Explicitly close an opportunity. Returns false for an unknown key.
    pub fn close_opportunity(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        match state.opportunities.get_mut(key) {
            Some(opportunity) => {
                opportunity.status = OpportunityStatus::Closed;
                true
            }
            None => false,
        }
    }

    /// Status counters for health reporting.
    pub fn status(&self) -> EngineStatus {
        let now = epoch_millis();
        let state = self.state.lock();
        EngineStatus {
            total_opportunities_found: state.total_found,
            active_opportunities: state.opportunities.values().filter(|o| o.is_active()).count(),
            active_signals: state.signals.iter().filter(|s| s.is_valid(now)).count(),
            pending_alerts: state.alerts.iter().filter(|a| !a.acknowledged).count(),
            tracked_polymarket_markets: self.cache.tracked_markets(crate::domain::Venue::Polymarket),
            tracked_limitless_markets: self.cache.tracked_markets(crate::domain::Venue::Limitless),
            tracked_books: self.cache.tracked_books(),
            asset_mappings: self.cache.mapping_count(),
        }
    }

    /// JSON summary pushed to every client sink on the scan cadence:
    /// top 10 opportunities by net profit, last 5 signals, up to 5
    /// unacknowledged alerts, and the status block.
    pub fn broadcast_snapshot(&self) -> Value {
        let mut opportunities = self.active_opportunities();
        opportunities.sort_by(|a, b| b.net_profit_usd.cmp(&a.net_profit_usd));
        opportunities.truncate(10);

        let signals = self.recent_signals(5);
        let mut alerts = self.unacknowledged_alerts();
        alerts.truncate(5);
        let status = self.status();

        json!({
            "type": "arbitrage_update",
            "data": {
                "opportunities": opportunities.iter().map(|o| json!({
                    "key": o.key(),
                    "question": o.question.chars().take(100).collect::<String>(),
                    "strategy": o.strategy.as_str(),
                    "spread_pct": o.spread_pct,
                    "net_profit_usd": o.net_profit_usd,
                    "confidence": o.confidence,
                    "risk_score": o.risk_score,
                    "time_sensitive": o.time_sensitive,
                })).collect::<Vec<_>>(),
                "signals": signals.iter().map(|s| json!({
                    "id": s.id,
                    "strength": s.strength.as_str(),
                    "recommendation": s.recommendation.as_str(),
                    "urgency": s.urgency.as_str(),
                    "confidence": s.confidence,
                })).collect::<Vec<_>>(),
                "alerts": alerts.iter().map(|a| json!({
                    "id": a.id,
                    "priority": a.priority.as_str(),
                    "title": a.title,
                    "message": a.message,
                })).collect::<Vec<_>>(),
                "status": {
                    "total_opportunities_found": status.total_opportunities_found,
                    "active_opportunities": status.active_opportunities,
                    "active_signals": status.active_signals,
                    "pending_alerts": status.pending_alerts,
                    "tracked_polymarket_markets": status.tracked_polymarket_markets,
                    "tracked_limitless_markets": status.tracked_limitless_markets,
                    "asset_mappings": status.asset_mappings,
                },
                "timestamp": epoch_millis(),
            }
        })
    }

    /// Start the periodic scan loop on its own task.
    ///
    /// One cooperative loop: a tick runs the scan to completion, pushes
    /// the snapshot to the feed layer, then sleeps until the next period.
    /// Never runs concurrently with itself; cancellable between ticks.
    #[must_use]
    pub fn spawn(self: Arc<Self>, feed: Arc<FeedManager>) -> EngineHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = std::time::Duration::from_millis(self.config.scan_interval_ms);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "Scan loop started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    _ = ticker.tick() => {
                        let summary = self.scan();
                        if summary.new > 0 || summary.updated > 0 || summary.expired > 0 {
                            debug!(
                                detected = summary.detected,
                                new = summary.new,
                                updated = summary.updated,
                                expired = summary.expired,
                                "Scan tick"
                            );
                        }
                        feed.broadcast("engine", self.broadcast_snapshot());
                    }
                }
            }
            info!("Scan loop stopped");
        });

        EngineHandle {
            shutdown_tx,
            handle,
        }
    }
}

/// Handle to a running scan loop.
pub struct EngineHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl EngineHandle {
    /// Stop the loop between ticks and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MarketId, Venue};
    use rust_decimal_macros::dec;

    fn engine() -> DetectionEngine {
        DetectionEngine::new(EngineConfig::default(), DetectorConfig::default())
    }

    fn seed_single(engine: &DetectionEngine, market: &str, yes: Decimal, no: Decimal) {
        engine.cache().update_price(
            Venue::Polymarket,
            MarketId::new(market),
            "Test?",
            yes,
            no,
            dec!(1000),
        );
    }

    #[test]
    fn scan_produces_opportunity_and_signal() {
        let engine = engine();
        seed_single(&engine, "m1", dec!(40), dec!(55));

        let summary = engine.scan();
        assert_eq!(summary.detected, 1);
        assert_eq!(summary.new, 1);

        let active = engine.active_opportunities();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].net_profit_usd, dec!(0.02));

        let signals = engine.recent_signals(5);
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].opportunity_key, "single_market:m1");
    }

    #[test]
    fn second_scan_with_unchanged_prices_emits_nothing_new() {
        let engine = engine();
        seed_single(&engine, "m1", dec!(40), dec!(55));

        let first = engine.scan();
        assert_eq!(first.new, 1);

        let second = engine.scan();
        assert_eq!(second.new, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(engine.recent_signals(10).len(), 1);
        assert_eq!(engine.status().total_opportunities_found, 1);
    }

    #[test]
    fn spread_move_beyond_threshold_is_an_update_without_new_signal() {
        let engine = engine();
        seed_single(&engine, "m1", dec!(40), dec!(55));
        engine.scan();

        // 40 + 54 + 3 = 97: spread moves from 2 to 3 percentage points
        seed_single(&engine, "m1", dec!(40), dec!(54));
        let summary = engine.scan();

        assert_eq!(summary.new, 0);
        assert_eq!(summary.updated, 1);
        assert_eq!(engine.recent_signals(10).len(), 1);

        let active = engine.active_opportunities();
        assert_eq!(active[0].net_profit_cents, dec!(3));
    }

    #[test]
    fn spread_move_within_threshold_is_ignored() {
        let engine = DetectionEngine::new(
            EngineConfig {
                spread_update_threshold_pct: dec!(2.5),
                ..EngineConfig::default()
            },
            DetectorConfig::default(),
        );
        seed_single(&engine, "m1", dec!(40), dec!(55));
        engine.scan();

        seed_single(&engine, "m1", dec!(40), dec!(54));
        let summary = engine.scan();

        assert_eq!(summary.updated, 0);
        // The stored instance keeps its original spread.
        assert_eq!(engine.active_opportunities()[0].net_profit_cents, dec!(2));
    }

    #[test]
    fn high_spread_raises_exactly_one_alert() {
        let engine = engine();
        // 40 + 50 + 3 = 93: 7 point spread, over the 2 point threshold
        seed_single(&engine, "m1", dec!(40), dec!(50));

        engine.scan();
        engine.scan();

        let alerts = engine.unacknowledged_alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].priority, AlertPriority::High);

        assert!(engine.acknowledge_alert(&alerts[0].id));
        assert!(engine.unacknowledged_alerts().is_empty());
        assert!(!engine.acknowledge_alert("alert-missing"));
    }

    #[test]
    fn low_spread_opportunity_gets_signal_but_no_alert() {
        let engine = engine();
        // 48 + 48 + 3 = 99: 1 point spread, below the alert threshold
        seed_single(&engine, "m1", dec!(48), dec!(48));

        engine.scan();

        assert_eq!(engine.recent_signals(5).len(), 1);
        assert!(engine.unacknowledged_alerts().is_empty());
    }

    #[test]
    fn execute_recommendation_for_low_risk_high_confidence() {
        let engine = engine();
        seed_single(&engine, "m1", dec!(40), dec!(50));
        engine.scan();

        let signals = engine.recent_signals(1);
        let signal = &signals[0];
        // Single-market: risk 1, confidence 0.95, time-sensitive
        assert_eq!(signal.recommendation, Recommendation::Execute);
        assert_eq!(signal.urgency, Urgency::Immediate);
        assert_eq!(signal.strength, SignalStrength::VeryStrong);
    }

    #[test]
    fn close_opportunity_removes_from_active_set() {
        let engine = engine();
        seed_single(&engine, "m1", dec!(40), dec!(55));
        engine.scan();

        assert!(engine.close_opportunity("single_market:m1"));
        assert!(engine.active_opportunities().is_empty());
        assert!(!engine.close_opportunity("single_market:nope"));
    }

    #[test]
    fn snapshot_has_expected_shape() {
        let engine = engine();
        seed_single(&engine, "m1", dec!(40), dec!(50));
        engine.scan();

        let snapshot = engine.broadcast_snapshot();
        assert_eq!(snapshot["type"], "arbitrage_update");

        let data = &snapshot["data"];
        assert_eq!(data["opportunities"].as_array().unwrap().len(), 1);
        assert_eq!(data["signals"].as_array().unwrap().len(), 1);
        assert_eq!(data["alerts"].as_array().unwrap().len(), 1);
        assert_eq!(data["status"]["active_opportunities"], 1);
        assert_eq!(data["status"]["tracked_polymarket_markets"], 1);
    }

    #[test]
    fn snapshot_orders_opportunities_by_profit() {
        let engine = engine();
        seed_single(&engine, "small", dec!(48), dec!(48));
        seed_single(&engine, "large", dec!(40), dec!(50));
        engine.scan();

        let snapshot = engine.broadcast_snapshot();
        let opportunities = snapshot["data"]["opportunities"].as_array().unwrap();
        assert_eq!(opportunities[0]["key"], "single_market:large");
        assert_eq!(opportunities[1]["key"], "single_market:small");
    }

    #[test]
    fn multi_outcome_and_three_way_flow_through_scan() {
        use crate::domain::{MultiOutcomeMarket, OutcomeQuote, TeamQuote, ThreeWayMarket};

        let engine = engine();
        engine.cache().update_multi_outcome(MultiOutcomeMarket {
            market_id: MarketId::new("election"),
            question: "Who wins?".into(),
            outcomes: vec![
                OutcomeQuote {
                    name: "A".into(),
                    yes_price: dec!(35),
                    liquidity_usd: dec!(4000),
                },
                OutcomeQuote {
                    name: "B".into(),
                    yes_price: dec!(40),
                    liquidity_usd: dec!(4000),
                },
                OutcomeQuote {
                    name: "C".into(),
                    yes_price: dec!(17),
                    liquidity_usd: dec!(4000),
                },
            ],
        });
        engine.cache().update_three_way(ThreeWayMarket {
            market_id: MarketId::new("derby"),
            question: "Derby result".into(),
            home: TeamQuote {
                yes_price: dec!(20),
                no_price: dec!(70),
            },
            away: TeamQuote {
                yes_price: dec!(40),
                no_price: dec!(30),
            },
            draw_price: dec!(15),
            liquidity_usd: dec!(2000),
        });

        let summary = engine.scan();
        assert_eq!(summary.new, 2);

        let mut keys: Vec<String> = engine
            .active_opportunities()
            .iter()
            .map(Opportunity::key)
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["multi_outcome:election", "three_way:derby"]);
    }
}
