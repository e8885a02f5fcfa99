//! Trading signals and alerts derived from opportunities.

use rust_decimal::Decimal;
use uuid::Uuid;

use super::money::Cents;

/// Signal strength, bucketed by net profit percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl SignalStrength {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weak => "weak",
            Self::Moderate => "moderate",
            Self::Strong => "strong",
            Self::VeryStrong => "very_strong",
        }
    }

    /// Bucket a net profit percentage into a strength level.
    #[must_use]
    pub fn from_net_profit_pct(pct: Decimal) -> Self {
        if pct >= Decimal::TWO {
            Self::VeryStrong
        } else if pct >= Decimal::ONE {
            Self::Strong
        } else if pct >= Decimal::new(5, 1) {
            Self::Moderate
        } else {
            Self::Weak
        }
    }
}

/// What the signal suggests doing with the opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    Execute,
    Wait,
    Skip,
}

impl Recommendation {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Wait => "wait",
            Self::Skip => "skip",
        }
    }
}

/// How quickly the recommendation should be acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    Immediate,
    Soon,
    Monitor,
}

impl Urgency {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::Soon => "soon",
            Self::Monitor => "monitor",
        }
    }
}

/// Entry signal generated once per new opportunity.
#[derive(Debug, Clone)]
pub struct Signal {
    pub id: String,
    pub opportunity_key: String,
    pub strength: SignalStrength,
    /// Composite confidence in [0, 1].
    pub confidence: f64,
    pub entry_price: Cents,
    pub target_profit_pct: Decimal,
    pub stop_loss_pct: Decimal,
    pub recommendation: Recommendation,
    pub urgency: Urgency,
    pub rationale: String,
    pub generated_at: i64,
    pub valid_until: i64,
}

impl Signal {
    /// New unique signal id.
    #[must_use]
    pub fn next_id() -> String {
        format!("sig-{}", Uuid::new_v4())
    }

    /// Whether the signal's validity window still covers `now_ms`.
    #[must_use]
    pub fn is_valid(&self, now_ms: i64) -> bool {
        now_ms <= self.valid_until
    }
}

/// Alert priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertPriority {
    Low,
    Medium,
    High,
}

impl AlertPriority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

/// Alert raised when an opportunity crosses the high-spread threshold.
///
/// Acknowledgement is the only mutation after creation.
#[derive(Debug, Clone)]
pub struct Alert {
    pub id: String,
    pub priority: AlertPriority,
    pub title: String,
    pub message: String,
    pub opportunity_key: String,
    pub created_at: i64,
    pub acknowledged: bool,
}

impl Alert {
    /// New unique alert id.
    #[must_use]
    pub fn next_id() -> String {
        format!("alert-{}", Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn strength_buckets() {
        assert_eq!(
            SignalStrength::from_net_profit_pct(dec!(2.0)),
            SignalStrength::VeryStrong
        );
        assert_eq!(
            SignalStrength::from_net_profit_pct(dec!(1.5)),
            SignalStrength::Strong
        );
        assert_eq!(
            SignalStrength::from_net_profit_pct(dec!(0.5)),
            SignalStrength::Moderate
        );
        assert_eq!(
            SignalStrength::from_net_profit_pct(dec!(0.49)),
            SignalStrength::Weak
        );
    }

    #[test]
    fn signal_validity_window() {
        let signal = Signal {
            id: Signal::next_id(),
            opportunity_key: "single_market:m1".into(),
            strength: SignalStrength::Strong,
            confidence: 0.8,
            entry_price: dec!(40),
            target_profit_pct: dec!(1.5),
            stop_loss_pct: dec!(-0.75),
            recommendation: Recommendation::Execute,
            urgency: Urgency::Immediate,
            rationale: String::new(),
            generated_at: 1_000,
            valid_until: 61_000,
        };

        assert!(signal.is_valid(61_000));
        assert!(!signal.is_valid(61_001));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(Signal::next_id(), Signal::next_id());
        assert_ne!(Alert::next_id(), Alert::next_id());
    }
}
