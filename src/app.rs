//! Application wiring.
//!
//! Constructs the feed manager, detection engine and circuit breaker as
//! explicitly owned objects with a start/stop lifecycle, and registers the
//! venue feeds. Callers hold references to the subsystems they need; there
//! is no global lookup.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::domain::{Cents, Dollars, MarketId, Venue};
use crate::engine::{DetectionEngine, EngineHandle};
use crate::error::{ConfigError, Error, Result};
use crate::feed::{FeedManager, SourceHandler};
use crate::risk::CircuitBreaker;

/// The assembled application.
pub struct App {
    config: Config,
    feed: Arc<FeedManager>,
    engine: Arc<DetectionEngine>,
    breaker: Arc<CircuitBreaker>,
    engine_handle: Option<EngineHandle>,
}

impl App {
    /// Construct all subsystems from a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails fast on invalid risk limits.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let feed = Arc::new(FeedManager::new(config.connection.clone()));
        let engine = Arc::new(DetectionEngine::new(
            config.engine.clone(),
            config.detector.clone(),
        ));
        let breaker = CircuitBreaker::new(config.risk.clone()).map_err(|e| {
            Error::Config(ConfigError::InvalidValue {
                field: "risk",
                reason: e.to_string(),
            })
        })?;

        Ok(Self {
            config,
            feed,
            engine,
            breaker: Arc::new(breaker),
            engine_handle: None,
        })
    }

    /// Start the broadcast worker, the venue feeds, and the scan loop.
    pub fn start(&mut self) -> Result<()> {
        self.feed.start();

        self.feed.register_source(
            Venue::Polymarket.as_str(),
            &self.config.sources.polymarket_ws,
            market_handler(self.engine.clone()),
        )?;
        self.feed.register_source(
            Venue::Limitless.as_str(),
            &self.config.sources.limitless_ws,
            market_handler(self.engine.clone()),
        )?;

        self.engine_handle = Some(self.engine.clone().spawn(self.feed.clone()));
        info!("edgewire running");
        Ok(())
    }

    /// Stop the scan loop and every connection, in that order.
    pub async fn shutdown(mut self) {
        if let Some(handle) = self.engine_handle.take() {
            handle.stop().await;
        }
        self.feed.shutdown().await;
    }

    #[must_use]
    pub fn feed(&self) -> &Arc<FeedManager> {
        &self.feed
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<DetectionEngine> {
        &self.engine
    }

    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

/// Handler turning normalized venue adapter messages into cache updates.
///
/// Adapters push `price_update` and `book_update` messages; anything else
/// is ignored. Handled updates are re-broadcast to client sinks as-is.
fn market_handler(engine: Arc<DetectionEngine>) -> Arc<dyn SourceHandler> {
    Arc::new(move |source: &str, message: &Value| {
        let venue = match source {
            "polymarket" => Venue::Polymarket,
            "limitless" => Venue::Limitless,
            _ => return None,
        };

        match message["type"].as_str()? {
            "price_update" => {
                let market_id = MarketId::new(message["market"].as_str()?);
                let yes = decimal_field(message, "yes_price")?;
                let no = decimal_field(message, "no_price")?;
                let liquidity = decimal_field(message, "liquidity").unwrap_or_default();
                let question = message["question"].as_str().unwrap_or_default();

                engine
                    .cache()
                    .update_price(venue, market_id, question, yes, no, liquidity);
                Some(message.clone())
            }
            "book_update" => {
                let market_id = MarketId::new(message["market"].as_str()?);
                let outcome = match message["outcome"].as_str()? {
                    "yes" => crate::domain::Outcome::Yes,
                    "no" => crate::domain::Outcome::No,
                    _ => return None,
                };
                let bids = levels_field(&message["bids"]);
                let asks = levels_field(&message["asks"]);

                engine
                    .cache()
                    .update_order_book(venue, market_id, outcome, bids, asks);
                Some(message.clone())
            }
            _ => None,
        }
    })
}

fn decimal_field(message: &Value, field: &str) -> Option<Cents> {
    let raw = &message[field];
    if let Some(text) = raw.as_str() {
        return text.parse().ok();
    }
    raw.as_f64().and_then(|f| Cents::try_from(f).ok())
}

fn levels_field(raw: &Value) -> Vec<crate::domain::PriceLevel> {
    raw.as_array()
        .map(|levels| {
            levels
                .iter()
                .filter_map(|level| {
                    let price: Cents = decimal_field(level, "price")?;
                    let size: Dollars = decimal_field(level, "size")?;
                    Some(crate::domain::PriceLevel::new(price, size))
                })
                .collect()
        })
        .unwrap_or_default()
}
