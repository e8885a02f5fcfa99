//! Market data cache.
//!
//! Latest known per-venue, per-instrument state with update timestamps.
//! Mutated only through the update calls below; read-only to detectors.
//! Staleness is derived on read, never stored.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::{
    epoch_millis, Cents, CrossPlatformPair, Dollars, MarketId, MultiOutcomeMarket, OrderBook,
    Outcome, PriceLevel, SingleMarket, ThreeWayMarket, Venue,
};

/// Latest binary-market quote from one venue.
#[derive(Debug, Clone)]
pub struct PriceQuote {
    pub question: String,
    pub yes_price: Cents,
    pub no_price: Cents,
    pub liquidity_usd: Dollars,
    pub updated_at: i64,
}

impl PriceQuote {
    fn is_fresh(&self, now_ms: i64, staleness_ms: i64) -> bool {
        now_ms - self.updated_at <= staleness_ms
    }
}

/// Thread-safe cache of venue market data.
///
/// Owned by the detection engine; venue adapters feed it through the
/// update calls, which must be safe to call at arbitrary frequency.
#[derive(Default)]
pub struct MarketDataCache {
    quotes: RwLock<HashMap<(Venue, MarketId), PriceQuote>>,
    books: RwLock<HashMap<(Venue, MarketId, Outcome), OrderBook>>,
    multi_outcome: RwLock<HashMap<MarketId, (MultiOutcomeMarket, i64)>>,
    three_way: RwLock<HashMap<MarketId, (ThreeWayMarket, i64)>>,
    /// Primary-venue market to counter-venue market.
    mappings: RwLock<HashMap<MarketId, MarketId>>,
}

impl MarketDataCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the latest price quote for an instrument, stamping now.
    pub fn update_price(
        &self,
        venue: Venue,
        market_id: MarketId,
        question: &str,
        yes_price: Cents,
        no_price: Cents,
        liquidity_usd: Dollars,
    ) {
        let quote = PriceQuote {
            question: question.to_string(),
            yes_price,
            no_price,
            liquidity_usd,
            updated_at: epoch_millis(),
        };
        self.quotes.write().insert((venue, market_id), quote);
    }

    /// Store the latest order book for one side of an instrument.
    pub fn update_order_book(
        &self,
        venue: Venue,
        market_id: MarketId,
        outcome: Outcome,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) {
        let book = OrderBook::with_levels(bids, asks, epoch_millis());
        self.books.write().insert((venue, market_id, outcome), book);
    }

    /// Store a multi-outcome market snapshot.
    pub fn update_multi_outcome(&self, market: MultiOutcomeMarket) {
        self.multi_outcome
            .write()
            .insert(market.market_id.clone(), (market, epoch_millis()));
    }

    /// Store a three-way market snapshot.
    pub fn update_three_way(&self, market: ThreeWayMarket) {
        self.three_way
            .write()
            .insert(market.market_id.clone(), (market, epoch_millis()));
    }

    /// Declare that two instruments across venues are the same economic
    /// event, enabling cross-platform detection.
    pub fn add_mapping(&self, primary: MarketId, counter: MarketId) {
        self.mappings.write().insert(primary, counter);
    }

    /// Snapshot of one quote.
    pub fn quote(&self, venue: Venue, market_id: &MarketId) -> Option<PriceQuote> {
        self.quotes
            .read()
            .get(&(venue, market_id.clone()))
            .cloned()
    }

    /// Snapshot of one order book.
    pub fn book(&self, venue: Venue, market_id: &MarketId, outcome: Outcome) -> Option<OrderBook> {
        self.books
            .read()
            .get(&(venue, market_id.clone(), outcome))
            .cloned()
    }

    /// Fresh binary markets across all venues, with invalid (non-positive)
    /// quotes skipped.
    pub fn fresh_single_markets(&self, now_ms: i64, staleness_ms: i64) -> Vec<SingleMarket> {
        self.quotes
            .read()
            .iter()
            .filter(|(_, quote)| quote.is_fresh(now_ms, staleness_ms))
            .filter(|(_, quote)| {
                quote.yes_price > Cents::ZERO && quote.no_price > Cents::ZERO
            })
            .map(|((_, market_id), quote)| SingleMarket {
                market_id: market_id.clone(),
                question: quote.question.clone(),
                yes_price: quote.yes_price,
                no_price: quote.no_price,
                liquidity_usd: quote.liquidity_usd,
            })
            .collect()
    }

    /// Fresh multi-outcome snapshots.
    pub fn fresh_multi_outcome(&self, now_ms: i64, staleness_ms: i64) -> Vec<MultiOutcomeMarket> {
        self.multi_outcome
            .read()
            .values()
            .filter(|(_, updated_at)| now_ms - updated_at <= staleness_ms)
            .map(|(market, _)| market.clone())
            .collect()
    }

    /// Fresh three-way snapshots.
    pub fn fresh_three_way(&self, now_ms: i64, staleness_ms: i64) -> Vec<ThreeWayMarket> {
        self.three_way
            .read()
            .values()
            .filter(|(_, updated_at)| now_ms - updated_at <= staleness_ms)
            .map(|(market, _)| market.clone())
            .collect()
    }

    /// Cross-venue pairs where both mapped quotes are fresh.
    ///
    /// Counter-venue legs with non-positive prices are reported as absent
    /// so the detector only evaluates feasible combinations.
    pub fn fresh_cross_pairs(&self, now_ms: i64, staleness_ms: i64) -> Vec<CrossPlatformPair> {
        let quotes = self.quotes.read();
        self.mappings
            .read()
            .iter()
            .filter_map(|(primary, counter)| {
                let primary_quote = quotes.get(&(Venue::Polymarket, primary.clone()))?;
                let counter_quote = quotes.get(&(Venue::Limitless, counter.clone()))?;

                if !primary_quote.is_fresh(now_ms, staleness_ms)
                    || !counter_quote.is_fresh(now_ms, staleness_ms)
                {
                    return None;
                }

                Some(CrossPlatformPair {
                    market_id: primary.clone(),
                    counter_market_id: counter.clone(),
                    question: primary_quote.question.clone(),
                    yes_price: primary_quote.yes_price,
                    no_price: primary_quote.no_price,
                    liquidity_usd: primary_quote.liquidity_usd,
                    counter_yes_price: (counter_quote.yes_price > Cents::ZERO)
                        .then_some(counter_quote.yes_price),
                    counter_no_price: (counter_quote.no_price > Cents::ZERO)
                        .then_some(counter_quote.no_price),
                    counter_liquidity_usd: counter_quote.liquidity_usd,
                })
            })
            .collect()
    }

    /// Number of tracked quotes for one venue.
    pub fn tracked_markets(&self, venue: Venue) -> usize {
        self.quotes
            .read()
            .keys()
            .filter(|(v, _)| *v == venue)
            .count()
    }

    /// Number of cached order books.
    pub fn tracked_books(&self) -> usize {
        self.books.read().len()
    }

    /// Number of declared cross-venue mappings.
    pub fn mapping_count(&self) -> usize {
        self.mappings.read().len()
    }
}
