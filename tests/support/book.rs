//! Order book builders.

use edgewire::domain::{Cents, Dollars, OrderBook, PriceLevel};

pub fn level(price: Cents, size: Dollars) -> PriceLevel {
    PriceLevel::new(price, size)
}

/// Ask-only book with levels ordered best-first.
pub fn ask_book(asks: Vec<(Cents, Dollars)>) -> OrderBook {
    OrderBook::with_levels(
        vec![],
        asks.into_iter().map(|(p, s)| level(p, s)).collect(),
        0,
    )
}

/// Two-sided book with levels ordered best-first.
pub fn bid_ask_book(bids: Vec<(Cents, Dollars)>, asks: Vec<(Cents, Dollars)>) -> OrderBook {
    OrderBook::with_levels(
        bids.into_iter().map(|(p, s)| level(p, s)).collect(),
        asks.into_iter().map(|(p, s)| level(p, s)).collect(),
        0,
    )
}
