//! Monetary types for price and size representation.
//!
//! Prediction market prices are quoted in cents on a 0-99 scale, where two
//! complementary legs summing to 100 cents represent fair value.

use rust_decimal::Decimal;

/// Price in cents (0-99 scale), represented as a Decimal for precision.
pub type Cents = Decimal;

/// Dollar amount represented as a Decimal for precision.
pub type Dollars = Decimal;
