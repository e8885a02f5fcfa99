//! Domain identifier types with proper encapsulation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Market condition identifier - newtype for type safety.
///
/// The inner String is private to ensure all construction goes through
/// the defined constructors.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a new MarketId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the market ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MarketId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for MarketId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A trading venue producing price and order-book data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Polymarket,
    Limitless,
}

impl Venue {
    /// Stable name used in logs, keys and broadcast payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Polymarket => "polymarket",
            Self::Limitless => "limitless",
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_id_new_and_as_str() {
        let id = MarketId::new("test-market");
        assert_eq!(id.as_str(), "test-market");
    }

    #[test]
    fn market_id_from_str() {
        let id = MarketId::from("world");
        assert_eq!(id.as_str(), "world");
    }

    #[test]
    fn market_id_display() {
        let id = MarketId::new("display-test");
        assert_eq!(format!("{}", id), "display-test");
    }

    #[test]
    fn venue_names() {
        assert_eq!(Venue::Polymarket.as_str(), "polymarket");
        assert_eq!(Venue::Limitless.to_string(), "limitless");
    }
}
