//! Edgewire - cross-venue prediction market arbitrage detection.
//!
//! This crate ingests live price and order-book data from multiple trading
//! venues, detects arbitrage opportunities across several strategies, sizes
//! trades against real order-book depth, and gates every proposed trade
//! through a circuit-breaker risk state machine.
//!
//! # Architecture
//!
//! The decision pipeline is detect → size → gate:
//!
//! - **[`feed`]** - Reconnecting source connections and client broadcast
//!   fan-out. Venue adapters push messages in; subscribers receive the
//!   engine's periodic snapshots.
//! - **[`engine`]** - Owns the market data cache, runs the periodic scan,
//!   deduplicates opportunities and emits signals and alerts.
//! - **[`detector`]** - Pure detection functions, one per strategy:
//!   single-market, multi-outcome, three-way, cross-platform.
//! - **[`sizing`]** - VWAP depth-walk sizing that bounds slippage against
//!   displayed order-book liquidity.
//! - **[`risk`]** - Circuit breaker enforcing position, loss, and error
//!   limits with automatic trip, cooldown, and recovery.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading from TOML files
//! - [`domain`] - Venue-agnostic types: books, market shapes, opportunities
//! - [`error`] - Error types for the crate
//! - [`app`] - Application wiring (construction and lifecycle)
//!
//! # Example
//!
//! ```no_run
//! use edgewire::config::Config;
//! use edgewire::engine::DetectionEngine;
//!
//! let config = Config::default();
//! let engine = DetectionEngine::new(config.engine, config.detector);
//! ```

pub mod app;
pub mod config;
pub mod detector;
pub mod domain;
pub mod engine;
pub mod error;
pub mod feed;
pub mod risk;
pub mod sizing;
