//! # Ledger Metrics Engine
//!
//! Derives the financial metrics of a closed position from its buy and sell facts.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** This is a pure logic crate. It has no knowledge of the
//!   persistence store or the spreadsheet format; callers supply facts and receive results.
//! - **Stateless Calculation:** `MetricsEngine` holds no state. Every calculation is a
//!   function of its arguments, which makes it trivially testable.
//!
//! ## Public API
//!
//! - `MetricsEngine`: The calculator, plus the free functions it is built from.
//! - `PositionFacts` / `PositionMetrics`: The input and output of a calculation.
//! - `AnalyticsError`: Raised for input that cannot describe a real position.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::{annualize, holding_days, net_profit, profit_rate, MetricsEngine, DAYS_PER_YEAR};
pub use error::AnalyticsError;
pub use report::{PositionFacts, PositionMetrics};
