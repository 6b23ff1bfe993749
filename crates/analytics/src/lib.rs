//! # Trade Journal Analytics Engine
//!
//! This crate turns closed trades into performance numbers: one metrics record
//! per trade, and one summary record per user.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No I/O, no storage handle, no retries. It depends only on
//!   `core-types`. Failures are returned to the caller and never logged here.
//! - **Stateless Calculation:** `MetricsCalculator` holds only the read-only
//!   instrument table; `AnalyticsEngine` holds only the starting balance. Both
//!   can be shared freely across threads.
//!
//! ## Public API
//!
//! - `MetricsCalculator`: per-trade profit/loss, risk/reward, holding period
//!   and excursions.
//! - `AnalyticsEngine`: aggregate statistics, equity curve, grouped
//!   breakdowns and k-means trade clustering over a user's evaluated trades.
//! - `AggregateStats`, `EquityPoint`, `GroupPerformance`, `TradeClusters`:
//!   the report structs.
//! - `AnalyticsError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod breakdown;
mod checked;
pub mod cluster;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use breakdown::{GroupBy, UNTAGGED};
pub use cluster::{ClusterFeature, ClusterParams};
pub use engine::{AnalyticsEngine, MAX_DRAWDOWN_PCT, PROFIT_FACTOR_NO_LOSSES};
pub use error::AnalyticsError;
pub use metrics::{MetricsCalculator, TICK_ROUNDING};
pub use report::{AggregateStats, ClusterSummary, EquityPoint, GroupPerformance, TradeClusters};
