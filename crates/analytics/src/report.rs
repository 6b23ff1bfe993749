use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary statistics over all of a user's closed trades.
///
/// This struct is the output of `AnalyticsEngine::calculate`. It is computed
/// on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    // I. Counts
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub break_even_trades: usize,
    /// Winners over decided trades (break-even trades excluded), in `0..=1`.
    pub win_rate: Decimal,

    // II. Profitability
    pub total_profit_loss: Decimal,
    pub gross_profit: Decimal,
    /// Magnitude of the summed losses (non-negative).
    pub gross_loss: Decimal,
    pub average_profit_loss: Decimal,
    pub average_winner: Decimal,
    /// Mean profit/loss of the losing trades (non-positive).
    pub average_loser: Decimal,
    pub largest_winner: Decimal,
    pub largest_loser: Decimal,
    pub profit_factor: Decimal,
    pub expectancy: Decimal,

    // III. Time
    pub average_holding_period_minutes: Decimal,

    // IV. Sequence
    /// Positive for a winning streak, negative for a losing one.
    pub current_streak: i64,
    /// Largest peak-to-trough decline, as a percent of the peak.
    pub max_drawdown: Decimal,
}

impl AggregateStats {
    /// Creates a new, zeroed-out report.
    pub fn new() -> Self {
        Self {
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            break_even_trades: 0,
            win_rate: Decimal::ZERO,
            total_profit_loss: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            average_profit_loss: Decimal::ZERO,
            average_winner: Decimal::ZERO,
            average_loser: Decimal::ZERO,
            largest_winner: Decimal::ZERO,
            largest_loser: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            expectancy: Decimal::ZERO,
            average_holding_period_minutes: Decimal::ZERO,
            current_streak: 0,
            max_drawdown: Decimal::ZERO,
        }
    }
}

impl Default for AggregateStats {
    fn default() -> Self {
        Self::new()
    }
}

/// One point of the cumulative balance series, in exit-time order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub trade_id: i64,
    pub exit_time: DateTime<Utc>,
    pub balance: Decimal,
    pub peak: Decimal,
    pub drawdown_pct: Decimal,
}

/// Performance of one group of trades (an hour, a weekday, a tag, a ticker).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPerformance {
    pub label: String,
    pub trade_count: usize,
    pub total_profit_loss: Decimal,
    /// Winners over the group's decided trades. Break-even trades are left
    /// out of the denominator, as in `AggregateStats::win_rate`.
    pub win_rate: Decimal,
    pub profit_factor: Decimal,
}

/// Averages over the trades assigned to one cluster, rounded to cents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub cluster_id: usize,
    pub trade_count: usize,
    pub average_profit_loss: Decimal,
    pub average_duration_seconds: Decimal,
    pub average_mfe: Decimal,
    pub average_mae: Decimal,
}

/// The result of grouping similar trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeClusters {
    /// Cluster id of every clustered trade, keyed by trade id.
    pub assignments: BTreeMap<i64, usize>,
    /// One summary per non-empty cluster, by ascending id.
    pub clusters: Vec<ClusterSummary>,
}
