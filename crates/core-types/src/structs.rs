use crate::enums::Direction;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A completed single-fill trade: one entry, one exit.
///
/// Optional prices are genuinely optional. `None` means the value was never
/// supplied, which is not the same as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    /// Assigned by the store when the trade is persisted.
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: i64,
    pub ticker: String,
    pub direction: Direction,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: Decimal,
    pub trade_date: NaiveDate,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub stop_loss: Option<Decimal>,
    pub take_profit: Option<Decimal>,
    pub commissions: Option<Decimal>,
    /// Highest price seen while the trade was open.
    pub highest_price: Option<Decimal>,
    /// Lowest price seen while the trade was open.
    pub lowest_price: Option<Decimal>,
    pub strategy_tag: Option<String>,
    pub notes: Option<String>,
}

/// Derived per-trade metrics. Recomputing for the same `trade_id` replaces
/// the previous value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeMetrics {
    pub trade_id: i64,
    pub profit_loss: Decimal,
    pub profit_loss_percent: Decimal,
    /// Absolute reward/risk; zero when no usable stop loss was set.
    pub risk_reward_ratio: Decimal,
    /// Signed reward/risk; zero when no usable stop loss was set.
    pub r_multiple: Decimal,
    pub holding_period_minutes: i64,
    pub mfe: Decimal,
    pub mae: Decimal,
}

/// A trade paired with the metrics computed from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedTrade {
    pub trade: ClosedTrade,
    pub metrics: TradeMetrics,
}

impl EvaluatedTrade {
    pub fn new(trade: ClosedTrade, metrics: TradeMetrics) -> Self {
        Self { trade, metrics }
    }

    pub fn profit_loss(&self) -> Decimal {
        self.metrics.profit_loss
    }
}
