use crate::error::JournalError;
use chrono::NaiveDate;
use core_types::EvaluatedTrade;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// The fields a trade list may be sorted by.
///
/// User-supplied sort names are parsed into this allow-list and mapped to
/// typed accessors; they never reach a query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    TradeDate,
    EntryTime,
    ExitTime,
    Ticker,
    EntryPrice,
    ExitPrice,
    Quantity,
    ProfitLoss,
    ProfitLossPercent,
    RMultiple,
    HoldingPeriodMinutes,
}

impl SortField {
    pub const ALL: [SortField; 11] = [
        SortField::TradeDate,
        SortField::EntryTime,
        SortField::ExitTime,
        SortField::Ticker,
        SortField::EntryPrice,
        SortField::ExitPrice,
        SortField::Quantity,
        SortField::ProfitLoss,
        SortField::ProfitLossPercent,
        SortField::RMultiple,
        SortField::HoldingPeriodMinutes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::TradeDate => "trade_date",
            SortField::EntryTime => "entry_time",
            SortField::ExitTime => "exit_time",
            SortField::Ticker => "ticker",
            SortField::EntryPrice => "entry_price",
            SortField::ExitPrice => "exit_price",
            SortField::Quantity => "quantity",
            SortField::ProfitLoss => "profit_loss",
            SortField::ProfitLossPercent => "profit_loss_percent",
            SortField::RMultiple => "r_multiple",
            SortField::HoldingPeriodMinutes => "holding_period_minutes",
        }
    }

    /// Ascending comparison of two trades on this field.
    pub fn compare(&self, a: &EvaluatedTrade, b: &EvaluatedTrade) -> Ordering {
        match self {
            SortField::TradeDate => a.trade.trade_date.cmp(&b.trade.trade_date),
            SortField::EntryTime => a.trade.entry_time.cmp(&b.trade.entry_time),
            SortField::ExitTime => a.trade.exit_time.cmp(&b.trade.exit_time),
            SortField::Ticker => ticker_key(&a.trade.ticker).cmp(ticker_key(&b.trade.ticker)),
            SortField::EntryPrice => a.trade.entry_price.cmp(&b.trade.entry_price),
            SortField::ExitPrice => a.trade.exit_price.cmp(&b.trade.exit_price),
            SortField::Quantity => a.trade.quantity.cmp(&b.trade.quantity),
            SortField::ProfitLoss => a.metrics.profit_loss.cmp(&b.metrics.profit_loss),
            SortField::ProfitLossPercent => a
                .metrics
                .profit_loss_percent
                .cmp(&b.metrics.profit_loss_percent),
            SortField::RMultiple => a.metrics.r_multiple.cmp(&b.metrics.r_multiple),
            SortField::HoldingPeriodMinutes => a
                .metrics
                .holding_period_minutes
                .cmp(&b.metrics.holding_period_minutes),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = JournalError;

    /// Accepts the snake_case names, case-insensitively, with `-` treated as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        SortField::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| JournalError::UnsupportedSortField(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Filters, ordering and paging for a user's trade list.
///
/// Without a sort field the input order (exit time) is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeQuery {
    /// Inclusive lower bound on `trade_date`.
    pub start_date: Option<NaiveDate>,
    /// Inclusive upper bound on `trade_date`.
    pub end_date: Option<NaiveDate>,
    pub ticker: Option<String>,
    /// Inclusive bounds on the computed net profit/loss.
    pub min_profit: Option<Decimal>,
    pub max_profit: Option<Decimal>,
    pub sort_by: Option<SortField>,
    #[serde(default)]
    pub order: SortOrder,
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl TradeQuery {
    pub fn matches(&self, evaluated: &EvaluatedTrade) -> bool {
        let trade = &evaluated.trade;
        let profit_loss = evaluated.metrics.profit_loss;

        self.start_date.is_none_or(|start| trade.trade_date >= start)
            && self.end_date.is_none_or(|end| trade.trade_date <= end)
            && self
                .ticker
                .as_deref()
                .is_none_or(|ticker| trade.ticker.trim().eq_ignore_ascii_case(ticker.trim()))
            && self.min_profit.is_none_or(|min| profit_loss >= min)
            && self.max_profit.is_none_or(|max| profit_loss <= max)
    }

    /// Filters, sorts (stable), then skips `offset` and takes `limit`.
    pub fn apply(&self, trades: Vec<EvaluatedTrade>) -> Vec<EvaluatedTrade> {
        let mut selected: Vec<EvaluatedTrade> =
            trades.into_iter().filter(|t| self.matches(t)).collect();

        if let Some(field) = self.sort_by {
            selected.sort_by(|a, b| match self.order {
                SortOrder::Ascending => field.compare(a, b),
                SortOrder::Descending => field.compare(b, a),
            });
        }

        selected
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

/// Tickers order the way they match: trimmed and case-insensitive.
fn ticker_key(ticker: &str) -> impl Iterator<Item = u8> + '_ {
    ticker.trim().bytes().map(|b| b.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::{ClosedTrade, Direction, TradeMetrics};
    use rust_decimal_macros::dec;

    fn evaluated(id: i64, ticker: &str, day: u32, pnl: Decimal) -> EvaluatedTrade {
        let entry_time = Utc.with_ymd_and_hms(2024, 4, day, 13, 0, 0).unwrap();
        let trade = ClosedTrade {
            id,
            user_id: 1,
            ticker: ticker.to_string(),
            direction: Direction::Long,
            entry_price: dec!(10),
            exit_price: dec!(10) + pnl,
            quantity: Decimal::ONE,
            trade_date: entry_time.date_naive(),
            entry_time,
            exit_time: entry_time + Duration::minutes(id),
            stop_loss: None,
            take_profit: None,
            commissions: None,
            highest_price: None,
            lowest_price: None,
            strategy_tag: None,
            notes: None,
        };
        let metrics = TradeMetrics {
            trade_id: id,
            profit_loss: pnl,
            holding_period_minutes: id,
            ..TradeMetrics::default()
        };
        EvaluatedTrade::new(trade, metrics)
    }

    fn sample() -> Vec<EvaluatedTrade> {
        vec![
            evaluated(1, "ES", 1, dec!(50)),
            evaluated(2, "AAPL", 2, dec!(-20)),
            evaluated(3, "es", 3, dec!(5)),
            evaluated(4, "GC", 4, dec!(120)),
        ]
    }

    fn ids(trades: &[EvaluatedTrade]) -> Vec<i64> {
        trades.iter().map(|t| t.trade.id).collect()
    }

    #[test]
    fn parses_allowed_sort_fields() {
        assert_eq!("profit_loss".parse::<SortField>().unwrap(), SortField::ProfitLoss);
        assert_eq!("Exit-Time".parse::<SortField>().unwrap(), SortField::ExitTime);
        for field in SortField::ALL {
            assert_eq!(field.as_str().parse::<SortField>().unwrap(), field);
        }
    }

    #[test]
    fn rejects_unknown_sort_fields() {
        let err = "entry_price; DROP TABLE trades".parse::<SortField>().unwrap_err();
        assert!(matches!(err, JournalError::UnsupportedSortField(_)));
        assert!("notes".parse::<SortField>().is_err());
    }

    #[test]
    fn empty_query_keeps_everything_in_order() {
        assert_eq!(ids(&TradeQuery::default().apply(sample())), [1, 2, 3, 4]);
    }

    #[test]
    fn filters_by_ticker_and_profit() {
        let query = TradeQuery {
            ticker: Some("ES".to_string()),
            min_profit: Some(dec!(10)),
            ..TradeQuery::default()
        };
        assert_eq!(ids(&query.apply(sample())), [1]);

        let query = TradeQuery {
            max_profit: Some(dec!(5)),
            ..TradeQuery::default()
        };
        assert_eq!(ids(&query.apply(sample())), [2, 3]);
    }

    #[test]
    fn filters_by_inclusive_date_range() {
        let query = TradeQuery {
            start_date: NaiveDate::from_ymd_opt(2024, 4, 2),
            end_date: NaiveDate::from_ymd_opt(2024, 4, 3),
            ..TradeQuery::default()
        };
        assert_eq!(ids(&query.apply(sample())), [2, 3]);
    }

    #[test]
    fn sorts_descending_then_pages() {
        let query = TradeQuery {
            sort_by: Some(SortField::ProfitLoss),
            order: SortOrder::Descending,
            offset: 1,
            limit: Some(2),
            ..TradeQuery::default()
        };
        assert_eq!(ids(&query.apply(sample())), [1, 3]);
    }

    #[test]
    fn sorts_by_ticker_ascending() {
        let query = TradeQuery {
            sort_by: Some(SortField::Ticker),
            ..TradeQuery::default()
        };
        assert_eq!(ids(&query.apply(sample())), [2, 1, 3, 4]);
    }

    #[test]
    fn ticker_sort_ignores_case_and_padding() {
        let trades = vec![
            evaluated(1, "nq", 1, dec!(1)),
            evaluated(2, " AAPL", 2, dec!(1)),
            evaluated(3, "gc ", 3, dec!(1)),
            evaluated(4, "MSFT", 4, dec!(1)),
        ];
        let query = TradeQuery {
            sort_by: Some(SortField::Ticker),
            order: SortOrder::Descending,
            ..TradeQuery::default()
        };
        assert_eq!(ids(&query.apply(trades)), [1, 4, 3, 2]);
    }
}
