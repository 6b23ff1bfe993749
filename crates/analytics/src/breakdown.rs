use crate::checked::add;
use crate::engine::{AnalyticsEngine, profit_factor, win_rate};
use crate::error::AnalyticsError;
use crate::report::GroupPerformance;
use chrono::{Datelike, Timelike, Weekday};
use core_types::EvaluatedTrade;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Label used for trades that carry no strategy tag.
pub const UNTAGGED: &str = "Untagged";

/// How trades are grouped in a performance breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    /// UTC hour of the exit time, 0-23.
    HourOfDay,
    /// Weekday of the exit time, Monday first.
    DayOfWeek,
    StrategyTag,
    Ticker,
}

/// Ordering key: the rank sorts groups, the label names them.
type GroupKey = (u32, String);

#[derive(Debug, Default)]
struct GroupTotals {
    trade_count: usize,
    winning: usize,
    break_even: usize,
    total_profit_loss: Decimal,
    gross_profit: Decimal,
    gross_loss: Decimal,
}

impl GroupTotals {
    fn add(&mut self, pnl: Decimal) -> Result<(), AnalyticsError> {
        self.trade_count += 1;
        self.total_profit_loss = add(self.total_profit_loss, pnl, "group profit/loss")?;
        match pnl.cmp(&Decimal::ZERO) {
            Ordering::Greater => {
                self.winning += 1;
                self.gross_profit = add(self.gross_profit, pnl, "group gross profit")?;
            }
            Ordering::Less => {
                self.gross_loss = add(self.gross_loss, pnl.abs(), "group gross loss")?;
            }
            Ordering::Equal => self.break_even += 1,
        }
        Ok(())
    }

    fn into_performance(self, label: String) -> Result<GroupPerformance, AnalyticsError> {
        Ok(GroupPerformance {
            label,
            trade_count: self.trade_count,
            total_profit_loss: self.total_profit_loss,
            win_rate: win_rate(self.winning, self.trade_count, self.break_even),
            profit_factor: profit_factor(self.gross_profit, self.gross_loss)?,
        })
    }
}

impl AnalyticsEngine {
    /// Groups trades and reports per-group profit/loss, win rate and profit
    /// factor, using the same rules as the aggregate statistics.
    ///
    /// Hours and weekdays come out in calendar order, tags and tickers
    /// alphabetically with untagged trades last. Groups without trades are
    /// omitted, so an empty input gives an empty breakdown.
    pub fn breakdown(
        &self,
        trades: &[EvaluatedTrade],
        by: GroupBy,
    ) -> Result<Vec<GroupPerformance>, AnalyticsError> {
        let mut groups: BTreeMap<GroupKey, GroupTotals> = BTreeMap::new();

        for evaluated in trades {
            groups
                .entry(group_key(evaluated, by))
                .or_default()
                .add(evaluated.profit_loss())?;
        }

        groups
            .into_iter()
            .map(|((_, label), totals)| totals.into_performance(label))
            .collect()
    }
}

fn group_key(evaluated: &EvaluatedTrade, by: GroupBy) -> GroupKey {
    let trade = &evaluated.trade;
    match by {
        GroupBy::HourOfDay => {
            let hour = trade.exit_time.hour();
            (hour, format!("{hour:02}:00"))
        }
        GroupBy::DayOfWeek => {
            let weekday = trade.exit_time.weekday();
            (weekday.num_days_from_monday(), weekday_name(weekday).to_string())
        }
        GroupBy::StrategyTag => match trade.strategy_tag.as_deref().map(str::trim) {
            Some(tag) if !tag.is_empty() => (0, tag.to_string()),
            _ => (1, UNTAGGED.to_string()),
        },
        GroupBy::Ticker => (0, trade.ticker.trim().to_ascii_uppercase()),
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PROFIT_FACTOR_NO_LOSSES;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use core_types::{ClosedTrade, Direction, TradeMetrics};
    use rust_decimal_macros::dec;

    fn evaluated(
        ticker: &str,
        tag: Option<&str>,
        exit_time: DateTime<Utc>,
        pnl: Decimal,
    ) -> EvaluatedTrade {
        let trade = ClosedTrade {
            id: 1,
            user_id: 1,
            ticker: ticker.to_string(),
            direction: Direction::Short,
            entry_price: dec!(50),
            exit_price: dec!(50) - pnl,
            quantity: Decimal::ONE,
            trade_date: exit_time.date_naive(),
            entry_time: exit_time,
            exit_time,
            stop_loss: None,
            take_profit: None,
            commissions: None,
            highest_price: None,
            lowest_price: None,
            strategy_tag: tag.map(str::to_string),
            notes: None,
        };
        let metrics = TradeMetrics {
            trade_id: 1,
            profit_loss: pnl,
            ..TradeMetrics::default()
        };
        EvaluatedTrade::new(trade, metrics)
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        // 2024-07-01 is a Monday.
        let date = NaiveDate::from_ymd_opt(2024, 7, day).unwrap();
        Utc.from_utc_datetime(&date.and_hms_opt(hour, 15, 0).unwrap())
    }

    #[test]
    fn groups_by_hour_in_order() {
        let trades = vec![
            evaluated("ES", None, at(1, 15), dec!(20)),
            evaluated("ES", None, at(2, 9), dec!(-10)),
            evaluated("ES", None, at(3, 15), dec!(-5)),
        ];

        let groups = AnalyticsEngine::new().breakdown(&trades, GroupBy::HourOfDay).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "09:00");
        assert_eq!(groups[0].trade_count, 1);
        assert_eq!(groups[0].win_rate, Decimal::ZERO);
        assert_eq!(groups[1].label, "15:00");
        assert_eq!(groups[1].total_profit_loss, dec!(15));
        assert_eq!(groups[1].win_rate, dec!(0.5));
        assert_eq!(groups[1].profit_factor, dec!(4));
    }

    #[test]
    fn groups_by_weekday_monday_first() {
        let trades = vec![
            evaluated("NQ", None, at(7, 10), dec!(3)),
            evaluated("NQ", None, at(3, 10), dec!(1)),
            evaluated("NQ", None, at(1, 10), dec!(2)),
        ];

        let labels: Vec<String> = AnalyticsEngine::new()
            .breakdown(&trades, GroupBy::DayOfWeek)
            .unwrap()
            .into_iter()
            .map(|group| group.label)
            .collect();

        assert_eq!(labels, ["Monday", "Wednesday", "Sunday"]);
    }

    #[test]
    fn untagged_trades_come_last() {
        let trades = vec![
            evaluated("ES", None, at(1, 10), dec!(-4)),
            evaluated("ES", Some("breakout"), at(1, 11), dec!(8)),
            evaluated("ES", Some("  "), at(1, 12), dec!(0)),
            evaluated("ES", Some("anchored vwap"), at(1, 13), dec!(1)),
        ];

        let groups = AnalyticsEngine::new().breakdown(&trades, GroupBy::StrategyTag).unwrap();

        let labels: Vec<&str> = groups.iter().map(|group| group.label.as_str()).collect();
        assert_eq!(labels, ["anchored vwap", "breakout", UNTAGGED]);
        assert_eq!(groups[1].profit_factor, PROFIT_FACTOR_NO_LOSSES);
        // One loss and one break-even: the break-even is not a decided trade.
        assert_eq!(groups[2].trade_count, 2);
        assert_eq!(groups[2].win_rate, Decimal::ZERO);
    }

    #[test]
    fn groups_by_normalized_ticker() {
        let trades = vec![
            evaluated("es", None, at(1, 10), dec!(5)),
            evaluated("ES", None, at(1, 11), dec!(5)),
            evaluated("GC", None, at(1, 12), dec!(-2)),
        ];

        let groups = AnalyticsEngine::new().breakdown(&trades, GroupBy::Ticker).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].label, "ES");
        assert_eq!(groups[0].trade_count, 2);
        assert_eq!(groups[1].label, "GC");
    }

    #[test]
    fn break_even_trades_count_but_do_not_dilute_win_rate() {
        let trades = vec![
            evaluated("CL", None, at(2, 10), dec!(30)),
            evaluated("CL", None, at(2, 11), dec!(0)),
            evaluated("CL", None, at(2, 12), dec!(-10)),
        ];

        let groups = AnalyticsEngine::new().breakdown(&trades, GroupBy::Ticker).unwrap();

        assert_eq!(groups[0].trade_count, 3);
        assert_eq!(groups[0].win_rate, dec!(0.5));
    }

    #[test]
    fn empty_input_gives_empty_breakdown() {
        assert!(AnalyticsEngine::new().breakdown(&[], GroupBy::Ticker).unwrap().is_empty());
    }

    #[test]
    fn group_overflow_is_an_error() {
        let trades = vec![
            evaluated("ES", None, at(1, 10), Decimal::MAX),
            evaluated("ES", None, at(1, 11), Decimal::MAX),
        ];
        let err = AnalyticsEngine::new()
            .breakdown(&trades, GroupBy::Ticker)
            .unwrap_err();
        assert_eq!(err, AnalyticsError::Overflow("group profit/loss"));
    }
}
