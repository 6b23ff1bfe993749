use crate::checked::{add, div, mul};
use crate::error::AnalyticsError;
use crate::report::{AggregateStats, EquityPoint};
use core_types::EvaluatedTrade;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cmp::Ordering;

/// Profit factor reported when there are gains but no losses at all.
///
/// Distinguishes "never lost" from "no activity" (which reports zero).
pub const PROFIT_FACTOR_NO_LOSSES: Decimal = dec!(999.99);

/// Upper bound on a reported drawdown percent. A balance that falls below
/// zero is reported as a total loss of the peak.
pub const MAX_DRAWDOWN_PCT: Decimal = dec!(100);

/// A stateless calculator for deriving portfolio statistics from evaluated trades.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    starting_balance: Decimal,
}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the balance the cumulative equity curve starts from.
    pub fn with_starting_balance(mut self, starting_balance: Decimal) -> Self {
        self.starting_balance = starting_balance;
        self
    }

    pub fn starting_balance(&self) -> Decimal {
        self.starting_balance
    }

    /// The main entry point for calculating aggregate statistics.
    ///
    /// # Arguments
    ///
    /// * `trades` - Every closed trade of one user, paired with its metrics.
    ///   Trades are ordered by exit time before the streak and drawdown
    ///   passes; trades sharing an exit time keep their input order.
    ///
    /// # Returns
    ///
    /// The `AggregateStats`, or `AnalyticsError::NoTradesFound` when `trades`
    /// is empty. Sums or ratios that leave the `Decimal` range fail with
    /// `AnalyticsError::Overflow`. No partial report is ever returned.
    pub fn calculate(&self, trades: &[EvaluatedTrade]) -> Result<AggregateStats, AnalyticsError> {
        if trades.is_empty() {
            return Err(AnalyticsError::NoTradesFound);
        }

        let ordered = by_exit_time(trades);
        let mut report = AggregateStats::new();

        self.calculate_profitability(&ordered, &mut report)?;
        self.calculate_time_metrics(&ordered, &mut report)?;
        self.calculate_ratios(&mut report)?;
        report.current_streak = current_streak(&ordered);
        report.max_drawdown = self.max_drawdown(&ordered)?;

        tracing::debug!(
            total_trades = report.total_trades,
            win_rate = %report.win_rate,
            profit_factor = %report.profit_factor,
            max_drawdown = %report.max_drawdown,
            "Aggregate statistics calculated."
        );

        Ok(report)
    }

    /// Builds the cumulative balance series the drawdown is measured on.
    pub fn equity_curve(
        &self,
        trades: &[EvaluatedTrade],
    ) -> Result<Vec<EquityPoint>, AnalyticsError> {
        let mut balance = self.starting_balance;
        let mut peak = self.starting_balance;

        by_exit_time(trades)
            .into_iter()
            .map(|evaluated| -> Result<EquityPoint, AnalyticsError> {
                balance = add(balance, evaluated.profit_loss(), "balance")?;
                peak = peak.max(balance);
                Ok(EquityPoint {
                    trade_id: evaluated.trade.id,
                    exit_time: evaluated.trade.exit_time,
                    balance,
                    peak,
                    drawdown_pct: drawdown_pct(peak, balance),
                })
            })
            .collect()
    }

    /// Counts, sums, averages and extremes of profit/loss.
    fn calculate_profitability(
        &self,
        trades: &[&EvaluatedTrade],
        report: &mut AggregateStats,
    ) -> Result<(), AnalyticsError> {
        report.total_trades = trades.len();

        for evaluated in trades {
            let pnl = evaluated.profit_loss();
            report.total_profit_loss = add(report.total_profit_loss, pnl, "total profit/loss")?;

            match pnl.cmp(&Decimal::ZERO) {
                Ordering::Greater => {
                    report.winning_trades += 1;
                    report.gross_profit = add(report.gross_profit, pnl, "gross profit")?;
                    report.largest_winner = report.largest_winner.max(pnl);
                }
                Ordering::Less => {
                    report.losing_trades += 1;
                    report.gross_loss = add(report.gross_loss, pnl.abs(), "gross loss")?;
                    report.largest_loser = report.largest_loser.min(pnl);
                }
                Ordering::Equal => report.break_even_trades += 1,
            }
        }

        report.average_profit_loss = mean(report.total_profit_loss, report.total_trades);
        report.average_winner = mean(report.gross_profit, report.winning_trades);
        report.average_loser = -mean(report.gross_loss, report.losing_trades);
        Ok(())
    }

    fn calculate_time_metrics(
        &self,
        trades: &[&EvaluatedTrade],
        report: &mut AggregateStats,
    ) -> Result<(), AnalyticsError> {
        let mut total_minutes = Decimal::ZERO;
        for evaluated in trades {
            let minutes = Decimal::from(evaluated.metrics.holding_period_minutes);
            total_minutes = add(total_minutes, minutes, "holding period")?;
        }
        report.average_holding_period_minutes = mean(total_minutes, trades.len());
        Ok(())
    }

    /// Win rate, profit factor and expectancy. Depends on the counts and
    /// averages already being in `report`.
    fn calculate_ratios(&self, report: &mut AggregateStats) -> Result<(), AnalyticsError> {
        report.win_rate = win_rate(
            report.winning_trades,
            report.total_trades,
            report.break_even_trades,
        );
        report.profit_factor = profit_factor(report.gross_profit, report.gross_loss)?;

        let expected_win = mul(report.win_rate, report.average_winner, "expectancy")?;
        let expected_loss = mul(
            Decimal::ONE - report.win_rate,
            report.average_loser,
            "expectancy",
        )?;
        report.expectancy = add(expected_win, expected_loss, "expectancy")?;
        Ok(())
    }

    /// Single forward pass keeping only the running balance and peak.
    fn max_drawdown(&self, trades: &[&EvaluatedTrade]) -> Result<Decimal, AnalyticsError> {
        let mut balance = self.starting_balance;
        let mut peak = self.starting_balance;
        let mut max_drawdown = Decimal::ZERO;

        for evaluated in trades {
            balance = add(balance, evaluated.profit_loss(), "balance")?;
            peak = peak.max(balance);
            max_drawdown = max_drawdown.max(drawdown_pct(peak, balance));
        }

        Ok(max_drawdown)
    }
}

/// Stable sort by exit time, borrowing the caller's trades.
pub(crate) fn by_exit_time(trades: &[EvaluatedTrade]) -> Vec<&EvaluatedTrade> {
    let mut ordered: Vec<&EvaluatedTrade> = trades.iter().collect();
    ordered.sort_by_key(|evaluated| evaluated.trade.exit_time);
    ordered
}

/// Winners over decided trades; break-even trades are left out of the
/// denominator.
pub(crate) fn win_rate(winning: usize, total: usize, break_even: usize) -> Decimal {
    let decided = total.saturating_sub(break_even);
    if decided == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(winning) / Decimal::from(decided)
}

/// `gross_profit / gross_loss`, where `gross_loss` is a magnitude.
pub(crate) fn profit_factor(
    gross_profit: Decimal,
    gross_loss: Decimal,
) -> Result<Decimal, AnalyticsError> {
    if gross_loss.is_zero() {
        if gross_profit > Decimal::ZERO {
            return Ok(PROFIT_FACTOR_NO_LOSSES);
        }
        return Ok(Decimal::ZERO);
    }
    div(gross_profit, gross_loss, "profit factor")
}

/// Mean of `count` values summing to `sum`. Dividing by a count of at least
/// one cannot overflow.
fn mean(sum: Decimal, count: usize) -> Decimal {
    if count == 0 {
        return Decimal::ZERO;
    }
    sum / Decimal::from(count)
}

/// Percent decline of `balance` from `peak`, capped at `MAX_DRAWDOWN_PCT`.
///
/// With a positive peak the ratio stays at or below one while the balance is
/// non-negative, so an overflow means the balance fell far below zero and is
/// reported as the cap.
fn drawdown_pct(peak: Decimal, balance: Decimal) -> Decimal {
    if peak <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    peak.checked_sub(balance)
        .and_then(|decline| decline.checked_div(peak))
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .map_or(MAX_DRAWDOWN_PCT, |pct| pct.min(MAX_DRAWDOWN_PCT))
}

/// Signed length of the run of same-signed results ending at the latest
/// trade. A break-even latest trade yields 0, and an earlier break-even trade
/// ends the run.
fn current_streak(trades: &[&EvaluatedTrade]) -> i64 {
    let Some(latest) = trades.last() else {
        return 0;
    };
    let sign = sign_of(latest.profit_loss());
    if sign == 0 {
        return 0;
    }

    let run = trades
        .iter()
        .rev()
        .take_while(|evaluated| sign_of(evaluated.profit_loss()) == sign)
        .count() as i64;

    sign * run
}

fn sign_of(value: Decimal) -> i64 {
    match value.cmp(&Decimal::ZERO) {
        Ordering::Greater => 1,
        Ordering::Less => -1,
        Ordering::Equal => 0,
    }
}
