use crate::checked::{div, mul, sub};
use crate::error::AnalyticsError;
use core_types::{ClosedTrade, Direction, EvaluatedTrade, InstrumentTable, TradeMetrics};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// Rounding applied when converting a price move into whole ticks.
///
/// Midpoints round away from zero, so a move of exactly half a tick counts as
/// a full tick in either direction.
pub const TICK_ROUNDING: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

/// A stateless calculator for the metrics of a single closed trade.
///
/// The only input besides the trade itself is the instrument table, which
/// switches tick-based instruments to tick arithmetic for profit/loss.
#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    instruments: InstrumentTable,
}

impl MetricsCalculator {
    pub fn new(instruments: InstrumentTable) -> Self {
        Self { instruments }
    }

    pub fn instruments(&self) -> &InstrumentTable {
        &self.instruments
    }

    /// Computes the full metrics record for one trade.
    ///
    /// Missing optional inputs never fail: no stop loss means zero
    /// risk/reward, no extreme price means zero excursion. The only error is
    /// `AnalyticsError::Overflow`, for prices or quantities whose products
    /// leave the `Decimal` range.
    pub fn compute(&self, trade: &ClosedTrade) -> Result<TradeMetrics, AnalyticsError> {
        let profit_loss = self.profit_loss(trade)?;
        let (risk_reward_ratio, r_multiple) = risk_reward(trade)?;

        Ok(TradeMetrics {
            trade_id: trade.id,
            profit_loss,
            profit_loss_percent: profit_loss_percent(trade, profit_loss)?,
            risk_reward_ratio,
            r_multiple,
            holding_period_minutes: (trade.exit_time - trade.entry_time).num_minutes(),
            mfe: favorable_excursion(trade)?,
            mae: adverse_excursion(trade)?,
        })
    }

    /// Pairs a trade with its freshly computed metrics.
    pub fn evaluate(&self, trade: ClosedTrade) -> Result<EvaluatedTrade, AnalyticsError> {
        let metrics = self.compute(&trade)?;
        Ok(EvaluatedTrade::new(trade, metrics))
    }

    pub fn compute_all(
        &self,
        trades: &[ClosedTrade],
    ) -> Result<Vec<EvaluatedTrade>, AnalyticsError> {
        trades
            .iter()
            .map(|trade| self.evaluate(trade.clone()))
            .collect()
    }

    /// Net profit/loss after commissions.
    fn profit_loss(&self, trade: &ClosedTrade) -> Result<Decimal, AnalyticsError> {
        let price_diff = price_move(trade.direction, trade.entry_price, trade.exit_price)?;

        let gross = match self.instruments.get(&trade.ticker) {
            // The table guarantees a positive tick size.
            Some(spec) => {
                let ticks = div(price_diff, spec.tick_size, "tick count")?
                    .round_dp_with_strategy(0, TICK_ROUNDING);
                let per_contract = mul(ticks, spec.tick_size, "profit/loss")?;
                let per_contract = mul(per_contract, spec.tick_value, "profit/loss")?;
                mul(per_contract, trade.quantity, "profit/loss")?
            }
            None => mul(price_diff, trade.quantity, "profit/loss")?,
        };

        sub(gross, trade.commissions.unwrap_or(Decimal::ZERO), "profit/loss")
    }
}

/// Price movement from `from` to `to`, positive when it favours `direction`.
fn price_move(
    direction: Direction,
    from: Decimal,
    to: Decimal,
) -> Result<Decimal, AnalyticsError> {
    match direction {
        Direction::Long => sub(to, from, "price move"),
        Direction::Short => sub(from, to, "price move"),
    }
}

fn profit_loss_percent(
    trade: &ClosedTrade,
    profit_loss: Decimal,
) -> Result<Decimal, AnalyticsError> {
    let investment = mul(trade.entry_price, trade.quantity, "investment")?;
    if investment.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let fraction = div(profit_loss, investment, "profit/loss percent")?;
    mul(fraction, dec!(100), "profit/loss percent")
}

/// Returns `(risk_reward_ratio, r_multiple)`, both zero unless a positive
/// stop loss sits on the losing side of the entry.
fn risk_reward(trade: &ClosedTrade) -> Result<(Decimal, Decimal), AnalyticsError> {
    let Some(stop_loss) = trade.stop_loss.filter(|stop| *stop > Decimal::ZERO) else {
        return Ok((Decimal::ZERO, Decimal::ZERO));
    };

    // Risk is the adverse move from entry down (or up) to the stop.
    let risk = price_move(trade.direction, stop_loss, trade.entry_price)?;
    if risk <= Decimal::ZERO {
        return Ok((Decimal::ZERO, Decimal::ZERO));
    }

    let reward = price_move(trade.direction, trade.entry_price, trade.exit_price)?;
    let r_multiple = div(reward, risk, "r-multiple")?;
    Ok((r_multiple.abs(), r_multiple))
}

fn favorable_excursion(trade: &ClosedTrade) -> Result<Decimal, AnalyticsError> {
    let extreme = match trade.direction {
        Direction::Long => trade.highest_price,
        Direction::Short => trade.lowest_price,
    };
    match extreme {
        Some(price) => {
            let per_unit = price_move(trade.direction, trade.entry_price, price)?;
            mul(per_unit, trade.quantity, "favorable excursion")
        }
        None => Ok(Decimal::ZERO),
    }
}

fn adverse_excursion(trade: &ClosedTrade) -> Result<Decimal, AnalyticsError> {
    let extreme = match trade.direction {
        Direction::Long => trade.lowest_price,
        Direction::Short => trade.highest_price,
    };
    match extreme {
        Some(price) => {
            let per_unit = price_move(trade.direction, price, trade.entry_price)?;
            mul(per_unit, trade.quantity, "adverse excursion")
        }
        None => Ok(Decimal::ZERO),
    }
}
