use crate::error::JournalError;
use crate::import::{ImportOutcome, ImportRejection, parse_trades};
use crate::query::TradeQuery;
use crate::store::TradeStore;
use analytics::{
    AggregateStats, AnalyticsEngine, ClusterParams, EquityPoint, GroupBy, GroupPerformance,
    MetricsCalculator, TradeClusters,
};
use core_types::{ClosedTrade, EvaluatedTrade, TradeMetrics};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Records trades, keeps their metrics current and answers analytics
/// requests for a user.
///
/// Metrics are computed when a trade is recorded or updated and persisted
/// through the store. Aggregates are never stored; they are calculated on
/// demand from the user's full trade history.
pub struct JournalService {
    store: Arc<dyn TradeStore>,
    calculator: MetricsCalculator,
    engine: AnalyticsEngine,
}

impl JournalService {
    pub fn new(
        store: Arc<dyn TradeStore>,
        calculator: MetricsCalculator,
        engine: AnalyticsEngine,
    ) -> Self {
        Self {
            store,
            calculator,
            engine,
        }
    }

    /// Validates and persists a new trade, then stores its metrics.
    ///
    /// Metrics are computed before the insert, so a trade whose numbers
    /// overflow is rejected without being stored.
    pub async fn record_trade(&self, trade: ClosedTrade) -> Result<EvaluatedTrade, JournalError> {
        validate(&trade)?;
        let mut metrics = self.calculator.compute(&trade)?;
        let stored = self.store.insert_trade(trade).await?;
        metrics.trade_id = stored.id;
        self.store.upsert_metrics(metrics.clone()).await?;
        let evaluated = EvaluatedTrade::new(stored, metrics);

        info!(
            trade_id = evaluated.trade.id,
            user_id = evaluated.trade.user_id,
            ticker = %evaluated.trade.ticker,
            direction = %evaluated.trade.direction,
            profit_loss = %evaluated.metrics.profit_loss,
            "Trade recorded."
        );
        Ok(evaluated)
    }

    /// Replaces an existing trade and recomputes its metrics.
    ///
    /// A trade stays with the user who recorded it: an update carrying a
    /// different `user_id` is rejected.
    pub async fn update_trade(&self, trade: ClosedTrade) -> Result<EvaluatedTrade, JournalError> {
        validate(&trade)?;
        let existing = self.store.get_trade(trade.id).await?;
        if existing.user_id != trade.user_id {
            return Err(JournalError::InvalidTrade(format!(
                "trade {} belongs to user {}, not {}",
                trade.id, existing.user_id, trade.user_id
            )));
        }
        let evaluated = self.calculator.evaluate(trade)?;
        self.store.update_trade(evaluated.trade.clone()).await?;
        self.store.upsert_metrics(evaluated.metrics.clone()).await?;

        info!(trade_id = evaluated.trade.id, "Trade updated.");
        Ok(evaluated)
    }

    pub async fn delete_trade(&self, trade_id: i64) -> Result<(), JournalError> {
        self.store.delete_trade(trade_id).await?;
        info!(trade_id, "Trade deleted.");
        Ok(())
    }

    /// The stored metrics of a trade, computing and storing them if absent.
    pub async fn trade_metrics(&self, trade_id: i64) -> Result<TradeMetrics, JournalError> {
        if let Some(metrics) = self.store.get_metrics(trade_id).await? {
            return Ok(metrics);
        }
        let trade = self.store.get_trade(trade_id).await?;
        let metrics = self.calculator.compute(&trade)?;
        self.store.upsert_metrics(metrics.clone()).await?;
        Ok(metrics)
    }

    /// Recomputes and stores the metrics of every trade of a user, for
    /// example after the instrument table changed. Returns the trade count.
    pub async fn recompute_metrics(&self, user_id: i64) -> Result<usize, JournalError> {
        let trades = self.store.list_closed_trades(user_id).await?;
        let count = trades.len();
        for trade in &trades {
            self.store.upsert_metrics(self.calculator.compute(trade)?).await?;
        }
        info!(user_id, count, "Metrics recomputed.");
        Ok(count)
    }

    /// Every trade of a user with its metrics, ordered by exit time.
    pub async fn evaluated_trades(
        &self,
        user_id: i64,
    ) -> Result<Vec<EvaluatedTrade>, JournalError> {
        let trades = self.store.list_closed_trades(user_id).await?;
        let mut evaluated = Vec::with_capacity(trades.len());

        for trade in trades {
            let metrics = match self.store.get_metrics(trade.id).await? {
                Some(metrics) => metrics,
                None => {
                    debug!(trade_id = trade.id, "Metrics missing, computing.");
                    let metrics = self.calculator.compute(&trade)?;
                    self.store.upsert_metrics(metrics.clone()).await?;
                    metrics
                }
            };
            evaluated.push(EvaluatedTrade::new(trade, metrics));
        }
        Ok(evaluated)
    }

    pub async fn statistics(&self, user_id: i64) -> Result<AggregateStats, JournalError> {
        let trades = self.evaluated_trades(user_id).await?;
        Ok(self.engine.calculate(&trades)?)
    }

    pub async fn equity_curve(&self, user_id: i64) -> Result<Vec<EquityPoint>, JournalError> {
        let trades = self.evaluated_trades(user_id).await?;
        Ok(self.engine.equity_curve(&trades)?)
    }

    pub async fn breakdown(
        &self,
        user_id: i64,
        by: GroupBy,
    ) -> Result<Vec<GroupPerformance>, JournalError> {
        let trades = self.evaluated_trades(user_id).await?;
        Ok(self.engine.breakdown(&trades, by)?)
    }

    /// K-means clusters over the user's trades.
    pub async fn clusters(
        &self,
        user_id: i64,
        params: &ClusterParams,
    ) -> Result<TradeClusters, JournalError> {
        let trades = self.evaluated_trades(user_id).await?;
        Ok(self.engine.cluster(&trades, params)?)
    }

    pub async fn search_trades(
        &self,
        user_id: i64,
        query: &TradeQuery,
    ) -> Result<Vec<EvaluatedTrade>, JournalError> {
        let trades = self.evaluated_trades(user_id).await?;
        Ok(query.apply(trades))
    }

    /// Imports a JSON array of trades for `user_id`.
    ///
    /// A record that fails to parse or validate is logged and skipped; the
    /// rest of the batch is still recorded.
    pub async fn import_json(
        &self,
        user_id: i64,
        json: &str,
    ) -> Result<ImportOutcome, JournalError> {
        let mut outcome = ImportOutcome::default();

        for (index, parsed) in parse_trades(json)?.into_iter().enumerate() {
            let result = match parsed {
                Ok(mut trade) => {
                    trade.user_id = user_id;
                    self.record_trade(trade).await
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(evaluated) => outcome.recorded.push(evaluated.trade),
                Err(error) => {
                    warn!(index, error = %error, "Skipping trade record.");
                    outcome.rejected.push(ImportRejection { index, error });
                }
            }
        }

        info!(
            user_id,
            recorded = outcome.recorded.len(),
            rejected = outcome.rejected.len(),
            "Trade import finished."
        );
        Ok(outcome)
    }
}

fn validate(trade: &ClosedTrade) -> Result<(), JournalError> {
    if trade.ticker.trim().is_empty() {
        return Err(JournalError::InvalidTrade("ticker is empty".to_string()));
    }
    if trade.quantity <= Decimal::ZERO {
        return Err(JournalError::InvalidTrade(format!(
            "quantity must be positive, got {}",
            trade.quantity
        )));
    }
    if trade.exit_time < trade.entry_time {
        return Err(JournalError::InvalidTrade(
            "exit time is before entry time".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{SortField, SortOrder};
    use crate::store::InMemoryTradeStore;
    use analytics::{AnalyticsError, ClusterFeature};
    use chrono::{Duration, TimeZone, Utc};
    use core_types::{Direction, InstrumentSpec, InstrumentTable};
    use rust_decimal_macros::dec;

    fn service() -> JournalService {
        let instruments =
            InstrumentTable::from_specs([("ES", InstrumentSpec::new(dec!(12.5), dec!(0.25)))])
                .unwrap();
        JournalService::new(
            Arc::new(InMemoryTradeStore::new()),
            MetricsCalculator::new(instruments),
            AnalyticsEngine::new(),
        )
    }

    fn trade(ticker: &str, entry: Decimal, exit: Decimal, minutes_in: i64) -> ClosedTrade {
        let entry_time = Utc.with_ymd_and_hms(2024, 3, 4, 14, 0, 0).unwrap()
            + Duration::minutes(minutes_in);
        ClosedTrade {
            id: 0,
            user_id: 7,
            ticker: ticker.to_string(),
            direction: Direction::Long,
            entry_price: entry,
            exit_price: exit,
            quantity: Decimal::ONE,
            trade_date: entry_time.date_naive(),
            entry_time,
            exit_time: entry_time + Duration::minutes(15),
            stop_loss: None,
            take_profit: None,
            commissions: None,
            highest_price: None,
            lowest_price: None,
            strategy_tag: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn records_trade_and_stores_metrics() {
        let service = service();
        let mut es = trade("ES", dec!(4000), dec!(4001), 0);
        es.quantity = dec!(2);

        let evaluated = service.record_trade(es).await.unwrap();

        assert_eq!(evaluated.trade.id, 1);
        assert_eq!(evaluated.metrics.profit_loss, dec!(25));
        let stored = service.trade_metrics(1).await.unwrap();
        assert_eq!(stored, evaluated.metrics);
    }

    #[tokio::test]
    async fn rejects_invalid_trades() {
        let service = service();

        let mut zero_qty = trade("AAPL", dec!(100), dec!(110), 0);
        zero_qty.quantity = Decimal::ZERO;
        assert!(matches!(
            service.record_trade(zero_qty).await,
            Err(JournalError::InvalidTrade(_))
        ));

        let mut backwards = trade("AAPL", dec!(100), dec!(110), 0);
        backwards.exit_time = backwards.entry_time - Duration::minutes(1);
        assert!(service.record_trade(backwards).await.is_err());

        assert!(service.record_trade(trade("  ", dec!(1), dec!(2), 0)).await.is_err());
    }

    #[tokio::test]
    async fn statistics_follow_exit_order() {
        let service = service();
        service.record_trade(trade("AAPL", dec!(100), dec!(200), 0)).await.unwrap();
        service.record_trade(trade("AAPL", dec!(100), dec!(150), 30)).await.unwrap();
        service.record_trade(trade("AAPL", dec!(100), dec!(70), 60)).await.unwrap();

        let stats = service.statistics(7).await.unwrap();

        assert_eq!(stats.total_trades, 3);
        assert_eq!(stats.total_profit_loss, dec!(120));
        assert_eq!(stats.current_streak, -1);
        assert_eq!(stats.max_drawdown, dec!(20));
    }

    #[tokio::test]
    async fn statistics_for_unknown_user_report_no_trades() {
        let service = service();
        assert!(matches!(
            service.statistics(99).await,
            Err(JournalError::Analytics(AnalyticsError::NoTradesFound))
        ));
    }

    #[tokio::test]
    async fn update_recomputes_metrics() {
        let service = service();
        let recorded = service
            .record_trade(trade("AAPL", dec!(100), dec!(110), 0))
            .await
            .unwrap();

        let mut changed = recorded.trade.clone();
        changed.exit_price = dec!(90);
        service.update_trade(changed).await.unwrap();

        let metrics = service.trade_metrics(recorded.trade.id).await.unwrap();
        assert_eq!(metrics.profit_loss, dec!(-10));
    }

    #[tokio::test]
    async fn search_filters_and_sorts() {
        let service = service();
        service.record_trade(trade("AAPL", dec!(100), dec!(110), 0)).await.unwrap();
        service.record_trade(trade("MSFT", dec!(100), dec!(130), 30)).await.unwrap();
        service.record_trade(trade("AAPL", dec!(100), dec!(95), 60)).await.unwrap();

        let query = TradeQuery {
            ticker: Some("aapl".to_string()),
            sort_by: Some(SortField::ProfitLoss),
            order: SortOrder::Ascending,
            ..TradeQuery::default()
        };
        let found = service.search_trades(7, &query).await.unwrap();
        let pnl: Vec<Decimal> = found.iter().map(|t| t.profit_loss()).collect();

        assert_eq!(pnl, [dec!(-5), dec!(10)]);
    }

    #[tokio::test]
    async fn import_skips_bad_records() {
        let service = service();
        let json = r#"[
            {
                "ticker": "ES", "direction": "LONG",
                "entry_price": 4000, "exit_price": 4001, "quantity": 2,
                "trade_date": "2024-03-04",
                "entry_time": "2024-03-04T14:30:00Z",
                "exit_time": "2024-03-04T15:00:00Z"
            },
            {
                "ticker": "ES", "direction": "UP",
                "entry_price": 4000, "exit_price": 4001, "quantity": 2,
                "trade_date": "2024-03-04",
                "entry_time": "2024-03-04T14:30:00Z",
                "exit_time": "2024-03-04T15:00:00Z"
            },
            {
                "ticker": "ES", "direction": "SHORT",
                "entry_price": 4000, "exit_price": 4001, "quantity": 0,
                "trade_date": "2024-03-04",
                "entry_time": "2024-03-04T14:30:00Z",
                "exit_time": "2024-03-04T15:00:00Z"
            }
        ]"#;

        let outcome = service.import_json(3, json).await.unwrap();

        assert_eq!(outcome.recorded.len(), 1);
        assert_eq!(outcome.recorded[0].user_id, 3);
        let rejected: Vec<usize> = outcome.rejected.iter().map(|r| r.index).collect();
        assert_eq!(rejected, [1, 2]);
        assert_eq!(service.evaluated_trades(3).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_keeps_trade_with_its_user() {
        let service = service();
        let recorded = service
            .record_trade(trade("AAPL", dec!(100), dec!(110), 0))
            .await
            .unwrap();

        let mut moved = recorded.trade.clone();
        moved.user_id = 8;
        moved.exit_price = dec!(90);
        assert!(matches!(
            service.update_trade(moved).await,
            Err(JournalError::InvalidTrade(_))
        ));

        assert_eq!(service.evaluated_trades(7).await.unwrap().len(), 1);
        assert!(service.evaluated_trades(8).await.unwrap().is_empty());
        let metrics = service.trade_metrics(recorded.trade.id).await.unwrap();
        assert_eq!(metrics.profit_loss, dec!(10));
    }

    #[tokio::test]
    async fn overflowing_trade_is_not_stored() {
        let service = service();
        let mut huge = trade("AAPL", dec!(1), dec!(1e17), 0);
        huge.quantity = dec!(1e15);

        assert!(matches!(
            service.record_trade(huge).await,
            Err(JournalError::Analytics(AnalyticsError::Overflow(_)))
        ));
        assert!(service.evaluated_trades(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn import_rejects_overflowing_record() {
        let service = service();
        let json = r#"[
            {
                "ticker": "AAPL", "direction": "LONG",
                "entry_price": 1, "exit_price": 100000000000000000,
                "quantity": 1000000000000000,
                "trade_date": "2024-03-04",
                "entry_time": "2024-03-04T14:30:00Z",
                "exit_time": "2024-03-04T15:00:00Z"
            },
            {
                "ticker": "AAPL", "direction": "LONG",
                "entry_price": 100, "exit_price": 110, "quantity": 1,
                "trade_date": "2024-03-04",
                "entry_time": "2024-03-04T14:30:00Z",
                "exit_time": "2024-03-04T15:00:00Z"
            }
        ]"#;

        let outcome = service.import_json(7, json).await.unwrap();

        assert_eq!(outcome.recorded.len(), 1);
        assert_eq!(outcome.rejected[0].index, 0);
        assert_eq!(service.statistics(7).await.unwrap().total_profit_loss, dec!(10));
    }

    #[tokio::test]
    async fn clusters_user_trades() {
        let service = service();
        for (i, exit) in [dec!(110), dec!(111), dec!(60), dec!(61)].into_iter().enumerate() {
            let mut t = trade("AAPL", dec!(100), exit, i as i64 * 30);
            t.highest_price = Some(exit.max(dec!(100)) + dec!(1));
            t.lowest_price = Some(exit.min(dec!(100)) - dec!(1));
            service.record_trade(t).await.unwrap();
        }
        let params = ClusterParams {
            clusters: 2,
            features: vec![ClusterFeature::ProfitLoss],
            ..ClusterParams::default()
        };

        let clusters = service.clusters(7, &params).await.unwrap();

        assert_eq!(clusters.assignments.values().copied().collect::<Vec<_>>(), [0, 0, 1, 1]);
        assert_eq!(clusters.clusters[0].average_profit_loss, dec!(10.5));
        assert_eq!(clusters.clusters[1].average_profit_loss, dec!(-39.5));

        let too_many = ClusterParams {
            clusters: 5,
            ..params
        };
        assert!(matches!(
            service.clusters(7, &too_many).await,
            Err(JournalError::Analytics(AnalyticsError::NotEnoughTrades {
                available: 4,
                required: 5
            }))
        ));
    }

    #[tokio::test]
    async fn delete_removes_trade_from_history() {
        let service = service();
        let recorded = service
            .record_trade(trade("AAPL", dec!(100), dec!(110), 0))
            .await
            .unwrap();

        service.delete_trade(recorded.trade.id).await.unwrap();

        assert!(service.evaluated_trades(7).await.unwrap().is_empty());
        assert_eq!(service.recompute_metrics(7).await.unwrap(), 0);
    }
}
