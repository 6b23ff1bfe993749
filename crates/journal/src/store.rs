use crate::error::JournalError;
use async_trait::async_trait;
use core_types::{ClosedTrade, TradeMetrics};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

/// Persistence boundary for trades and their computed metrics.
///
/// The journal service is handed an implementation at construction time;
/// nothing in the analytics path reaches for a global handle.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Persists a new trade and returns it with its assigned id. Any id on
    /// the incoming trade is ignored.
    async fn insert_trade(&self, trade: ClosedTrade) -> Result<ClosedTrade, JournalError>;

    /// Replaces an existing trade, keyed by its id.
    async fn update_trade(&self, trade: ClosedTrade) -> Result<(), JournalError>;

    async fn get_trade(&self, id: i64) -> Result<ClosedTrade, JournalError>;

    /// Removes a trade together with its metrics.
    async fn delete_trade(&self, id: i64) -> Result<(), JournalError>;

    /// All trades of one user, ordered by exit time (ties by id).
    async fn list_closed_trades(&self, user_id: i64) -> Result<Vec<ClosedTrade>, JournalError>;

    /// Inserts or replaces the metrics for `metrics.trade_id`.
    async fn upsert_metrics(&self, metrics: TradeMetrics) -> Result<(), JournalError>;

    async fn get_metrics(&self, trade_id: i64) -> Result<Option<TradeMetrics>, JournalError>;
}

#[derive(Debug, Default)]
struct StoreState {
    last_id: i64,
    trades: BTreeMap<i64, ClosedTrade>,
    metrics: HashMap<i64, TradeMetrics>,
}

/// A process-local `TradeStore`, used by the CLI and in tests.
#[derive(Debug, Default)]
pub struct InMemoryTradeStore {
    state: RwLock<StoreState>,
}

impl InMemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TradeStore for InMemoryTradeStore {
    async fn insert_trade(&self, mut trade: ClosedTrade) -> Result<ClosedTrade, JournalError> {
        let mut state = self.state.write().await;
        state.last_id += 1;
        trade.id = state.last_id;
        state.trades.insert(trade.id, trade.clone());
        Ok(trade)
    }

    async fn update_trade(&self, trade: ClosedTrade) -> Result<(), JournalError> {
        let mut state = self.state.write().await;
        match state.trades.get_mut(&trade.id) {
            Some(existing) => {
                *existing = trade;
                Ok(())
            }
            None => Err(JournalError::NotFound(trade.id)),
        }
    }

    async fn get_trade(&self, id: i64) -> Result<ClosedTrade, JournalError> {
        let state = self.state.read().await;
        state.trades.get(&id).cloned().ok_or(JournalError::NotFound(id))
    }

    async fn delete_trade(&self, id: i64) -> Result<(), JournalError> {
        let mut state = self.state.write().await;
        state.trades.remove(&id).ok_or(JournalError::NotFound(id))?;
        state.metrics.remove(&id);
        Ok(())
    }

    async fn list_closed_trades(&self, user_id: i64) -> Result<Vec<ClosedTrade>, JournalError> {
        let state = self.state.read().await;
        let mut trades: Vec<ClosedTrade> = state
            .trades
            .values()
            .filter(|trade| trade.user_id == user_id)
            .cloned()
            .collect();
        // BTreeMap iteration is already in id order, so a stable sort keeps
        // id as the tie-breaker.
        trades.sort_by_key(|trade| trade.exit_time);
        Ok(trades)
    }

    async fn upsert_metrics(&self, metrics: TradeMetrics) -> Result<(), JournalError> {
        let mut state = self.state.write().await;
        if !state.trades.contains_key(&metrics.trade_id) {
            return Err(JournalError::NotFound(metrics.trade_id));
        }
        state.metrics.insert(metrics.trade_id, metrics);
        Ok(())
    }

    async fn get_metrics(&self, trade_id: i64) -> Result<Option<TradeMetrics>, JournalError> {
        let state = self.state.read().await;
        Ok(state.metrics.get(&trade_id).cloned())
    }
}
