use crate::checked::{add, div};
use crate::engine::{AnalyticsEngine, by_exit_time};
use crate::error::AnalyticsError;
use crate::report::{ClusterSummary, TradeClusters};
use core_types::EvaluatedTrade;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use smartcore::cluster::kmeans::{KMeans, KMeansParameters};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::BTreeMap;

/// A per-trade value the clustering can be run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterFeature {
    DurationSeconds,
    ProfitLoss,
    Mfe,
    Mae,
}

impl ClusterFeature {
    pub const ALL: [ClusterFeature; 4] = [
        ClusterFeature::DurationSeconds,
        ClusterFeature::ProfitLoss,
        ClusterFeature::Mfe,
        ClusterFeature::Mae,
    ];

    fn value(&self, evaluated: &EvaluatedTrade) -> f64 {
        let value = match self {
            ClusterFeature::DurationSeconds => Decimal::from(duration_seconds(evaluated)),
            ClusterFeature::ProfitLoss => evaluated.metrics.profit_loss,
            ClusterFeature::Mfe => evaluated.metrics.mfe,
            ClusterFeature::Mae => evaluated.metrics.mae,
        };
        value.to_f64().unwrap_or_default()
    }
}

/// Settings for `AnalyticsEngine::cluster`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterParams {
    /// Number of clusters (k).
    pub clusters: usize,
    pub features: Vec<ClusterFeature>,
    pub max_iter: usize,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            clusters: 3,
            features: ClusterFeature::ALL.to_vec(),
            max_iter: 100,
        }
    }
}

impl AnalyticsEngine {
    /// Groups similar trades with k-means over standardized features.
    ///
    /// Only trades with both extreme prices recorded, and with
    /// `highest_price >= entry_price >= lowest_price`, take part. Cluster ids
    /// are numbered by the exit-time order in which each cluster first
    /// appears, so the same trades always produce the same ids.
    ///
    /// # Errors
    ///
    /// * `AnalyticsError::Clustering` for zero clusters, no features, or a
    ///   failure inside k-means.
    /// * `AnalyticsError::NotEnoughTrades` when fewer trades qualify than
    ///   clusters were requested.
    pub fn cluster(
        &self,
        trades: &[EvaluatedTrade],
        params: &ClusterParams,
    ) -> Result<TradeClusters, AnalyticsError> {
        if params.clusters == 0 {
            return Err(AnalyticsError::Clustering(
                "at least one cluster is required".to_string(),
            ));
        }
        if params.features.is_empty() {
            return Err(AnalyticsError::Clustering(
                "at least one feature is required".to_string(),
            ));
        }

        let eligible: Vec<&EvaluatedTrade> = by_exit_time(trades)
            .into_iter()
            .filter(|evaluated| has_valid_extremes(evaluated))
            .collect();
        if eligible.len() < params.clusters {
            return Err(AnalyticsError::NotEnoughTrades {
                available: eligible.len(),
                required: params.clusters,
            });
        }

        let rows = standardize(
            eligible
                .iter()
                .map(|evaluated| params.features.iter().map(|f| f.value(evaluated)).collect())
                .collect(),
        );
        let labels = fit_predict(&rows, params)?;

        // Renumber by first appearance.
        let mut renumbered: BTreeMap<u32, usize> = BTreeMap::new();
        let mut assignments = BTreeMap::new();
        let mut totals: Vec<ClusterTotals> = Vec::new();

        for (evaluated, label) in eligible.iter().zip(labels) {
            let next_id = renumbered.len();
            let cluster_id = *renumbered.entry(label).or_insert(next_id);
            if cluster_id == totals.len() {
                totals.push(ClusterTotals::default());
            }
            totals[cluster_id].add(evaluated)?;
            assignments.insert(evaluated.trade.id, cluster_id);
        }

        let clusters = totals
            .into_iter()
            .enumerate()
            .map(|(cluster_id, totals)| totals.into_summary(cluster_id))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            trades = assignments.len(),
            clusters = clusters.len(),
            "Trades clustered."
        );

        Ok(TradeClusters {
            assignments,
            clusters,
        })
    }
}

#[derive(Debug, Default)]
struct ClusterTotals {
    trade_count: usize,
    profit_loss: Decimal,
    duration_seconds: Decimal,
    mfe: Decimal,
    mae: Decimal,
}

impl ClusterTotals {
    fn add(&mut self, evaluated: &EvaluatedTrade) -> Result<(), AnalyticsError> {
        let metrics = &evaluated.metrics;
        self.trade_count += 1;
        self.profit_loss = add(self.profit_loss, metrics.profit_loss, "cluster profit/loss")?;
        self.duration_seconds = add(
            self.duration_seconds,
            Decimal::from(duration_seconds(evaluated)),
            "cluster duration",
        )?;
        self.mfe = add(self.mfe, metrics.mfe, "cluster excursion")?;
        self.mae = add(self.mae, metrics.mae, "cluster excursion")?;
        Ok(())
    }

    fn into_summary(self, cluster_id: usize) -> Result<ClusterSummary, AnalyticsError> {
        let count = Decimal::from(self.trade_count);
        let average = |sum: Decimal| div(sum, count, "cluster average").map(|v| v.round_dp(2));

        Ok(ClusterSummary {
            cluster_id,
            trade_count: self.trade_count,
            average_profit_loss: average(self.profit_loss)?,
            average_duration_seconds: average(self.duration_seconds)?,
            average_mfe: average(self.mfe)?,
            average_mae: average(self.mae)?,
        })
    }
}

fn duration_seconds(evaluated: &EvaluatedTrade) -> i64 {
    (evaluated.trade.exit_time - evaluated.trade.entry_time).num_seconds()
}

fn has_valid_extremes(evaluated: &EvaluatedTrade) -> bool {
    let trade = &evaluated.trade;
    match (trade.highest_price, trade.lowest_price) {
        (Some(highest), Some(lowest)) => {
            highest >= trade.entry_price && trade.entry_price >= lowest
        }
        _ => false,
    }
}

/// Scales every column to zero mean and unit (population) variance. A
/// constant column is only centered.
fn standardize(mut rows: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    let Some(width) = rows.first().map(Vec::len) else {
        return rows;
    };
    let n = rows.len() as f64;

    for column in 0..width {
        let mean = rows.iter().map(|row| row[column]).sum::<f64>() / n;
        let variance = rows
            .iter()
            .map(|row| (row[column] - mean).powi(2))
            .sum::<f64>()
            / n;
        let std = variance.sqrt();

        for row in rows.iter_mut() {
            row[column] -= mean;
            if std > 0.0 {
                row[column] /= std;
            }
        }
    }
    rows
}

fn fit_predict(
    rows: &Vec<Vec<f64>>,
    params: &ClusterParams,
) -> Result<Vec<u32>, AnalyticsError> {
    let matrix = DenseMatrix::from_2d_vec(rows)
        .map_err(|e| AnalyticsError::Clustering(format!("failed to build matrix: {}", e)))?;

    let parameters = KMeansParameters::default()
        .with_k(params.clusters)
        .with_max_iter(params.max_iter);
    let model: KMeans<f64, u32, DenseMatrix<f64>, Vec<u32>> =
        KMeans::fit(&matrix, parameters).map_err(|e| AnalyticsError::Clustering(e.to_string()))?;

    model
        .predict(&matrix)
        .map_err(|e| AnalyticsError::Clustering(e.to_string()))
}
