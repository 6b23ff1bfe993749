use analytics::{
    AggregateStats, AnalyticsEngine, ClusterFeature, ClusterParams, EquityPoint, GroupBy,
    GroupPerformance, MetricsCalculator, TradeClusters,
};
use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use configuration::{Config, init_tracing, load_config, load_config_from};
use core_types::EvaluatedTrade;
use journal::{InMemoryTradeStore, JournalService, SortField, SortOrder, TradeQuery};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The main entry point for the trade journal.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // JOURNAL__* overrides and RUST_LOG may come from a .env file.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    // Dropping the guard flushes the file log, so it lives until exit.
    let _log_guard = init_tracing(&config.logging)?;

    let service = build_service(&config)?;

    match cli.command {
        Commands::Metrics(input) => {
            import(&service, cli.user, &input.trades).await?;
            let trades = service.evaluated_trades(cli.user).await?;
            render(trades.as_slice(), input.json, metrics_table)?;
        }
        Commands::Stats(input) => {
            import(&service, cli.user, &input.trades).await?;
            let stats = service.statistics(cli.user).await?;
            render(&stats, input.json, stats_table)?;
        }
        Commands::Breakdown(args) => {
            import(&service, cli.user, &args.input.trades).await?;
            let groups = service.breakdown(cli.user, args.by.into()).await?;
            render(groups.as_slice(), args.input.json, |groups| breakdown_table(groups, args.by))?;
        }
        Commands::Equity(input) => {
            import(&service, cli.user, &input.trades).await?;
            let curve = service.equity_curve(cli.user).await?;
            render(curve.as_slice(), input.json, equity_table)?;
        }
        Commands::List(args) => {
            import(&service, cli.user, &args.input.trades).await?;
            let query = args.query()?;
            let trades = service.search_trades(cli.user, &query).await?;
            render(trades.as_slice(), args.input.json, metrics_table)?;
        }
        Commands::Cluster(args) => {
            import(&service, cli.user, &args.input.trades).await?;
            let clusters = service.clusters(cli.user, &args.params()).await?;
            render(&clusters, args.input.json, cluster_table)?;
        }
    }

    Ok(())
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Performance analytics for a journal of closed trades.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults to ./config.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// The user the imported trades are recorded for.
    #[arg(long, global = true, default_value_t = 1)]
    user: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the metrics computed for every trade.
    Metrics(TradesInput),
    /// Print the aggregate statistics over all trades.
    Stats(TradesInput),
    /// Print performance grouped by hour, weekday, strategy or ticker.
    Breakdown(BreakdownArgs),
    /// Print the cumulative balance after each trade.
    Equity(TradesInput),
    /// Print a filtered, sorted and paged list of trades.
    List(ListArgs),
    /// Group similar trades with k-means and print each cluster's averages.
    Cluster(ClusterArgs),
}

#[derive(Args)]
struct TradesInput {
    /// A JSON file holding an array of closed trades.
    #[arg(long)]
    trades: PathBuf,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct BreakdownArgs {
    #[command(flatten)]
    input: TradesInput,

    /// The dimension to group trades by.
    #[arg(long, value_enum)]
    by: Grouping,
}

#[derive(Clone, Copy, ValueEnum)]
enum Grouping {
    Hour,
    Weekday,
    Strategy,
    Ticker,
}

impl From<Grouping> for GroupBy {
    fn from(grouping: Grouping) -> Self {
        match grouping {
            Grouping::Hour => GroupBy::HourOfDay,
            Grouping::Weekday => GroupBy::DayOfWeek,
            Grouping::Strategy => GroupBy::StrategyTag,
            Grouping::Ticker => GroupBy::Ticker,
        }
    }
}

#[derive(Args)]
struct ListArgs {
    #[command(flatten)]
    input: TradesInput,

    /// Only trades on this ticker.
    #[arg(long)]
    ticker: Option<String>,

    /// Earliest trade date, inclusive (format: YYYY-MM-DD).
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Latest trade date, inclusive (format: YYYY-MM-DD).
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Minimum net profit/loss, inclusive.
    #[arg(long, allow_negative_numbers = true)]
    min_profit: Option<Decimal>,

    /// Maximum net profit/loss, inclusive.
    #[arg(long, allow_negative_numbers = true)]
    max_profit: Option<Decimal>,

    /// Field to sort by (e.g. "exit_time", "profit_loss", "r_multiple").
    #[arg(long)]
    sort_by: Option<String>,

    /// Sort in descending order.
    #[arg(long)]
    desc: bool,

    #[arg(long)]
    limit: Option<usize>,

    #[arg(long, default_value_t = 0)]
    offset: usize,
}

impl ListArgs {
    fn query(&self) -> anyhow::Result<TradeQuery> {
        let sort_by = self
            .sort_by
            .as_deref()
            .map(str::parse::<SortField>)
            .transpose()?;

        Ok(TradeQuery {
            start_date: self.from,
            end_date: self.to,
            ticker: self.ticker.clone(),
            min_profit: self.min_profit,
            max_profit: self.max_profit,
            sort_by,
            order: if self.desc {
                SortOrder::Descending
            } else {
                SortOrder::Ascending
            },
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Args)]
struct ClusterArgs {
    #[command(flatten)]
    input: TradesInput,

    /// Number of clusters.
    #[arg(long, default_value_t = 3)]
    clusters: usize,

    /// Features to cluster on (defaults to all of them).
    #[arg(long, value_enum, value_delimiter = ',')]
    features: Vec<Feature>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Feature {
    Duration,
    Pnl,
    Mfe,
    Mae,
}

impl From<Feature> for ClusterFeature {
    fn from(feature: Feature) -> Self {
        match feature {
            Feature::Duration => ClusterFeature::DurationSeconds,
            Feature::Pnl => ClusterFeature::ProfitLoss,
            Feature::Mfe => ClusterFeature::Mfe,
            Feature::Mae => ClusterFeature::Mae,
        }
    }
}

impl ClusterArgs {
    fn params(&self) -> ClusterParams {
        let mut params = ClusterParams {
            clusters: self.clusters,
            ..ClusterParams::default()
        };
        if !self.features.is_empty() {
            params.features = self.features.iter().copied().map(Into::into).collect();
        }
        params
    }
}

// ==============================================================================
// Wiring
// ==============================================================================

fn build_service(config: &Config) -> anyhow::Result<JournalService> {
    let instruments = config.instrument_table()?;
    tracing::debug!(instruments = instruments.len(), "Instrument table loaded.");

    Ok(JournalService::new(
        Arc::new(InMemoryTradeStore::new()),
        MetricsCalculator::new(instruments),
        AnalyticsEngine::new().with_starting_balance(config.analytics.starting_balance),
    ))
}

async fn import(service: &JournalService, user_id: i64, path: &Path) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read trades from {}", path.display()))?;
    let outcome = service.import_json(user_id, &json).await?;

    if !outcome.rejected.is_empty() {
        eprintln!(
            "Imported {} trades, skipped {} invalid records.",
            outcome.recorded.len(),
            outcome.rejected.len()
        );
    }
    Ok(())
}

// ==============================================================================
// Output
// ==============================================================================

fn render<T: Serialize + ?Sized>(
    value: &T,
    json: bool,
    table: impl FnOnce(&T) -> Table,
) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", table(value));
    }
    Ok(())
}

fn new_table<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn money(value: Decimal) -> String {
    value.round_dp(2).to_string()
}

fn metrics_table(trades: &[EvaluatedTrade]) -> Table {
    let mut table = new_table([
        "ID", "Ticker", "Side", "Exit", "P/L", "P/L %", "R:R", "R", "Minutes", "MFE", "MAE",
    ]);
    for evaluated in trades {
        let (trade, metrics) = (&evaluated.trade, &evaluated.metrics);
        table.add_row(vec![
            Cell::new(trade.id),
            Cell::new(&trade.ticker),
            Cell::new(trade.direction),
            Cell::new(trade.exit_time.format("%Y-%m-%d %H:%M")),
            Cell::new(money(metrics.profit_loss)),
            Cell::new(money(metrics.profit_loss_percent)),
            Cell::new(money(metrics.risk_reward_ratio)),
            Cell::new(money(metrics.r_multiple)),
            Cell::new(metrics.holding_period_minutes),
            Cell::new(money(metrics.mfe)),
            Cell::new(money(metrics.mae)),
        ]);
    }
    table
}

fn stats_table(stats: &AggregateStats) -> Table {
    let mut table = new_table(["Statistic", "Value"]);
    let rows = [
        ("Total Trades", stats.total_trades.to_string()),
        ("Winning Trades", stats.winning_trades.to_string()),
        ("Losing Trades", stats.losing_trades.to_string()),
        ("Break-even Trades", stats.break_even_trades.to_string()),
        ("Win Rate", format!("{}%", money(stats.win_rate * Decimal::ONE_HUNDRED))),
        ("Total P/L", money(stats.total_profit_loss)),
        ("Gross Profit", money(stats.gross_profit)),
        ("Gross Loss", money(stats.gross_loss)),
        ("Average P/L", money(stats.average_profit_loss)),
        ("Average Winner", money(stats.average_winner)),
        ("Average Loser", money(stats.average_loser)),
        ("Largest Winner", money(stats.largest_winner)),
        ("Largest Loser", money(stats.largest_loser)),
        ("Profit Factor", money(stats.profit_factor)),
        ("Expectancy", money(stats.expectancy)),
        ("Avg Holding (min)", money(stats.average_holding_period_minutes)),
        ("Current Streak", stats.current_streak.to_string()),
        ("Max Drawdown", format!("{}%", money(stats.max_drawdown))),
    ];
    for (name, value) in rows {
        table.add_row(vec![name.to_string(), value]);
    }
    table
}

fn breakdown_table(groups: &[GroupPerformance], by: Grouping) -> Table {
    let dimension = match by {
        Grouping::Hour => "Hour (UTC)",
        Grouping::Weekday => "Weekday",
        Grouping::Strategy => "Strategy",
        Grouping::Ticker => "Ticker",
    };
    let mut table = new_table([dimension, "Trades", "Total P/L", "Win Rate", "Profit Factor"]);
    for group in groups {
        table.add_row(vec![
            group.label.clone(),
            group.trade_count.to_string(),
            money(group.total_profit_loss),
            format!("{}%", money(group.win_rate * Decimal::ONE_HUNDRED)),
            money(group.profit_factor),
        ]);
    }
    table
}

fn equity_table(curve: &[EquityPoint]) -> Table {
    let mut table = new_table(["Trade", "Exit", "Balance", "Peak", "Drawdown %"]);
    for point in curve {
        table.add_row(vec![
            point.trade_id.to_string(),
            point.exit_time.format("%Y-%m-%d %H:%M").to_string(),
            money(point.balance),
            money(point.peak),
            money(point.drawdown_pct),
        ]);
    }
    table
}

fn cluster_table(result: &TradeClusters) -> Table {
    let mut table = new_table([
        "Cluster", "Trades", "Avg P/L", "Avg Duration (s)", "Avg MFE", "Avg MAE",
    ]);
    for cluster in &result.clusters {
        table.add_row(vec![
            cluster.cluster_id.to_string(),
            cluster.trade_count.to_string(),
            money(cluster.average_profit_loss),
            money(cluster.average_duration_seconds),
            money(cluster.average_mfe),
            money(cluster.average_mae),
        ]);
    }
    table
}
