use analytics::AnalyticsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("Trade {0} was not found")]
    NotFound(i64),

    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Unsupported sort field '{0}'")]
    UnsupportedSortField(String),

    #[error("Analytics error: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Malformed trade record: {0}")]
    Malformed(#[from] serde_json::Error),
}
