use core_types::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    #[error("Invalid trade direction '{0}': expected LONG or SHORT")]
    InvalidDirection(String),

    #[error("Invalid instrument spec for {0}: {1}")]
    InvalidInstrument(String, String),

    #[error("No closed trades found to compute statistics from")]
    NoTradesFound,

    #[error("Arithmetic overflow while computing {0}")]
    Overflow(&'static str),

    #[error("Not enough valid trades ({available}) for {required} clusters")]
    NotEnoughTrades { available: usize, required: usize },

    #[error("Clustering failed: {0}")]
    Clustering(String),
}

impl From<CoreError> for AnalyticsError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidDirection(direction) => AnalyticsError::InvalidDirection(direction),
            CoreError::InvalidInstrument(ticker, reason) => {
                AnalyticsError::InvalidInstrument(ticker, reason)
            }
        }
    }
}
