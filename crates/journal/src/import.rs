use crate::error::JournalError;
use analytics::AnalyticsError;
use core_types::{ClosedTrade, Direction};
use serde_json::Value;

/// A record from an import batch that could not be recorded.
#[derive(Debug)]
pub struct ImportRejection {
    /// Position of the record in the input array.
    pub index: usize,
    pub error: JournalError,
}

/// The result of importing a batch of trades.
#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub recorded: Vec<ClosedTrade>,
    pub rejected: Vec<ImportRejection>,
}

/// Parses a JSON array of trade records.
///
/// Only a document that is not an array fails as a whole. Each element is
/// decoded on its own, so one bad record leaves its siblings untouched.
pub fn parse_trades(json: &str) -> Result<Vec<Result<ClosedTrade, JournalError>>, JournalError> {
    let document: Value = serde_json::from_str(json)?;
    match document {
        Value::Array(records) => Ok(records.into_iter().map(parse_trade).collect()),
        _ => Err(JournalError::InvalidTrade(
            "expected a JSON array of trades".to_string(),
        )),
    }
}

/// Decodes one trade record.
///
/// The direction is checked before the full decode so an unknown side is
/// reported as `AnalyticsError::InvalidDirection` rather than a generic
/// decoding failure.
pub fn parse_trade(record: Value) -> Result<ClosedTrade, JournalError> {
    if let Some(Value::String(direction)) = record.get("direction") {
        direction
            .parse::<Direction>()
            .map_err(AnalyticsError::from)?;
    }
    Ok(serde_json::from_value(record)?)
}
