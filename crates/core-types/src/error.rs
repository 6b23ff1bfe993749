use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid trade direction '{0}': expected LONG or SHORT")]
    InvalidDirection(String),

    #[error("Invalid instrument spec for {0}: {1}")]
    InvalidInstrument(String, String),
}
