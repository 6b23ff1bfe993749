pub mod enums;
pub mod error;
pub mod instrument;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::Direction;
pub use error::CoreError;
pub use instrument::{InstrumentSpec, InstrumentTable};
pub use structs::{ClosedTrade, EvaluatedTrade, TradeMetrics};
