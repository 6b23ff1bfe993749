//! # Trade Journal
//!
//! The collaborator layer around the analytics engine: a storage interface
//! for trades and their metrics, a typed query model for trade lists, and the
//! `JournalService` that ties them to `analytics`.
//!
//! ## Public API
//!
//! - `TradeStore`: the async persistence boundary, with `InMemoryTradeStore`.
//! - `TradeQuery`, `SortField`, `SortOrder`: filters and an allow-listed sort.
//! - `JournalService`: record, update and delete trades; statistics, equity
//!   curve, breakdowns and searches on demand.
//! - `parse_trades`: per-record decoding of a JSON import batch.
//! - `JournalError`: the specific error types that can be returned from this crate.

pub mod error;
pub mod import;
pub mod query;
pub mod service;
pub mod store;

pub use error::JournalError;
pub use import::{ImportOutcome, ImportRejection, parse_trade, parse_trades};
pub use query::{SortField, SortOrder, TradeQuery};
pub use service::JournalService;
pub use store::{InMemoryTradeStore, TradeStore};
