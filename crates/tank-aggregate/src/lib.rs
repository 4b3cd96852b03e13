//! Windowed aggregation of stored measurements
//!
//! Aggregates are always recomputed from the stored range, never kept as
//! running state, so late and duplicate arrivals cannot corrupt them.

pub mod buckets;
pub mod engine;

pub use buckets::*;
pub use engine::*;

use tank_core::{StoreError, TankId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AggregateError {
    /// The tank has no stored readings at all
    #[error("No data for tank {tank}")]
    NoData { tank: TankId },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type AggregateResult<T> = Result<T, AggregateError>;
