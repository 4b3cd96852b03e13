//! Core data types, windows, and rollup helpers for tank monitoring
//!
//! This crate provides the measurement model shared by the ingestion,
//! storage, aggregation and analysis crates, plus the store trait that
//! separates the engines from the persistence backend.

pub mod memory;
pub mod median;
pub mod pipeline;
pub mod rollups;
pub mod types;
pub mod units;
pub mod window;

pub use memory::*;
pub use median::*;
pub use pipeline::*;
pub use rollups::*;
pub use types::*;
pub use units::*;
pub use window::*;
