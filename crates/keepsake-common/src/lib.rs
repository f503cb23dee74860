//! keepsake-common — Shared error type and on-disk record types used across all keepsake-ui crates.

pub mod error;
pub mod records;

// Re-export commonly used types
pub use error::{KeepsakeError, Result};
pub use records::{CheckpointRecord, ExperimentRecord, Goal, Heartbeat, PrimaryMetric};
