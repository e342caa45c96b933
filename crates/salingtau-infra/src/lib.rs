//! Process-level infrastructure for the pipeline worker: tracing setup and
//! host capacity checks.

#[cfg(feature = "capacity")]
pub mod capacity;
pub mod telemetry;

#[cfg(feature = "capacity")]
pub use capacity::{CapacityChecker, CapacityError, DiskSpaceProbe, SysinfoDiskProbe};
pub use telemetry::init_telemetry;
