//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, SnapshotSource)
//! but are themselves concrete structs, not traits.

mod refresh;
mod scheduler;

pub use refresh::{RefreshOutcome, RefreshReport, RefreshService, TreeEvent};
pub use scheduler::{RefreshScheduler, SchedulerHandle};
