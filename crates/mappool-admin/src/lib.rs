//! Mappool Admin - operator reports and console commands for spawn pools.
//!
//! # Modules
//!
//! - [`report`]: serializable snapshots of a registry's pools (root listing
//!   and recursive hierarchy dumps) with human-readable `Display` output.
//! - [`console`]: parsing and execution of operator commands (`list`, `dump`,
//!   `respawn`, `despawn`, `reseed`, `activate`, `deactivate`) addressed by
//!   map id against any [`console::MapDirectory`].

#![deny(unsafe_code)]

pub mod console;
pub mod report;

use mappool_core::ids::MapId;
use mappool_core::PoolError;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by console commands.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("malformed arguments for {command}: {reason}")]
    MalformedArguments { command: &'static str, reason: String },

    #[error("map {0} is not loaded")]
    UnknownMap(MapId),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::console::{execute, execute_line, Command, ConsoleOutput, MapDirectory};
    pub use crate::report::{dump_pool, list_roots, OccupiedPoint, PoolDump, PoolSummary};
    pub use crate::ConsoleError;
}
