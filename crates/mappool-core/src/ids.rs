//! Strongly typed identifiers and game time.
//!
//! Every id is a thin `u32` newtype so that a pool id can never be passed where
//! a spawn point id is expected. All ids serialize transparently as plain
//! numbers, which keeps the JSON import format readable.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(raw: u32) -> Self {
                Self(raw)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a pool, unique within one map.
    PoolId,
    "pool#"
);
numeric_id!(
    /// Identifier of a spawn point, unique within one map.
    PointId,
    "point#"
);
numeric_id!(
    /// Identifier of a map (the sharding unit).
    MapId,
    "map#"
);
numeric_id!(
    /// Identifier of a loadable grid cell of a map.
    GridId,
    "grid#"
);
numeric_id!(
    /// Identifier of a cell/area/zone scope used for interest-driven respawns.
    ZoneId,
    "zone#"
);

// ---------------------------------------------------------------------------
// Timestamp
// ---------------------------------------------------------------------------

/// Absolute game time in whole seconds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The timestamp `secs` seconds after `self`.
    #[inline]
    pub fn plus_secs(self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds elapsed since `earlier`, zero if `earlier` is in the future.
    #[inline]
    pub fn secs_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={}s", self.0)
    }
}
