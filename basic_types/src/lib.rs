use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::ops::{Add, Deref, DerefMut, Sub};
use std::str::FromStr;

#[macro_use]
mod macros;

pub mod role;

pub use role::NodeRole;

basic_type!(
    /// Position of a record in one partition of the upstream event log.
    /// Monotonically increasing, not necessarily contiguous.
    Offset,
    i64
);

basic_type!(
    /// Partition number within the upstream topic.
    Partition,
    u32
);

#[allow(clippy::derivable_impls)]
impl Default for Offset {
    fn default() -> Self {
        Self(0)
    }
}
