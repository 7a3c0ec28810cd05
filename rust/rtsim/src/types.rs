//! Newtype wrappers and type aliases for domain concepts.
//!
//! Newtypes for identifiers (cores, core sets, tasks, jobs, resources)
//! prevent silent type confusion between the many integer indices the
//! engine passes around. Identifiers double as arena indices: the object
//! with id `n` lives at position `n` of its owning collection.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Simulated time in ticks.
pub type Time = u64;

macro_rules! index_id {
    ($(#[$meta:meta])* $name:ident($inner:ty)) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl $name {
            /// Position of the object in its owning collection.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

index_id!(
    /// Core identifier.
    CoreId(u32)
);
index_id!(
    /// Core-set (DVFS domain) identifier.
    CoreSetId(u32)
);
index_id!(
    /// Task identifier.
    TaskId(u32)
);
index_id!(
    /// Job identifier. Jobs are numbered in release order.
    JobId(u32)
);
index_id!(
    /// Shared resource identifier.
    ResourceId(u32)
);

/// Scheduling priority.
///
/// The raw value follows the usual real-time convention: a smaller number is
/// more urgent (a rank, a period, an absolute deadline). `Ord` is defined on
/// urgency, so `a > b` means `a` is the higher priority and the maximum of a
/// set is the job to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i64);

impl Priority {
    /// Sentinel given to suspended jobs.
    pub const LOWEST: Priority = Priority(i64::MAX);

    /// Whether `self` is strictly more urgent than `other`.
    pub fn is_higher(self, other: Priority) -> bool {
        self.0 < other.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::LOWEST
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        other.0.cmp(&self.0)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Priority::LOWEST {
            f.write_str("lowest")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
