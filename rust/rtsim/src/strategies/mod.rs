//! Reference strategies reachable through [`crate::registry`].

pub mod edf;
pub mod fit;
pub mod fixed;
pub mod locking;
pub mod speed;

pub use edf::EarliestDeadlineFirst;
pub use fit::{FitPartitioner, FitRule};
pub use fixed::{FixedOrder, FixedPriority};
pub use locking::{LockingMode, LockingProtocol};
pub use speed::{MaxSpeed, StaticSpeed};
