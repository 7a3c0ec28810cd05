//! Context-switch and migration delays.
//!
//! A cost occupies its core for a fixed number of ticks before the job that
//! requested it may run. A migration is modelled as a context switch
//! followed by a migration cost, linked through `next`.

use serde::{Deserialize, Serialize};

use crate::types::{CoreId, JobId, Time};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CostKind {
    ContextSwitch,
    Migration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cost {
    /// Core the job last executed on.
    pub origin_core: CoreId,
    /// Core that pays the cost and will run the job.
    pub requesting_core: CoreId,
    pub job: JobId,
    pub kind: CostKind,
    remaining: Time,
    next: Option<Box<Cost>>,
}

impl Cost {
    pub fn new(
        kind: CostKind,
        origin_core: CoreId,
        requesting_core: CoreId,
        job: JobId,
        duration: Time,
    ) -> Self {
        Cost {
            origin_core,
            requesting_core,
            job,
            kind,
            remaining: duration,
            next: None,
        }
    }

    /// Link `switch -> migrate`, skipping the links that are absent.
    pub fn chain(switch: Option<Cost>, migrate: Option<Cost>) -> Option<Cost> {
        match (switch, migrate) {
            (Some(mut switch), Some(migrate)) => {
                switch.set_next(migrate);
                Some(switch)
            }
            (switch, migrate) => switch.or(migrate),
        }
    }

    pub fn set_next(&mut self, next: Cost) {
        debug_assert!(self.next.is_none(), "cost chain holds at most two links");
        self.next = Some(Box::new(next));
    }

    pub fn next(&self) -> Option<&Cost> {
        self.next.as_deref()
    }

    pub fn take_next(&mut self) -> Option<Cost> {
        self.next.take().map(|c| *c)
    }

    /// Consume one slice of the cost.
    pub fn execution(&mut self, tick: Time) {
        self.remaining = self.remaining.saturating_sub(tick);
    }

    pub fn remaining(&self) -> Time {
        self.remaining
    }

    pub fn is_completed(&self) -> bool {
        self.remaining == 0
    }

    /// Number of costs in this chain, including `self`.
    pub fn chain_len(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |n| n.chain_len())
    }
}
