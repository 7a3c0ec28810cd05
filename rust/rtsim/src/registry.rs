//! Name-keyed construction of strategies.
//!
//! Scheduler names take an optional prefix selecting the dispatch
//! granularity: `global-edf`, `single-rms`, `hybrid-dm`. A bare name means
//! partitioned scheduling.

use crate::controller::ConcurrencyControlProtocol;
use crate::dvfs::DvfsMethod;
use crate::error::{Result, SimError};
use crate::partition::PartitionAlgorithm;
use crate::scheduler::{SchedulingAlgorithm, SchedulingType};
use crate::strategies::{
    EarliestDeadlineFirst, FitPartitioner, FitRule, FixedOrder, FixedPriority, LockingMode,
    LockingProtocol, MaxSpeed, StaticSpeed,
};

pub const SCHEDULERS: &[&str] = &["rms", "dm", "edf"];
pub const SCHEDULER_PREFIXES: &[&str] = &["global-", "single-", "hybrid-"];
pub const PROTOCOLS: &[&str] = &["none", "mutex", "pip"];
pub const DVFS_METHODS: &[&str] = &["none", "static"];
pub const PARTITIONERS: &[&str] = &["first-fit", "worst-fit"];

fn unknown(kind: &'static str, name: &str) -> SimError {
    SimError::UnknownStrategy {
        kind,
        name: name.to_string(),
    }
}

fn split_scheduling(name: &str) -> (SchedulingType, &str) {
    let prefixes = [
        ("global-", SchedulingType::Global),
        ("single-", SchedulingType::SingleCore),
        ("hybrid-", SchedulingType::Hybrid),
    ];
    for (prefix, ty) in prefixes {
        if let Some(base) = name.strip_prefix(prefix) {
            return (ty, base);
        }
    }
    (SchedulingType::Partition, name)
}

pub fn scheduler(name: &str) -> Result<Box<dyn SchedulingAlgorithm>> {
    let (scheduling, base) = split_scheduling(name);
    let algorithm: Box<dyn SchedulingAlgorithm> = match base {
        "rms" => Box::new(FixedPriority::new(name, FixedOrder::RateMonotonic, scheduling)),
        "dm" => Box::new(FixedPriority::new(
            name,
            FixedOrder::DeadlineMonotonic,
            scheduling,
        )),
        "edf" => Box::new(EarliestDeadlineFirst::new(name, scheduling)),
        _ => return Err(unknown("scheduler", name)),
    };
    Ok(algorithm)
}

pub fn protocol(name: &str) -> Result<Box<dyn ConcurrencyControlProtocol>> {
    let mode = match name {
        "none" => LockingMode::Unchecked,
        "mutex" => LockingMode::Mutex,
        "pip" => LockingMode::Inheritance,
        _ => return Err(unknown("protocol", name)),
    };
    Ok(Box::new(LockingProtocol::new(name, mode)))
}

pub fn dvfs(name: &str) -> Result<Box<dyn DvfsMethod>> {
    match name {
        "none" => Ok(Box::new(MaxSpeed)),
        "static" => Ok(Box::new(StaticSpeed)),
        _ => Err(unknown("dvfs method", name)),
    }
}

pub fn partitioner(name: &str) -> Result<Box<dyn PartitionAlgorithm>> {
    let rule = match name {
        "first-fit" => FitRule::FirstFit,
        "worst-fit" => FitRule::WorstFit,
        _ => return Err(unknown("partitioner", name)),
    };
    Ok(Box::new(FitPartitioner::new(name, rule)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PriorityType;

    #[test]
    fn scheduler_prefixes_select_granularity() {
        let s = scheduler("global-edf").unwrap();
        assert_eq!(s.scheduling_type(), SchedulingType::Global);
        assert_eq!(s.priority_type(), PriorityType::Dynamic);
        assert_eq!(s.name(), "global-edf");

        assert_eq!(
            scheduler("rms").unwrap().scheduling_type(),
            SchedulingType::Partition
        );
        assert_eq!(
            scheduler("single-dm").unwrap().scheduling_type(),
            SchedulingType::SingleCore
        );
        assert_eq!(
            scheduler("hybrid-rms").unwrap().scheduling_type(),
            SchedulingType::Hybrid
        );
    }

    #[test]
    fn every_listed_name_resolves() {
        for name in SCHEDULERS {
            assert!(scheduler(name).is_ok(), "{name}");
            for prefix in SCHEDULER_PREFIXES {
                assert!(scheduler(&format!("{prefix}{name}")).is_ok());
            }
        }
        for name in PROTOCOLS {
            assert_eq!(protocol(name).unwrap().name(), *name);
        }
        for name in DVFS_METHODS {
            assert_eq!(dvfs(name).unwrap().name(), *name);
        }
        for name in PARTITIONERS {
            assert_eq!(partitioner(name).unwrap().name(), *name);
        }
    }

    #[test]
    fn unknown_names_are_errors() {
        let err = scheduler("global-lottery").err().unwrap();
        assert_eq!(
            err,
            SimError::UnknownStrategy {
                kind: "scheduler",
                name: "global-lottery".into()
            }
        );
        assert!(protocol("srp").is_err());
        assert!(dvfs("ondemand").is_err());
        assert!(partitioner("best-fit").is_err());
    }
}
