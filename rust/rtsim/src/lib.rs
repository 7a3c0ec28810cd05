//! rtsim - Tick-driven simulator for preemptive real-time multiprocessor
//! scheduling.
//!
//! Periodic tasks release jobs onto a processor of speed-scalable cores.
//! Each tick, pluggable strategies decide which job runs where, whether a
//! job may enter a critical section, and what speed each core set runs at.
//! The run produces a per-core timeline of EXEC/IDLE/WAIT/SWITCH/MIGRATE
//! records with energy, plus the list of deadline misses.
//!
//! # Architecture
//!
//! - **Processor**: owns the cores, the global queue and the job table and
//!   drives the per-tick phases
//! - **Cores**: local ready queue, context-switch and migration costs,
//!   timeline recording
//! - **Strategies**: scheduling algorithms, concurrency-control protocols,
//!   DVFS methods and partitioners, selected by name via [`registry`]
//!
//! # Usage
//!
//! ```rust,no_run
//! use rtsim::*;
//!
//! let scenario = Scenario::builder()
//!     .cores(1)
//!     .task(TaskDef::periodic("t0", 10, 4))
//!     .horizon(20)
//!     .build()?;
//!
//! let result = Simulator::new(Strategies::with_scheduler("rms")?).run(&scenario)?;
//! result.dump();
//! # Ok::<(), SimError>(())
//! ```

pub mod controller;
pub mod coreset;
pub mod cost;
pub mod cpu;
pub mod dvfs;
pub mod engine;
pub mod error;
pub mod fmt;
pub mod job;
pub mod partition;
pub mod processor;
pub mod queue;
pub mod registry;
pub mod scenario;
pub mod scheduler;
pub mod state;
pub mod stats;
pub mod strategies;
pub mod task;
pub mod trace;
pub mod types;

// Re-export the main public types for convenience.
pub use controller::{ConcurrencyControlProtocol, ConcurrencyController, ControllerStats};
pub use coreset::{CoreSet, CoreSetDef, PowerModel, SpeedLevel};
pub use cost::{Cost, CostKind};
pub use cpu::Core;
pub use dvfs::{DvfsMethod, DvfsType, DynamicVoltageRegulator};
pub use engine::{run_batch, SimulationResult, Simulator, Strategies};
pub use error::{Result, SimError};
pub use fmt::{init_tracing, sim_clock, FmtTick, SimFormat};
pub use job::{Job, JobStatus, JobTable};
pub use partition::PartitionAlgorithm;
pub use processor::Processor;
pub use queue::JobQueue;
pub use scenario::{EngineConfig, Scenario, ScenarioBuilder};
pub use scheduler::{PriorityType, Scheduler, SchedulingAlgorithm, SchedulingType};
pub use state::SimState;
pub use stats::{CoreStats, DistributionStats, Summary, TaskStats};
pub use task::{CriticalSection, ResourceDef, SharedResourceSet, Task, TaskDef, TaskSet};
pub use trace::{CoreStatus, MissDeadlineInfo, SchedulingInfo, Timeline};
pub use types::{CoreId, CoreSetId, JobId, Priority, ResourceId, TaskId, Time};
