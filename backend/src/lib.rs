//! Case Simulation Core - discrete-event kernel for business processes
//!
//! Simulates case-based processes (a patient through a hospital, an order
//! through a warehouse) in which tasks need resources, events happen at
//! given moments, and some events are scheduled by an external planner.
//!
//! # Architecture
//!
//! - **core**: Simulation time, calendars and the event queue
//! - **models**: Domain types (Element, Resource, case registry, resource pool, history)
//! - **problem**: The `Problem` contract and the reference hospital problem
//! - **planner**: The `Planner` contract and built-in planners
//! - **orchestrator**: Main simulation loop
//! - **arrivals**: Case arrival generation
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. The clock never decreases; equal moments are totally ordered
//! 2. Every resource is in exactly one of available, busy or away
//! 3. A case is finalized exactly once, after its last element resolves
//! 4. All randomness is deterministic (seeded RNG)

// Module declarations
pub mod arrivals;
pub mod core;
pub mod models;
pub mod orchestrator;
pub mod planner;
pub mod problem;
pub mod rng;

// Re-exports for convenience
pub use arrivals::{ArrivalConfig, ArrivalGenerator, InterarrivalDistribution};
pub use core::{EventQueue, QueueError, SimTime};
pub use models::{
    case::{CaseError, CaseRegistry},
    element::{CaseId, DataBag, Element, ElementError, ElementId, ElementKind},
    event::{EventKind, EventLog, SimEvent},
    history::RunHistory,
    pool::{PoolError, ResourcePool, ResourceStatus},
    resource::{Resource, ResourceId},
};
pub use orchestrator::{SimulationError, Simulator, SimulatorConfig};
pub use planner::{LeadTimePlanner, PlannedEvent, Planner, PlannerConfig, Report, SlotPlanner};
pub use problem::{
    AssignmentError, Evaluation, HealthcareConfig, HealthcareProblem, PlannableSet, PlanningError,
    Problem, ProblemError, TransitionContext,
};
pub use rng::RngManager;
