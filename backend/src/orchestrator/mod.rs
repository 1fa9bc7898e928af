//! Orchestrator - the simulation loop
//!
//! Owns the event queue, case registry, resource pool and run history, and
//! drives a `Problem` and a `Planner` through a run.
//!
//! See `engine.rs` for the dispatch rules.

pub mod config;
pub mod engine;

#[cfg(test)]
mod tests;

pub use config::SimulatorConfig;
pub use engine::{SimulationError, Simulator};
