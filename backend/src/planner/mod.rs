//! Planner contract and built-in planners
//!
//! A planner sees the problem's plannable obligations at every planning
//! moment and proposes a time for any subset of them. The simulator checks
//! each proposal (not in the past, actually plannable, case still active)
//! before the problem materializes it; an invalid proposal aborts the run.
//!
//! Planners also receive a report for every case-related event the
//! simulator dispatches, so they can keep their own view of the process.
//!
//! # Built-in planners
//!
//! - [`LeadTimePlanner`]: everything at `now + lead`
//! - [`SlotPlanner`]: first weekday half-hour slot after `now + lead` with
//!   spare capacity

mod lead_time;
mod slot;

pub use lead_time::LeadTimePlanner;
pub use slot::SlotPlanner;

use crate::core::time::SimTime;
use crate::models::element::{CaseId, Element};
use crate::models::event::EventKind;
use crate::models::resource::ResourceId;
use crate::problem::PlannableSet;
use serde::{Deserialize, Serialize};

/// A proposed time for one plannable obligation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedEvent {
    pub case_id: CaseId,
    pub label: String,
    pub time: SimTime,
}

impl PlannedEvent {
    pub fn new(case_id: CaseId, label: impl Into<String>, time: SimTime) -> Self {
        Self {
            case_id,
            label: label.into(),
            time,
        }
    }
}

/// Lifecycle notification sent to the planner
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    pub kind: EventKind,
    pub case_id: CaseId,
    pub element: Option<&'a Element>,
    pub resource: Option<&'a ResourceId>,
    pub time: SimTime,
}

/// Decides when plannable events happen
pub trait Planner {
    /// Propose times for any subset of the open obligations.
    fn plan(&mut self, plannable: &PlannableSet, now: SimTime) -> Vec<PlannedEvent>;

    /// Observe a case lifecycle event. Default: ignore.
    fn report(&mut self, _report: &Report<'_>) {}
}

/// Planner selection, as loaded from configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlannerConfig {
    LeadTime { lead: f64 },
    Slot { lead: f64, capacity: usize },
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig::LeadTime { lead: 24.0 }
    }
}

impl PlannerConfig {
    /// Build the configured planner
    pub fn build(&self) -> Box<dyn Planner> {
        match *self {
            PlannerConfig::LeadTime { lead } => Box::new(LeadTimePlanner::new(lead)),
            PlannerConfig::Slot { lead, capacity } => Box::new(SlotPlanner::new(lead, capacity)),
        }
    }
}
