//! Fixed lead-time planner

use crate::core::time::SimTime;
use crate::planner::{PlannedEvent, Planner};
use crate::problem::PlannableSet;

/// Plans every open obligation at `now + lead`.
///
/// # Example
/// ```
/// use case_sim_core::models::element::CaseId;
/// use case_sim_core::planner::{LeadTimePlanner, Planner};
/// use case_sim_core::problem::PlannableSet;
///
/// let mut plannable = PlannableSet::new();
/// plannable.add(CaseId(4), "time_for_intake");
///
/// let mut planner = LeadTimePlanner::new(24.0);
/// let plan = planner.plan(&plannable, 18.0);
/// assert_eq!(plan.len(), 1);
/// assert_eq!(plan[0].time, 42.0);
/// ```
#[derive(Debug, Clone)]
pub struct LeadTimePlanner {
    lead: SimTime,
}

impl LeadTimePlanner {
    pub fn new(lead: SimTime) -> Self {
        Self {
            lead: lead.max(0.0),
        }
    }

    pub fn lead(&self) -> SimTime {
        self.lead
    }
}

impl Planner for LeadTimePlanner {
    fn plan(&mut self, plannable: &PlannableSet, now: SimTime) -> Vec<PlannedEvent> {
        plannable
            .iter()
            .map(|(case_id, label)| PlannedEvent::new(case_id, label, now + self.lead))
            .collect()
    }
}
