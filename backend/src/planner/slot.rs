//! Slot planner
//!
//! Books each obligation into the first weekday half-hour slot between
//! 08:00 and 15:00 that is at least `lead` hours away and still has room.
//! Slot usage is keyed by half-hour index so floating-point noise in `now`
//! never splits one slot into two.

use crate::core::time::{next_planning_slot, SimTime};
use crate::planner::{PlannedEvent, Planner};
use crate::problem::PlannableSet;
use log::trace;
use std::collections::BTreeMap;

/// Capacity-limited planner over weekday planning slots.
///
/// # Example
/// ```
/// use case_sim_core::models::element::CaseId;
/// use case_sim_core::planner::{Planner, SlotPlanner};
/// use case_sim_core::problem::PlannableSet;
///
/// let mut plannable = PlannableSet::new();
/// plannable.add(CaseId(0), "time_for_intake");
/// plannable.add(CaseId(1), "time_for_intake");
///
/// // Monday 18:00, one patient per slot, at least 24 h ahead
/// let mut planner = SlotPlanner::new(24.0, 1);
/// let plan = planner.plan(&plannable, 18.0);
/// assert_eq!(plan[0].time, 48.0 + 8.0);   // Wednesday 08:00
/// assert_eq!(plan[1].time, 48.0 + 8.5);   // Wednesday 08:30
/// ```
#[derive(Debug, Clone)]
pub struct SlotPlanner {
    lead: SimTime,
    capacity: usize,
    /// Half-hour index -> bookings
    usage: BTreeMap<i64, usize>,
}

impl SlotPlanner {
    pub fn new(lead: SimTime, capacity: usize) -> Self {
        Self {
            lead: lead.max(0.0),
            capacity: capacity.max(1),
            usage: BTreeMap::new(),
        }
    }

    fn slot_key(time: SimTime) -> i64 {
        (time * 2.0).round() as i64
    }

    /// Bookings in the slot containing `time`
    pub fn usage_at(&self, time: SimTime) -> usize {
        self.usage.get(&Self::slot_key(time)).copied().unwrap_or(0)
    }

    fn book(&mut self, earliest: SimTime) -> Option<SimTime> {
        let mut candidate = next_planning_slot(earliest)?;
        loop {
            let key = Self::slot_key(candidate);
            let used = self.usage.entry(key).or_insert(0);
            if *used < self.capacity {
                *used += 1;
                return Some(candidate);
            }
            candidate = next_planning_slot(candidate + 0.5)?;
        }
    }
}

impl Planner for SlotPlanner {
    fn plan(&mut self, plannable: &PlannableSet, now: SimTime) -> Vec<PlannedEvent> {
        // Slots in the past can never be booked again
        let current = Self::slot_key(now);
        self.usage.retain(|key, _| *key >= current);

        let mut planned = Vec::with_capacity(plannable.len());
        for (case_id, label) in plannable.iter() {
            if let Some(time) = self.book(now + self.lead) {
                trace!("booked {}:{} at {}", case_id, label, time);
                planned.push(PlannedEvent::new(case_id, label, time));
            }
        }
        planned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::is_planning_slot;
    use crate::models::element::CaseId;

    #[test]
    fn test_capacity_spreads_bookings() {
        let mut plannable = PlannableSet::new();
        for case in 0..5 {
            plannable.add(CaseId(case), "time_for_intake");
        }
        let mut planner = SlotPlanner::new(24.0, 2);
        let plan = planner.plan(&plannable, 18.0);

        let times: Vec<_> = plan.iter().map(|p| p.time).collect();
        assert_eq!(times, vec![56.0, 56.0, 56.5, 56.5, 57.0]);
        assert!(times.iter().all(|t| is_planning_slot(*t)));
        assert_eq!(planner.usage_at(56.0), 2);
    }

    #[test]
    fn test_friday_evening_rolls_to_monday() {
        let mut plannable = PlannableSet::new();
        plannable.add(CaseId(0), "time_for_intake");
        let mut planner = SlotPlanner::new(24.0, 1);

        // Thursday 18:00 + 24 h = Friday 18:00, after the last slot
        let plan = planner.plan(&plannable, 3.0 * 24.0 + 18.0);
        assert_eq!(plan[0].time, 168.0 + 8.0);
    }

    #[test]
    fn test_lead_respected() {
        let mut plannable = PlannableSet::new();
        plannable.add(CaseId(0), "x");
        let mut planner = SlotPlanner::new(24.0, 1);
        let now = 9.2;
        let plan = planner.plan(&plannable, now);
        assert!(plan[0].time >= now + 24.0);
    }
}
