//! Case registry
//!
//! Tracks every case from arrival to finalization. An active case owns its
//! busy set: the elements activated but not yet completed (or cancelled).
//! A case is ready to close when that set is empty; it is finalized exactly
//! once, when its COMPLETE_CASE event is dispatched.

use crate::core::time::SimTime;
use crate::models::element::{CaseId, DataBag, Element, ElementId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised by case bookkeeping
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CaseError {
    #[error("Unknown or already finalized case: {0}")]
    UnknownCase(CaseId),

    #[error("Case {0} already started")]
    DuplicateCase(CaseId),

    #[error("Element {element_id} is not busy in {case_id}")]
    ElementNotBusy {
        case_id: CaseId,
        element_id: ElementId,
    },

    #[error("Element {element_id} is already busy in {case_id}")]
    ElementAlreadyBusy {
        case_id: CaseId,
        element_id: ElementId,
    },

    #[error("Case {case_id} still has {busy} busy element(s)")]
    CaseStillBusy { case_id: CaseId, busy: usize },
}

/// Bookkeeping for an active case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    case_type: String,
    start_time: SimTime,
    data: DataBag,
    /// Busy elements in activation order
    busy: Vec<ElementId>,
    closing: bool,
}

impl CaseRecord {
    pub fn case_type(&self) -> &str {
        &self.case_type
    }

    pub fn start_time(&self) -> SimTime {
        self.start_time
    }

    pub fn data(&self) -> &DataBag {
        &self.data
    }

    pub fn busy(&self) -> &[ElementId] {
        &self.busy
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }
}

/// A case that has been finalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedCase {
    pub case_id: CaseId,
    pub case_type: String,
    pub start_time: SimTime,
    pub completion_time: SimTime,
}

impl CompletedCase {
    /// Cycle time: completion minus arrival
    pub fn duration(&self) -> SimTime {
        self.completion_time - self.start_time
    }
}

/// Registry of active and finalized cases
///
/// # Example
/// ```
/// use case_sim_core::models::case::CaseRegistry;
/// use case_sim_core::models::element::{CaseId, Element, ElementId};
///
/// let mut cases = CaseRegistry::new();
/// cases.start_case(CaseId(0), "A", 0.0).unwrap();
///
/// let task = Element::task(ElementId(0), CaseId(0), "A", "intake").unwrap();
/// cases.activate(&task).unwrap();
/// assert!(!cases.is_finalized(CaseId(0)));
///
/// cases.resolve(CaseId(0), ElementId(0)).unwrap();
/// assert!(cases.mark_closing(CaseId(0)));
/// let done = cases.finalize(CaseId(0), 2.5).unwrap();
/// assert_eq!(done.duration(), 2.5);
/// assert_eq!(cases.finalized_count(), 1);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseRegistry {
    active: BTreeMap<CaseId, CaseRecord>,
    completed: Vec<CompletedCase>,
    /// Ids of `completed`, for duplicate checks
    finalized: BTreeSet<CaseId>,
    total_cycle_time: SimTime,
}

impl CaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly arrived case.
    pub fn start_case(
        &mut self,
        case_id: CaseId,
        case_type: impl Into<String>,
        time: SimTime,
    ) -> Result<(), CaseError> {
        if self.active.contains_key(&case_id) || self.finalized.contains(&case_id) {
            return Err(CaseError::DuplicateCase(case_id));
        }
        self.active.insert(
            case_id,
            CaseRecord {
                case_type: case_type.into(),
                start_time: time,
                data: DataBag::new(),
                busy: Vec::new(),
                closing: false,
            },
        );
        Ok(())
    }

    /// Add an element to its case's busy set.
    ///
    /// Activating an element on a case that is waiting for COMPLETE_CASE
    /// reopens it.
    pub fn activate(&mut self, element: &Element) -> Result<(), CaseError> {
        let case_id = element.case_id();
        let record = self
            .active
            .get_mut(&case_id)
            .ok_or(CaseError::UnknownCase(case_id))?;
        if record.busy.contains(&element.id()) {
            return Err(CaseError::ElementAlreadyBusy {
                case_id,
                element_id: element.id(),
            });
        }
        record.busy.push(element.id());
        record.closing = false;
        Ok(())
    }

    /// Remove a completed or cancelled element from the busy set.
    pub fn resolve(&mut self, case_id: CaseId, element_id: ElementId) -> Result<(), CaseError> {
        let record = self
            .active
            .get_mut(&case_id)
            .ok_or(CaseError::UnknownCase(case_id))?;
        let position = record
            .busy
            .iter()
            .position(|id| *id == element_id)
            .ok_or(CaseError::ElementNotBusy {
                case_id,
                element_id,
            })?;
        record.busy.remove(position);
        Ok(())
    }

    /// True when the case has no busy elements (or is no longer active).
    pub fn is_finalized(&self, case_id: CaseId) -> bool {
        self.active
            .get(&case_id)
            .map_or(true, |record| record.busy.is_empty())
    }

    /// Flag an idle case for closing. Returns true only the first time, so
    /// the caller schedules exactly one COMPLETE_CASE.
    pub fn mark_closing(&mut self, case_id: CaseId) -> bool {
        match self.active.get_mut(&case_id) {
            Some(record) if record.busy.is_empty() && !record.closing => {
                record.closing = true;
                true
            }
            _ => false,
        }
    }

    /// Whether the case is idle and flagged for closing.
    pub fn is_ready_to_finalize(&self, case_id: CaseId) -> bool {
        self.active
            .get(&case_id)
            .map_or(false, |record| record.closing && record.busy.is_empty())
    }

    /// Move a case out of the active set and accumulate its cycle time.
    pub fn finalize(&mut self, case_id: CaseId, now: SimTime) -> Result<CompletedCase, CaseError> {
        let busy = self
            .active
            .get(&case_id)
            .ok_or(CaseError::UnknownCase(case_id))?
            .busy
            .len();
        if busy > 0 {
            return Err(CaseError::CaseStillBusy { case_id, busy });
        }
        let record = self
            .active
            .remove(&case_id)
            .ok_or(CaseError::UnknownCase(case_id))?;

        let completed = CompletedCase {
            case_id,
            case_type: record.case_type,
            start_time: record.start_time,
            completion_time: now,
        };
        self.total_cycle_time += completed.duration();
        self.finalized.insert(case_id);
        self.completed.push(completed.clone());
        Ok(completed)
    }

    /// Merge element data into the case's data bag; later keys win.
    pub fn merge_data(&mut self, case_id: CaseId, data: &DataBag) -> Result<(), CaseError> {
        let record = self
            .active
            .get_mut(&case_id)
            .ok_or(CaseError::UnknownCase(case_id))?;
        record
            .data
            .extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }

    pub fn get(&self, case_id: CaseId) -> Option<&CaseRecord> {
        self.active.get(&case_id)
    }

    pub fn is_active(&self, case_id: CaseId) -> bool {
        self.active.contains_key(&case_id)
    }

    pub fn case_type(&self, case_id: CaseId) -> Option<&str> {
        self.active.get(&case_id).map(CaseRecord::case_type)
    }

    pub fn case_data(&self, case_id: CaseId) -> Option<&DataBag> {
        self.active.get(&case_id).map(CaseRecord::data)
    }

    pub fn start_time(&self, case_id: CaseId) -> Option<SimTime> {
        self.active.get(&case_id).map(CaseRecord::start_time)
    }

    /// Active cases in id order
    pub fn active_cases(&self) -> impl Iterator<Item = (CaseId, &CaseRecord)> {
        self.active.iter().map(|(id, record)| (*id, record))
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Cases started at or before `now` and not yet finalized.
    pub fn unfinished_count(&self, now: SimTime) -> usize {
        self.active
            .values()
            .filter(|record| record.start_time <= now)
            .count()
    }

    pub fn completed_cases(&self) -> &[CompletedCase] {
        &self.completed
    }

    pub fn finalized_count(&self) -> usize {
        self.completed.len()
    }

    /// Sum of cycle times over finalized cases
    pub fn total_cycle_time(&self) -> SimTime {
        self.total_cycle_time
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
