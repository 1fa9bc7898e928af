//! Problem contract
//!
//! A `Problem` describes one business process: its resources, how cases
//! arrive, which resources may execute which tasks, how long work takes,
//! what happens after each element completes and how a run is scored. The
//! simulator drives it and never inspects its internals.
//!
//! Problems interact with kernel state only through what is passed in:
//! read-only case data, a [`TransitionContext`] for completions (which can
//! request cancellations), a [`PlanContext`] for planning and a
//! [`RunSummary`] at the end of a run. They cannot insert events directly.
//!
//! # Plannable obligations
//!
//! Some events are not scheduled by the process itself but by an external
//! planner. The problem records those as `(case, label)` pairs in its
//! [`PlannableSet`]; the planner proposes times, and `plan` turns an
//! accepted proposal into an EVENT element and drops the obligation.

pub mod assignment;
pub mod healthcare;

use crate::core::time::SimTime;
use crate::models::case::CaseRegistry;
use crate::models::element::{CaseId, DataBag, Element, ElementError, ElementId};
use crate::models::history::RunHistory;
use crate::models::pool::ResourcePool;
use crate::models::resource::{Resource, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub use assignment::{assign_by_priority, validate_assignments, AssignmentError};
pub use healthcare::{HealthcareConfig, HealthcareProblem};

/// Failure inside a problem callback
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProblemError {
    #[error("No transition defined for label '{0}'")]
    UnknownLabel(String),

    #[error("Unknown resource type '{0}'")]
    UnknownResourceType(String),

    #[error("Case {case_id} has no usable '{key}' in its data")]
    MissingCaseData { case_id: CaseId, key: String },

    #[error("Invalid processing time {duration} for '{label}'")]
    InvalidDuration { label: String, duration: SimTime },

    #[error("Next planning moment {next} is not after {previous}")]
    StalledPlanningMoment { previous: SimTime, next: SimTime },

    #[error("Invalid problem config: {0}")]
    InvalidConfig(String),

    #[error("Element error: {0}")]
    Element(#[from] ElementError),

    #[error("{0}")]
    Other(String),
}

/// A planning proposal that breaks the planning contract
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlanningError {
    #[error("Cannot plan '{label}' of {case_id} at {time}: clock is at {now}")]
    InThePast {
        case_id: CaseId,
        label: String,
        time: SimTime,
        now: SimTime,
    },

    #[error("'{label}' of {case_id} is not plannable")]
    NotPlannable { case_id: CaseId, label: String },

    #[error("'{label}' of {case_id} planned at {time}, earliest allowed is {earliest}")]
    LeadTimeViolated {
        case_id: CaseId,
        label: String,
        time: SimTime,
        earliest: SimTime,
    },

    #[error("Case {0} is not active")]
    CaseNotActive(CaseId),

    #[error("Planning '{label}' of {case_id} produced a task, not an event")]
    NotAnEvent { case_id: CaseId, label: String },

    #[error("Planned time for '{label}' of {case_id} is not finite")]
    NonFiniteTime { case_id: CaseId, label: String },

    #[error("Element error: {0}")]
    Element(#[from] ElementError),
}

/// Problem-owned set of `(case, label)` pairs awaiting a planned time
///
/// # Example
/// ```
/// use case_sim_core::models::element::CaseId;
/// use case_sim_core::problem::PlannableSet;
///
/// let mut plannable = PlannableSet::new();
/// assert!(plannable.add(CaseId(1), "time_for_intake"));
/// assert!(!plannable.add(CaseId(1), "time_for_intake"));
/// assert!(plannable.contains(CaseId(1), "time_for_intake"));
///
/// assert!(plannable.remove(CaseId(1), "time_for_intake"));
/// assert!(plannable.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannableSet {
    entries: BTreeMap<CaseId, Vec<String>>,
}

impl PlannableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an obligation; returns false if it was already present.
    pub fn add(&mut self, case_id: CaseId, label: impl Into<String>) -> bool {
        let label = label.into();
        let labels = self.entries.entry(case_id).or_default();
        if labels.contains(&label) {
            return false;
        }
        labels.push(label);
        true
    }

    /// Drop an obligation; returns false if it was not present.
    pub fn remove(&mut self, case_id: CaseId, label: &str) -> bool {
        let Some(labels) = self.entries.get_mut(&case_id) else {
            return false;
        };
        let Some(position) = labels.iter().position(|l| l == label) else {
            return false;
        };
        labels.remove(position);
        if labels.is_empty() {
            self.entries.remove(&case_id);
        }
        true
    }

    pub fn contains(&self, case_id: CaseId, label: &str) -> bool {
        self.entries
            .get(&case_id)
            .map_or(false, |labels| labels.iter().any(|l| l == label))
    }

    pub fn labels(&self, case_id: CaseId) -> &[String] {
        self.entries
            .get(&case_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Obligations as `(case, label)` pairs, by case id then insertion order
    pub fn iter(&self) -> impl Iterator<Item = (CaseId, &str)> {
        self.entries
            .iter()
            .flat_map(|(case_id, labels)| labels.iter().map(move |l| (*case_id, l.as_str())))
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// What a problem may see and request while handling a completion
pub struct TransitionContext<'a> {
    now: SimTime,
    pool: &'a ResourcePool,
    cases: &'a CaseRegistry,
    cancellations: Vec<(CaseId, String)>,
}

impl<'a> TransitionContext<'a> {
    pub fn new(now: SimTime, pool: &'a ResourcePool, cases: &'a CaseRegistry) -> Self {
        Self {
            now,
            pool,
            cases,
            cancellations: Vec::new(),
        }
    }

    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn pool(&self) -> &ResourcePool {
        self.pool
    }

    pub fn cases(&self) -> &CaseRegistry {
        self.cases
    }

    /// Whether at least one resource of the type is idle right now
    pub fn has_available(&self, resource_type: &str) -> bool {
        self.pool.available_of_type(resource_type).next().is_some()
    }

    /// Ask the kernel to cancel the latest pending `label` of `case_id`.
    ///
    /// Requests are applied after the callback returns, in request order.
    pub fn cancel(&mut self, case_id: CaseId, label: impl Into<String>) {
        self.cancellations.push((case_id, label.into()));
    }

    pub fn into_cancellations(self) -> Vec<(CaseId, String)> {
        self.cancellations
    }
}

/// What a problem may see while materializing a planned event
pub struct PlanContext<'a> {
    pub now: SimTime,
    pub cases: &'a CaseRegistry,
}

/// End-of-run view handed to `Problem::evaluate`
pub struct RunSummary<'a> {
    pub now: SimTime,
    pub cases: &'a CaseRegistry,
    pub history: &'a RunHistory,
}

impl RunSummary<'_> {
    /// Cases that arrived by the end of the run, finalized or not
    pub fn cases_started(&self) -> usize {
        self.cases.finalized_count() + self.cases.unfinished_count(self.now)
    }
}

/// Named score components; lower is better
///
/// # Example
/// ```
/// use case_sim_core::problem::Evaluation;
///
/// let evaluation = Evaluation::new()
///     .with("waiting", 12.5)
///     .with("unprocessed", 100.0);
/// assert_eq!(evaluation.get("waiting"), Some(12.5));
/// assert_eq!(evaluation.total(), 112.5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    components: BTreeMap<String, f64>,
}

impl Evaluation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.components.insert(name.into(), value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        self.components.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.components.get(name).copied()
    }

    pub fn components(&self) -> &BTreeMap<String, f64> {
        &self.components
    }

    pub fn total(&self) -> f64 {
        self.components.values().sum()
    }
}

/// A business process the simulator can run
///
/// Only the methods without defaults are required. Defaults give the
/// standard behaviour: priority-then-base assignment, plain event
/// materialization for plans, no reaction to task starts or restarts.
pub trait Problem {
    /// Every resource, in the order the pool should list them
    fn resources(&self) -> Vec<Resource>;

    /// Next case arrival and its initial element; `Ok(None)` ends arrivals.
    fn next_case(&mut self) -> Result<Option<(SimTime, Element)>, ProblemError>;

    /// Resources eligible to execute `element`, in preference order
    fn resource_pool(
        &self,
        element: &Element,
        case_data: &DataBag,
    ) -> Result<Vec<ResourceId>, ProblemError>;

    /// Availability calendar of one resource
    fn resources_available(&self, resource: &Resource, time: SimTime) -> bool;

    /// Duration of `element` on `resource` when started at `time`
    fn processing_time_sample(
        &mut self,
        resource: &Resource,
        element: &Element,
        case_data: &DataBag,
        time: SimTime,
    ) -> Result<SimTime, ProblemError>;

    /// Transition function: the elements that follow a completion
    fn complete_element(
        &mut self,
        element: &Element,
        ctx: &mut TransitionContext<'_>,
    ) -> Result<Vec<Element>, ProblemError>;

    /// Data bag for a newly created element
    fn data_sample(&mut self, element: &Element) -> DataBag;

    /// Regular planning moment following `previous` (0.0 for the first)
    fn next_regular_planning_moment(&self, previous: SimTime) -> SimTime;

    /// Fresh id for an element created by this problem
    fn next_element_id(&mut self) -> ElementId;

    fn plannable(&self) -> &PlannableSet;

    fn plannable_mut(&mut self) -> &mut PlannableSet;

    /// Score the finished run
    fn evaluate(&self, run: &RunSummary<'_>) -> Evaluation;

    /// Tasks served before the base class at assignment
    fn is_prioritized(&self, _element: &Element) -> bool {
        false
    }

    /// Pair unassigned tasks with available resources
    fn assign_resources(
        &self,
        unassigned: &[&Element],
        available: &[&Resource],
        cases: &CaseRegistry,
    ) -> Result<Vec<(ElementId, ResourceId)>, ProblemError> {
        assign_by_priority(
            unassigned,
            available,
            |element| {
                let empty = DataBag::new();
                let data = cases.case_data(element.case_id()).unwrap_or(&empty);
                self.resource_pool(element, data)
            },
            |element| self.is_prioritized(element),
        )
    }

    /// Turn an accepted planning proposal into elements to activate
    fn plan(
        &mut self,
        case_id: CaseId,
        label: &str,
        time: SimTime,
        ctx: &PlanContext<'_>,
    ) -> Result<Vec<Element>, PlanningError> {
        materialize_planned_event(self, case_id, label, time, ctx)
    }

    fn task_started(&mut self, _element: &Element, _now: SimTime) {}

    /// Reset to the state before the first arrival
    fn restart(&mut self) {}
}

/// Standard `plan` behaviour: one EVENT element at `time`, with sampled
/// data, and the obligation removed.
///
/// Fails without touching the problem when `time` is before `ctx.now` or
/// the obligation is not open.
pub fn materialize_planned_event<P: Problem + ?Sized>(
    problem: &mut P,
    case_id: CaseId,
    label: &str,
    time: SimTime,
    ctx: &PlanContext<'_>,
) -> Result<Vec<Element>, PlanningError> {
    if !time.is_finite() {
        return Err(PlanningError::NonFiniteTime {
            case_id,
            label: label.to_string(),
        });
    }
    if time < ctx.now {
        return Err(PlanningError::InThePast {
            case_id,
            label: label.to_string(),
            time,
            now: ctx.now,
        });
    }
    if !problem.plannable().contains(case_id, label) {
        return Err(PlanningError::NotPlannable {
            case_id,
            label: label.to_string(),
        });
    }
    let case_type = ctx
        .cases
        .case_type(case_id)
        .ok_or(PlanningError::CaseNotActive(case_id))?
        .to_string();
    let id = problem.next_element_id();
    let element = Element::event(id, case_id, case_type, label, time)?;
    let data = problem.data_sample(&element);
    problem.plannable_mut().remove(case_id, label);
    Ok(vec![element.with_data(data)])
}
