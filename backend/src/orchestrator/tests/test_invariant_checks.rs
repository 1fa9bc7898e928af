//! The engine refuses assignment lists, plans and arrivals that would corrupt state.

use crate::core::queue::QueueError;
use crate::core::time::SimTime;
use crate::models::case::CaseRegistry;
use crate::models::element::{CaseId, DataBag, Element, ElementError, ElementId, IdSequence};
use crate::models::resource::{Resource, ResourceId};
use crate::orchestrator::{SimulationError, Simulator, SimulatorConfig};
use crate::planner::LeadTimePlanner;
use crate::problem::{
    AssignmentError, Evaluation, PlanContext, PlannableSet, PlanningError, Problem, ProblemError,
    RunSummary, TransitionContext,
};

/// Misbehaving problem. Its assignment hook hands every waiting task the
/// same resource, its `plan` materializes events one hour before the
/// clock, and it may follow its arrivals with one at a bad moment.
struct GreedyProblem {
    ids: IdSequence,
    arrivals: Vec<(SimTime, Element)>,
    bad_arrival: Option<SimTime>,
    plannable: PlannableSet,
}

impl GreedyProblem {
    /// Two tasks arriving at t=0
    fn double_booking() -> Self {
        let mut ids = IdSequence::new();
        let arrivals = (0..2)
            .map(|case| {
                let task = Element::task(ids.next_element_id(), CaseId(case), "A", "work").unwrap();
                (0.0, task)
            })
            .rev()
            .collect();
        Self {
            ids,
            arrivals,
            bad_arrival: None,
            plannable: PlannableSet::new(),
        }
    }

    /// One referral at t=2 that opens a "follow_up" obligation
    fn planning_backwards() -> Self {
        let mut ids = IdSequence::new();
        let referral = Element::event(ids.next_element_id(), CaseId(0), "A", "referral", 2.0).unwrap();
        Self {
            ids,
            arrivals: vec![(2.0, referral)],
            bad_arrival: None,
            plannable: PlannableSet::new(),
        }
    }

    /// One referral at t=2, then an arrival whose moment is not a number
    fn arrival_without_moment() -> Self {
        Self {
            bad_arrival: Some(f64::NAN),
            ..Self::planning_backwards()
        }
    }
}

impl Problem for GreedyProblem {
    fn resources(&self) -> Vec<Resource> {
        vec![Resource::new("R1", "worker"), Resource::new("R2", "worker")]
    }

    fn next_case(&mut self) -> Result<Option<(SimTime, Element)>, ProblemError> {
        if let Some(arrival) = self.arrivals.pop() {
            return Ok(Some(arrival));
        }
        let Some(time) = self.bad_arrival.take() else {
            return Ok(None);
        };
        let element = Element::event(self.ids.next_element_id(), CaseId(1), "A", "referral", time)?;
        Ok(Some((time, element)))
    }

    fn resource_pool(&self, _: &Element, _: &DataBag) -> Result<Vec<ResourceId>, ProblemError> {
        Ok(vec![ResourceId::new("R1")])
    }

    fn resources_available(&self, _: &Resource, _: SimTime) -> bool {
        true
    }

    fn processing_time_sample(
        &mut self,
        _: &Resource,
        _: &Element,
        _: &DataBag,
        _: SimTime,
    ) -> Result<SimTime, ProblemError> {
        Ok(1.0)
    }

    fn complete_element(
        &mut self,
        element: &Element,
        ctx: &mut TransitionContext<'_>,
    ) -> Result<Vec<Element>, ProblemError> {
        if element.label() != "referral" {
            return Ok(Vec::new());
        }
        self.plannable.add(element.case_id(), "follow_up");
        let keep_alive = Element::event(
            self.ids.next_element_id(),
            element.case_id(),
            "A",
            "deadline",
            ctx.now() + 50.0,
        )?;
        Ok(vec![keep_alive])
    }

    fn data_sample(&mut self, _: &Element) -> DataBag {
        DataBag::new()
    }

    fn next_regular_planning_moment(&self, previous: SimTime) -> SimTime {
        previous + 100.0
    }

    fn next_element_id(&mut self) -> ElementId {
        self.ids.next_element_id()
    }

    fn plannable(&self) -> &PlannableSet {
        &self.plannable
    }

    fn plannable_mut(&mut self) -> &mut PlannableSet {
        &mut self.plannable
    }

    fn assign_resources(
        &self,
        unassigned: &[&Element],
        _: &[&Resource],
        _: &CaseRegistry,
    ) -> Result<Vec<(ElementId, ResourceId)>, ProblemError> {
        Ok(unassigned
            .iter()
            .map(|task| (task.id(), ResourceId::new("R1")))
            .collect())
    }

    fn plan(
        &mut self,
        case_id: CaseId,
        label: &str,
        _: SimTime,
        ctx: &PlanContext<'_>,
    ) -> Result<Vec<Element>, PlanningError> {
        // Materialize one hour before the clock
        let element = Element::event(self.ids.next_element_id(), case_id, "A", label, ctx.now - 1.0)?;
        self.plannable.remove(case_id, label);
        Ok(vec![element])
    }

    fn evaluate(&self, _: &RunSummary<'_>) -> Evaluation {
        Evaluation::new()
    }
}

fn run(problem: GreedyProblem) -> SimulationError {
    let mut sim = Simulator::new(
        SimulatorConfig::default(),
        Box::new(problem),
        Box::new(LeadTimePlanner::new(0.0)),
    )
    .unwrap();
    sim.run().unwrap_err()
}

#[test]
fn test_assigning_busy_resource_is_invariant_violation() {
    let err = run(GreedyProblem::double_booking());

    assert!(err.is_invariant_violation());
    assert!(!err.is_contract_violation());
    assert_eq!(
        err,
        SimulationError::Assignment(AssignmentError::ResourceNotAvailable(ResourceId::new("R1")))
    );
}

#[test]
fn test_planned_element_in_past_is_rejected() {
    let err = run(GreedyProblem::planning_backwards());

    assert!(err.is_invariant_violation());
    assert!(matches!(
        err,
        SimulationError::Queue(QueueError::EventInPast { moment, now, .. }) if moment == 1.0 && now == 2.0
    ));
}

#[test]
fn test_unbuildable_arrival_aborts_run() {
    let err = run(GreedyProblem::arrival_without_moment());

    assert!(matches!(
        err,
        SimulationError::Problem(ProblemError::Element(ElementError::NonFiniteOccurrenceTime {
            case_id: CaseId(1),
            ..
        }))
    ));
}

#[test]
fn test_error_conversions() {
    let planning: SimulationError = PlanningError::CaseNotActive(CaseId(1)).into();
    assert!(planning.is_contract_violation());

    let problem: SimulationError = ProblemError::UnknownLabel("x".to_string()).into();
    assert!(!problem.is_contract_violation());
    assert!(!problem.is_invariant_violation());

    let config = SimulationError::InvalidConfig("horizon".to_string());
    assert_eq!(config.to_string(), "Invalid config: horizon");
}
