//! Scripted problem and planner shared by the simulator tests
//!
//! The problem is driven by small tables: arrivals, durations and eligible
//! resources per label, and a list of steps to take when a label completes.

#![allow(dead_code)]

use case_sim_core::models::element::{CaseId, DataBag, Element, ElementId};
use case_sim_core::models::event::EventKind;
use case_sim_core::models::resource::{Resource, ResourceId};
use case_sim_core::planner::{PlannedEvent, Planner, Report};
use case_sim_core::problem::{
    Evaluation, PlannableSet, Problem, ProblemError, RunSummary, TransitionContext,
};
use case_sim_core::{SimTime, Simulator, SimulatorConfig};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

/// What happens when an element with a given label completes
#[derive(Debug, Clone)]
pub enum Step {
    /// Activate a task
    Task(&'static str),
    /// Activate an event this many hours from now
    EventAfter(&'static str, SimTime),
    /// Open a plannable obligation
    Obligation(&'static str),
    /// Cancel a pending element of the same case
    Cancel(&'static str),
    /// Cancel a pending element of another case
    CancelIn(u64, &'static str),
}

pub struct ScriptedProblem {
    resources: Vec<Resource>,
    initial_arrivals: VecDeque<(SimTime, Element)>,
    arrivals: VecDeque<(SimTime, Element)>,
    durations: HashMap<String, SimTime>,
    pools: HashMap<String, Vec<ResourceId>>,
    steps: HashMap<String, Vec<Step>>,
    unavailable: Vec<(SimTime, SimTime)>,
    prioritized_types: Vec<String>,
    planning_interval: SimTime,
    plannable: PlannableSet,
    next_id: u64,
    first_generated_id: u64,
    pub completions: Vec<(String, SimTime)>,
}

impl ScriptedProblem {
    pub fn new(resource_count: usize) -> Self {
        let resources = (1..=resource_count)
            .map(|n| Resource::new(format!("R{n}"), "worker"))
            .collect();
        Self {
            resources,
            initial_arrivals: VecDeque::new(),
            arrivals: VecDeque::new(),
            durations: HashMap::new(),
            pools: HashMap::new(),
            steps: HashMap::new(),
            unavailable: Vec::new(),
            prioritized_types: Vec::new(),
            planning_interval: 1000.0,
            plannable: PlannableSet::new(),
            next_id: 0,
            first_generated_id: 0,
            completions: Vec::new(),
        }
    }

    fn push_arrival(mut self, time: SimTime, element: Element) -> Self {
        self.next_id += 1;
        self.first_generated_id = self.next_id;
        self.initial_arrivals.push_back((time, element.clone()));
        self.arrivals.push_back((time, element));
        self
    }

    /// A case of type "A" arriving at `time` with a task
    pub fn task_arrival(self, time: SimTime, case: u64, label: &str) -> Self {
        self.typed_task_arrival(time, case, "A", label)
    }

    pub fn typed_task_arrival(self, time: SimTime, case: u64, case_type: &str, label: &str) -> Self {
        let element = Element::task(ElementId(self.next_id), CaseId(case), case_type, label).unwrap();
        self.push_arrival(time, element)
    }

    /// A case of type "A" arriving at `time` with an event occurring then
    pub fn event_arrival(self, time: SimTime, case: u64, label: &str) -> Self {
        let element = Element::event(ElementId(self.next_id), CaseId(case), "A", label, time).unwrap();
        self.push_arrival(time, element)
    }

    pub fn duration(mut self, label: &str, hours: SimTime) -> Self {
        self.durations.insert(label.to_string(), hours);
        self
    }

    pub fn pool(mut self, label: &str, resources: &[&str]) -> Self {
        self.pools.insert(
            label.to_string(),
            resources.iter().map(|r| ResourceId::new(*r)).collect(),
        );
        self
    }

    pub fn then(mut self, label: &str, step: Step) -> Self {
        self.steps.entry(label.to_string()).or_default().push(step);
        self
    }

    /// Every resource is off duty in `[from, until)`
    pub fn unavailable(mut self, from: SimTime, until: SimTime) -> Self {
        self.unavailable.push((from, until));
        self
    }

    pub fn prioritize(mut self, case_type: &str) -> Self {
        self.prioritized_types.push(case_type.to_string());
        self
    }

    pub fn planning_every(mut self, interval: SimTime) -> Self {
        self.planning_interval = interval;
        self
    }

    fn new_id(&mut self) -> ElementId {
        let id = ElementId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl Problem for ScriptedProblem {
    fn resources(&self) -> Vec<Resource> {
        self.resources.clone()
    }

    fn next_case(&mut self) -> Result<Option<(SimTime, Element)>, ProblemError> {
        Ok(self.arrivals.pop_front())
    }

    fn resource_pool(
        &self,
        element: &Element,
        _case_data: &DataBag,
    ) -> Result<Vec<ResourceId>, ProblemError> {
        Ok(self
            .pools
            .get(element.label())
            .cloned()
            .unwrap_or_else(|| self.resources.iter().map(|r| r.id().clone()).collect()))
    }

    fn resources_available(&self, _resource: &Resource, time: SimTime) -> bool {
        !self
            .unavailable
            .iter()
            .any(|(from, until)| *from <= time && time < *until)
    }

    fn processing_time_sample(
        &mut self,
        _resource: &Resource,
        element: &Element,
        _case_data: &DataBag,
        _time: SimTime,
    ) -> Result<SimTime, ProblemError> {
        Ok(self.durations.get(element.label()).copied().unwrap_or(1.0))
    }

    fn complete_element(
        &mut self,
        element: &Element,
        ctx: &mut TransitionContext<'_>,
    ) -> Result<Vec<Element>, ProblemError> {
        let now = ctx.now();
        let case_id = element.case_id();
        self.completions.push((element.label().to_string(), now));

        let steps = self.steps.get(element.label()).cloned().unwrap_or_default();
        let mut next = Vec::new();
        for step in steps {
            match step {
                Step::Task(label) => {
                    let id = self.new_id();
                    next.push(Element::task(id, case_id, element.case_type(), label)?);
                }
                Step::EventAfter(label, delay) => {
                    let id = self.new_id();
                    next.push(Element::event(id, case_id, element.case_type(), label, now + delay)?);
                }
                Step::Obligation(label) => {
                    self.plannable.add(case_id, label);
                }
                Step::Cancel(label) => ctx.cancel(case_id, label),
                Step::CancelIn(other, label) => ctx.cancel(CaseId(other), label),
            }
        }
        Ok(next)
    }

    fn data_sample(&mut self, _element: &Element) -> DataBag {
        DataBag::new()
    }

    fn next_regular_planning_moment(&self, previous: SimTime) -> SimTime {
        previous + self.planning_interval
    }

    fn next_element_id(&mut self) -> ElementId {
        self.new_id()
    }

    fn plannable(&self) -> &PlannableSet {
        &self.plannable
    }

    fn plannable_mut(&mut self) -> &mut PlannableSet {
        &mut self.plannable
    }

    fn is_prioritized(&self, element: &Element) -> bool {
        self.prioritized_types
            .iter()
            .any(|t| t == element.case_type())
    }

    fn restart(&mut self) {
        self.arrivals = self.initial_arrivals.clone();
        self.plannable.clear();
        self.next_id = self.first_generated_id;
        self.completions.clear();
    }

    fn evaluate(&self, run: &RunSummary<'_>) -> Evaluation {
        Evaluation::new()
            .with("finalized", run.cases.finalized_count() as f64)
            .with("unfinished", run.cases.unfinished_count(run.now) as f64)
            .with("open_obligations", self.plannable.len() as f64)
    }
}

/// How the scripted planner picks times
#[derive(Debug, Clone)]
pub enum PlanMode {
    /// Every obligation at this absolute moment
    At(SimTime),
    /// Every obligation this many hours after now
    After(SimTime),
    /// This batch once, then nothing
    Once(Vec<PlannedEvent>),
    /// Nothing before `start`, then every obligation `delay` after now
    From { start: SimTime, delay: SimTime },
    /// Never plan
    Idle,
}

pub type ReportLog = Rc<RefCell<Vec<(EventKind, CaseId, SimTime)>>>;

pub struct ScriptedPlanner {
    mode: PlanMode,
    reports: ReportLog,
}

impl ScriptedPlanner {
    pub fn new(mode: PlanMode) -> Self {
        Self {
            mode,
            reports: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Shared handle to the reports received so far
    pub fn reports(&self) -> ReportLog {
        Rc::clone(&self.reports)
    }
}

impl Planner for ScriptedPlanner {
    fn plan(&mut self, plannable: &PlannableSet, now: SimTime) -> Vec<PlannedEvent> {
        match &mut self.mode {
            PlanMode::At(time) => plannable
                .iter()
                .map(|(case_id, label)| PlannedEvent::new(case_id, label, *time))
                .collect(),
            PlanMode::After(delay) => plannable
                .iter()
                .map(|(case_id, label)| PlannedEvent::new(case_id, label, now + *delay))
                .collect(),
            PlanMode::Once(batch) => std::mem::take(batch),
            PlanMode::From { start, delay } if now >= *start => plannable
                .iter()
                .map(|(case_id, label)| PlannedEvent::new(case_id, label, now + *delay))
                .collect(),
            PlanMode::From { .. } => Vec::new(),
            PlanMode::Idle => Vec::new(),
        }
    }

    fn report(&mut self, report: &Report<'_>) {
        self.reports
            .borrow_mut()
            .push((report.kind, report.case_id, report.time));
    }
}

/// Simulator config with the given horizon
pub fn config(horizon: SimTime) -> SimulatorConfig {
    SimulatorConfig {
        horizon,
        ..SimulatorConfig::default()
    }
}

pub fn simulator(problem: ScriptedProblem, planner: ScriptedPlanner, horizon: SimTime) -> Simulator {
    Simulator::new(config(horizon), Box::new(problem), Box::new(planner)).unwrap()
}
