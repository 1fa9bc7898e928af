//! Simulation engine
//!
//! The `Simulator` owns the event queue, the case registry, the resource
//! pool and the run history, and drives a [`Problem`] and a [`Planner`]
//! through one run.
//!
//! # Event loop
//!
//! Events are popped in `(moment, tiebreak, sequence)` order and handled by
//! one exhaustive `match`:
//!
//! 1. **CaseArrival**: register the case, activate its initial element,
//!    schedule the next arrival
//! 2. **ActivateTask / ActivateEvent**: queue the task for assignment, or
//!    schedule the event's completion at its occurrence time
//! 3. **AssignResources**: pair waiting tasks with available resources
//! 4. **StartTask**: sample a duration, schedule the completion
//! 5. **CompleteTask / CompleteEvent**: release the resource, run the
//!    problem's transition function, apply cancellations, activate
//!    successors, close the case if it went idle
//! 6. **ScheduleResources**: apply resource calendars (periodic)
//! 7. **RegularPlanningMoment / PlanEvents**: ask the planner for times and
//!    materialize the accepted ones
//! 8. **CompleteCase**: finalize the case
//!
//! The run stops at the first event beyond the horizon; that event is not
//! dispatched and the clock is moved to the horizon before scoring.
//!
//! # Errors
//!
//! A planner proposal that is in the past, not plannable or otherwise
//! invalid is a contract violation; any inconsistency in kernel state is an
//! invariant violation. Both abort the run with a [`SimulationError`].

use crate::core::queue::{EventQueue, QueueError};
use crate::core::time::SimTime;
use crate::models::case::{CaseError, CaseRegistry};
use crate::models::element::{CaseId, Element, ElementError};
use crate::models::event::{EventKind, EventLog, LoggedEvent, ScheduledEvent, SimEvent};
use crate::models::history::RunHistory;
use crate::models::pool::{PoolError, ResourcePool};
use crate::models::resource::{Resource, ResourceId};
use crate::orchestrator::config::SimulatorConfig;
use crate::planner::{PlannedEvent, Planner, Report};
use crate::problem::{
    validate_assignments, AssignmentError, Evaluation, PlanContext, PlanningError, Problem,
    ProblemError, RunSummary, TransitionContext,
};
use log::{debug, info, warn};
use std::collections::HashSet;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Simulation error types
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Planning contract violated: {0}")]
    Planning(#[from] PlanningError),

    #[error("Element error: {0}")]
    Element(#[from] ElementError),

    #[error("Case registry error: {0}")]
    Case(#[from] CaseError),

    #[error("Resource pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Event queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Invalid assignment: {0}")]
    Assignment(#[from] AssignmentError),

    #[error("Problem error: {0}")]
    Problem(#[from] ProblemError),
}

impl SimulationError {
    /// The planner asked for something the contract forbids
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, SimulationError::Planning(_))
    }

    /// Kernel state became inconsistent
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            SimulationError::Element(_)
                | SimulationError::Case(_)
                | SimulationError::Pool(_)
                | SimulationError::Queue(_)
                | SimulationError::Assignment(_)
        )
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Discrete-event simulator for one problem and one planner
pub struct Simulator {
    config: SimulatorConfig,
    problem: Box<dyn Problem>,
    planner: Box<dyn Planner>,
    queue: EventQueue,
    cases: CaseRegistry,
    pool: ResourcePool,
    /// Activated tasks waiting for a resource, in activation order
    unassigned: Vec<Element>,
    history: RunHistory,
    event_log: EventLog,
    events_dispatched: usize,
}

impl Simulator {
    /// Create a simulator and schedule the initial events: the first case
    /// arrival, the first regular planning moment and a resource calendar
    /// check at t=0.
    pub fn new(
        config: SimulatorConfig,
        problem: Box<dyn Problem>,
        planner: Box<dyn Planner>,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        let pool = ResourcePool::new(problem.resources())?;

        let mut simulator = Self {
            config,
            problem,
            planner,
            queue: EventQueue::new(),
            cases: CaseRegistry::new(),
            pool,
            unassigned: Vec::new(),
            history: RunHistory::new(),
            event_log: EventLog::new(),
            events_dispatched: 0,
        };
        simulator.prime()?;
        Ok(simulator)
    }

    fn prime(&mut self) -> Result<(), SimulationError> {
        if let Some((time, element)) = self.problem.next_case()? {
            self.queue.schedule(time, SimEvent::CaseArrival { element })?;
        }
        let first_planning = self.problem.next_regular_planning_moment(0.0);
        self.queue
            .schedule(first_planning, SimEvent::RegularPlanningMoment)?;
        self.queue.schedule(0.0, SimEvent::ScheduleResources)?;
        Ok(())
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Run until the configured horizon and score the run.
    pub fn run(&mut self) -> Result<Evaluation, SimulationError> {
        self.run_for(self.config.horizon)
    }

    /// Run until `horizon` and score the run.
    ///
    /// May be called repeatedly with increasing horizons to continue a run.
    pub fn run_for(&mut self, horizon: SimTime) -> Result<Evaluation, SimulationError> {
        info!(
            "Running from t={} to horizon {} ({} pending events)",
            self.queue.now(),
            horizon,
            self.queue.len()
        );

        while let Some(moment) = self.queue.peek_moment() {
            if moment > horizon {
                break;
            }
            self.step()?;
        }
        self.queue.advance_to(horizon);

        let evaluation = self.evaluate();
        info!(
            "Run reached t={}: {} events dispatched, {} cases finalized, {} active, score {:.3}",
            self.queue.now(),
            self.events_dispatched,
            self.cases.finalized_count(),
            self.cases.active_count(),
            evaluation.total()
        );
        Ok(evaluation)
    }

    /// Dispatch the next event, if any; returns its kind.
    pub fn step(&mut self) -> Result<Option<EventKind>, SimulationError> {
        let Some(scheduled) = self.queue.pop_next() else {
            return Ok(None);
        };
        let kind = scheduled.kind();
        self.dispatch(scheduled)?;
        Ok(Some(kind))
    }

    /// Score the run so far
    pub fn evaluate(&self) -> Evaluation {
        let summary = RunSummary {
            now: self.queue.now(),
            cases: &self.cases,
            history: &self.history,
        };
        self.problem.evaluate(&summary)
    }

    /// Reset every piece of kernel state, restart the problem and schedule
    /// the initial events again.
    pub fn restart(&mut self) -> Result<(), SimulationError> {
        self.queue.clear();
        self.cases.clear();
        self.pool.reset();
        self.unassigned.clear();
        self.history.clear();
        self.event_log.clear();
        self.events_dispatched = 0;

        self.problem.restart();
        self.prime()
    }

    /// Cancel the most recently scheduled pending `label` of `case_id`.
    ///
    /// Returns the kind of the removed event, or `None` if nothing matched.
    pub fn cancel(
        &mut self,
        case_id: CaseId,
        label: &str,
    ) -> Result<Option<EventKind>, SimulationError> {
        let removed = self.cancel_pending(case_id, label)?;
        if removed.is_some() {
            self.close_if_idle(case_id)?;
        }
        Ok(removed)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    fn dispatch(&mut self, scheduled: ScheduledEvent) -> Result<(), SimulationError> {
        let now = scheduled.moment;
        self.events_dispatched += 1;

        match scheduled.event.element() {
            Some(element) => debug!("[t={:.3}] {} {}", now, scheduled.kind(), element),
            None => debug!("[t={:.3}] {}", now, scheduled.kind()),
        }
        if self.config.record_event_log {
            self.event_log.log(LoggedEvent::from_scheduled(&scheduled));
        }

        match scheduled.event {
            SimEvent::CaseArrival { element } => self.on_case_arrival(element, now),
            SimEvent::ActivateTask { element } => self.on_activate_task(element, now),
            SimEvent::ActivateEvent { element } => self.on_activate_event(element, now),
            SimEvent::AssignResources => self.on_assign_resources(now),
            SimEvent::StartTask { element, resource } => self.on_start_task(element, resource, now),
            SimEvent::CompleteTask { element, resource } => {
                self.on_complete_task(element, resource, now)
            }
            SimEvent::CompleteEvent { element } => self.on_complete_event(element, now),
            SimEvent::ScheduleResources => self.on_schedule_resources(now),
            SimEvent::RegularPlanningMoment => self.on_regular_planning_moment(now),
            SimEvent::PlanEvents => self.on_plan_events(now),
            SimEvent::CompleteCase { case_id } => self.on_complete_case(case_id, now),
        }
    }

    fn on_case_arrival(&mut self, element: Element, now: SimTime) -> Result<(), SimulationError> {
        let case_id = element.case_id();
        self.cases.start_case(case_id, element.case_type(), now)?;
        self.cases.merge_data(case_id, element.data())?;
        self.notify(EventKind::CaseArrival, case_id, Some(&element), None, now);
        self.activate(element)?;

        if let Some((time, next)) = self.problem.next_case()? {
            self.queue
                .schedule(time, SimEvent::CaseArrival { element: next })?;
        }
        Ok(())
    }

    fn on_activate_task(&mut self, element: Element, now: SimTime) -> Result<(), SimulationError> {
        self.notify(
            EventKind::ActivateTask,
            element.case_id(),
            Some(&element),
            None,
            now,
        );
        self.unassigned.push(element);
        self.queue.schedule(now, SimEvent::AssignResources)?;
        Ok(())
    }

    fn on_activate_event(&mut self, element: Element, now: SimTime) -> Result<(), SimulationError> {
        self.notify(
            EventKind::ActivateEvent,
            element.case_id(),
            Some(&element),
            None,
            now,
        );
        let at = element
            .occurrence_time()
            .ok_or_else(|| ElementError::MissingOccurrenceTime {
                case_id: element.case_id(),
                label: element.label().to_string(),
            })?;
        self.queue.schedule(at, SimEvent::CompleteEvent { element })?;
        Ok(())
    }

    fn on_assign_resources(&mut self, now: SimTime) -> Result<(), SimulationError> {
        if self.unassigned.is_empty() || self.pool.available_count() == 0 {
            return Ok(());
        }

        let assignments = {
            let tasks: Vec<&Element> = self.unassigned.iter().collect();
            let available: Vec<&Resource> = self.pool.available().collect();
            self.problem
                .assign_resources(&tasks, &available, &self.cases)?
        };
        validate_assignments(&assignments, &self.unassigned, &self.pool)?;

        for (task_id, resource) in assignments {
            let position = self
                .unassigned
                .iter()
                .position(|task| task.id() == task_id)
                .ok_or(AssignmentError::UnknownTask(task_id))?;
            let element = self.unassigned.remove(position);
            self.pool.acquire(&resource, task_id, now)?;
            debug!("[t={:.3}] assigned {} to {}", now, resource, element);
            self.queue
                .schedule(now, SimEvent::StartTask { element, resource })?;
        }
        Ok(())
    }

    fn on_start_task(
        &mut self,
        element: Element,
        resource: ResourceId,
        now: SimTime,
    ) -> Result<(), SimulationError> {
        self.pool.confirm_start(&resource, element.id(), now)?;
        self.notify(
            EventKind::StartTask,
            element.case_id(),
            Some(&element),
            Some(&resource),
            now,
        );
        self.problem.task_started(&element, now);
        if self.config.record_history {
            self.history.task_started(&element, &resource, now);
        }

        let duration = {
            let executing = self
                .pool
                .resource(&resource)
                .ok_or_else(|| PoolError::UnknownResource(resource.clone()))?;
            let case_data = self
                .cases
                .case_data(element.case_id())
                .ok_or(CaseError::UnknownCase(element.case_id()))?;
            self.problem
                .processing_time_sample(executing, &element, case_data, now)?
        };
        if !duration.is_finite() || duration < 0.0 {
            return Err(ProblemError::InvalidDuration {
                label: element.label().to_string(),
                duration,
            }
            .into());
        }

        self.queue
            .schedule(now + duration, SimEvent::CompleteTask { element, resource })?;
        Ok(())
    }

    fn on_complete_task(
        &mut self,
        element: Element,
        resource: ResourceId,
        now: SimTime,
    ) -> Result<(), SimulationError> {
        self.notify(
            EventKind::CompleteTask,
            element.case_id(),
            Some(&element),
            Some(&resource),
            now,
        );
        if self.config.record_history {
            self.history.close_task(element.id(), now);
        }
        if self.release_resource(&resource, now)? {
            self.queue.schedule(now, SimEvent::AssignResources)?;
        }
        self.complete_element(element, now)
    }

    fn on_complete_event(&mut self, element: Element, now: SimTime) -> Result<(), SimulationError> {
        self.notify(
            EventKind::CompleteEvent,
            element.case_id(),
            Some(&element),
            None,
            now,
        );
        if self.config.record_history {
            self.history.event_completed(&element, now);
        }
        self.complete_element(element, now)
    }

    fn on_schedule_resources(&mut self, now: SimTime) -> Result<(), SimulationError> {
        let problem = &self.problem;
        let readmitted = self
            .pool
            .reconcile(|resource| problem.resources_available(resource, now));
        if readmitted > 0 {
            debug!("[t={:.3}] {} resource(s) back on duty", now, readmitted);
            self.queue.schedule(now, SimEvent::AssignResources)?;
        }
        self.queue.schedule(
            now + self.config.resource_check_interval,
            SimEvent::ScheduleResources,
        )?;
        Ok(())
    }

    fn on_regular_planning_moment(&mut self, now: SimTime) -> Result<(), SimulationError> {
        self.queue.schedule(now, SimEvent::PlanEvents)?;

        let next = self.problem.next_regular_planning_moment(now);
        if !(next > now) {
            return Err(ProblemError::StalledPlanningMoment {
                previous: now,
                next,
            }
            .into());
        }
        self.queue.schedule(next, SimEvent::RegularPlanningMoment)?;
        Ok(())
    }

    fn on_plan_events(&mut self, now: SimTime) -> Result<(), SimulationError> {
        if self.problem.plannable().is_empty() {
            return Ok(());
        }
        let proposals = self.planner.plan(self.problem.plannable(), now);
        if proposals.is_empty() {
            return Ok(());
        }

        if let Err(err) = self.validate_proposals(&proposals, now) {
            warn!("[t={:.3}] rejected plan: {}", now, err);
            return Err(err.into());
        }

        for proposal in proposals {
            let planned = {
                let ctx = PlanContext {
                    now,
                    cases: &self.cases,
                };
                self.problem
                    .plan(proposal.case_id, &proposal.label, proposal.time, &ctx)
            };
            let elements = planned.map_err(|err| {
                warn!("[t={:.3}] rejected plan: {}", now, err);
                err
            })?;

            for element in elements {
                if !element.is_event() {
                    return Err(PlanningError::NotAnEvent {
                        case_id: element.case_id(),
                        label: element.label().to_string(),
                    }
                    .into());
                }
                self.activate(element)?;
            }
        }
        Ok(())
    }

    fn on_complete_case(&mut self, case_id: CaseId, now: SimTime) -> Result<(), SimulationError> {
        if !self.cases.is_ready_to_finalize(case_id) {
            debug!("[t={:.3}] {} reopened before closing", now, case_id);
            return Ok(());
        }
        let completed = self.cases.finalize(case_id, now)?;
        self.notify(EventKind::CompleteCase, case_id, None, None, now);
        debug!(
            "[t={:.3}] {} ({}) finalized after {:.3}",
            now,
            case_id,
            completed.case_type,
            completed.duration()
        );
        Ok(())
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Put an element in its case's busy set and schedule its activation.
    fn activate(&mut self, element: Element) -> Result<(), SimulationError> {
        let now = self.queue.now();
        if let Some(at) = element.occurrence_time() {
            if at < now {
                return Err(QueueError::EventInPast {
                    kind: EventKind::CompleteEvent,
                    moment: at,
                    now,
                }
                .into());
            }
        }

        self.cases.activate(&element)?;
        let event = if element.is_task() {
            SimEvent::ActivateTask { element }
        } else {
            SimEvent::ActivateEvent { element }
        };
        self.queue.schedule(now, event)?;
        self.queue.schedule(now, SimEvent::PlanEvents)?;
        Ok(())
    }

    /// Resolve a completed element, run the transition function and apply
    /// its effects.
    fn complete_element(&mut self, element: Element, now: SimTime) -> Result<(), SimulationError> {
        let case_id = element.case_id();
        self.cases.resolve(case_id, element.id())?;
        self.cases.merge_data(case_id, element.data())?;

        let (successors, cancellations) = {
            let mut ctx = TransitionContext::new(now, &self.pool, &self.cases);
            let successors = self.problem.complete_element(&element, &mut ctx)?;
            (successors, ctx.into_cancellations())
        };

        let mut touched = vec![case_id];
        for (cancel_case, label) in cancellations {
            if self.cancel_pending(cancel_case, &label)?.is_some() && !touched.contains(&cancel_case)
            {
                touched.push(cancel_case);
            }
        }
        for successor in successors {
            self.activate(successor)?;
        }
        for case in touched {
            self.close_if_idle(case)?;
        }
        Ok(())
    }

    fn cancel_pending(
        &mut self,
        case_id: CaseId,
        label: &str,
    ) -> Result<Option<EventKind>, SimulationError> {
        let removed = self.queue.remove_latest(|event| {
            event.is_cancellable()
                && event
                    .element()
                    .map_or(false, |element| element.matches(case_id, label))
        });
        let Some(removed) = removed else {
            return Ok(None);
        };

        let now = self.queue.now();
        if let Some(element) = removed.event.element() {
            self.cases.resolve(case_id, element.id())?;
            if self.config.record_history {
                self.history.close_task(element.id(), now);
            }
        }
        if let Some(resource) = removed.event.resource() {
            if self.release_resource(resource, now)? {
                self.queue.schedule(now, SimEvent::AssignResources)?;
            }
        }

        debug!(
            "[t={:.3}] cancelled {} of {}:{}",
            now,
            removed.kind(),
            case_id,
            label
        );
        Ok(Some(removed.kind()))
    }

    /// Release a busy resource through its availability calendar.
    fn release_resource(&mut self, id: &ResourceId, now: SimTime) -> Result<bool, SimulationError> {
        let available = {
            let resource = self
                .pool
                .resource(id)
                .ok_or_else(|| PoolError::UnknownResource(id.clone()))?;
            self.problem.resources_available(resource, now)
        };
        Ok(self.pool.release(id, available)?)
    }

    fn close_if_idle(&mut self, case_id: CaseId) -> Result<(), SimulationError> {
        if self.cases.mark_closing(case_id) {
            let now = self.queue.now();
            self.queue.schedule(now, SimEvent::CompleteCase { case_id })?;
        }
        Ok(())
    }

    /// Check a whole batch of proposals before any of them is applied.
    fn validate_proposals(
        &self,
        proposals: &[PlannedEvent],
        now: SimTime,
    ) -> Result<(), PlanningError> {
        let mut seen = HashSet::new();
        for proposal in proposals {
            let case_id = proposal.case_id;
            let label = proposal.label.clone();
            if !proposal.time.is_finite() {
                return Err(PlanningError::NonFiniteTime { case_id, label });
            }
            if proposal.time < now {
                return Err(PlanningError::InThePast {
                    case_id,
                    label,
                    time: proposal.time,
                    now,
                });
            }
            if !self.cases.is_active(case_id) {
                return Err(PlanningError::CaseNotActive(case_id));
            }
            if !self.problem.plannable().contains(case_id, &label)
                || !seen.insert((case_id, proposal.label.as_str()))
            {
                return Err(PlanningError::NotPlannable { case_id, label });
            }
        }
        Ok(())
    }

    fn notify(
        &mut self,
        kind: EventKind,
        case_id: CaseId,
        element: Option<&Element>,
        resource: Option<&ResourceId>,
        time: SimTime,
    ) {
        self.planner.report(&Report {
            kind,
            case_id,
            element,
            resource,
            time,
        });
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Current simulation time
    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn cases(&self) -> &CaseRegistry {
        &self.cases
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn history(&self) -> &RunHistory {
        &self.history
    }

    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Tasks activated but not yet assigned, in activation order
    pub fn unassigned_tasks(&self) -> &[Element] {
        &self.unassigned
    }

    pub fn problem(&self) -> &dyn Problem {
        self.problem.as_ref()
    }

    pub fn events_dispatched(&self) -> usize {
        self.events_dispatched
    }
}
