//! Simulation events and the dispatched-event log
//!
//! `SimEvent` is the payload of a queue entry. Every kind carries exactly the
//! data its dispatch rule needs, so the loop never has to check for missing
//! elements or resources at runtime.
//!
//! `EventLog` records every dispatched event in dispatch order. Its digest is
//! the basis for determinism checks: two runs with the same configuration
//! and seed must produce the same digest.

use crate::core::time::SimTime;
use crate::models::element::{CaseId, Element, ElementId};
use crate::models::resource::ResourceId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Discriminant of a [`SimEvent`], used for logging and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CaseArrival,
    ActivateTask,
    ActivateEvent,
    StartTask,
    CompleteTask,
    CompleteEvent,
    ScheduleResources,
    AssignResources,
    PlanEvents,
    RegularPlanningMoment,
    CompleteCase,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::CaseArrival => "case_arrival",
            EventKind::ActivateTask => "activate_task",
            EventKind::ActivateEvent => "activate_event",
            EventKind::StartTask => "start_task",
            EventKind::CompleteTask => "complete_task",
            EventKind::CompleteEvent => "complete_event",
            EventKind::ScheduleResources => "schedule_resources",
            EventKind::AssignResources => "assign_resources",
            EventKind::PlanEvents => "plan_events",
            EventKind::RegularPlanningMoment => "regular_planning_moment",
            EventKind::CompleteCase => "complete_case",
        }
    }

    /// Secondary ordering key at equal moments: event completions fire after
    /// everything else scheduled for the same instant.
    pub fn tiebreak(self) -> u8 {
        match self {
            EventKind::CompleteEvent => 1,
            _ => 0,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of a scheduled simulation event
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// A new case arrives with its initial element
    CaseArrival { element: Element },
    ActivateTask { element: Element },
    ActivateEvent { element: Element },
    /// `resource` was acquired for `element` at assignment
    StartTask { element: Element, resource: ResourceId },
    CompleteTask { element: Element, resource: ResourceId },
    CompleteEvent { element: Element },
    ScheduleResources,
    AssignResources,
    PlanEvents,
    RegularPlanningMoment,
    CompleteCase { case_id: CaseId },
}

impl SimEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::CaseArrival { .. } => EventKind::CaseArrival,
            SimEvent::ActivateTask { .. } => EventKind::ActivateTask,
            SimEvent::ActivateEvent { .. } => EventKind::ActivateEvent,
            SimEvent::StartTask { .. } => EventKind::StartTask,
            SimEvent::CompleteTask { .. } => EventKind::CompleteTask,
            SimEvent::CompleteEvent { .. } => EventKind::CompleteEvent,
            SimEvent::ScheduleResources => EventKind::ScheduleResources,
            SimEvent::AssignResources => EventKind::AssignResources,
            SimEvent::PlanEvents => EventKind::PlanEvents,
            SimEvent::RegularPlanningMoment => EventKind::RegularPlanningMoment,
            SimEvent::CompleteCase { .. } => EventKind::CompleteCase,
        }
    }

    /// The element carried by this event, if any.
    pub fn element(&self) -> Option<&Element> {
        match self {
            SimEvent::CaseArrival { element }
            | SimEvent::ActivateTask { element }
            | SimEvent::ActivateEvent { element }
            | SimEvent::StartTask { element, .. }
            | SimEvent::CompleteTask { element, .. }
            | SimEvent::CompleteEvent { element } => Some(element),
            _ => None,
        }
    }

    /// The resource held by this event, if any.
    pub fn resource(&self) -> Option<&ResourceId> {
        match self {
            SimEvent::StartTask { resource, .. } | SimEvent::CompleteTask { resource, .. } => {
                Some(resource)
            }
            _ => None,
        }
    }

    /// The case this event concerns, if any.
    pub fn case_id(&self) -> Option<CaseId> {
        match self {
            SimEvent::CompleteCase { case_id } => Some(*case_id),
            other => other.element().map(Element::case_id),
        }
    }

    /// Whether cancelling this event would remove a pending element.
    ///
    /// Case arrivals carry an element too, but the case does not exist yet,
    /// so they are never cancellation candidates.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            SimEvent::ActivateTask { .. }
                | SimEvent::ActivateEvent { .. }
                | SimEvent::StartTask { .. }
                | SimEvent::CompleteTask { .. }
                | SimEvent::CompleteEvent { .. }
        )
    }
}

/// A queue entry: payload plus its ordering key.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub moment: SimTime,
    pub sequence: u64,
    pub event: SimEvent,
}

impl ScheduledEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

/// One dispatched event as recorded in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub moment: SimTime,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<CaseId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_id: Option<ElementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceId>,
}

impl LoggedEvent {
    pub fn from_scheduled(scheduled: &ScheduledEvent) -> Self {
        let element = scheduled.event.element();
        Self {
            moment: scheduled.moment,
            kind: scheduled.kind(),
            case_id: scheduled.event.case_id(),
            element_id: element.map(Element::id),
            label: element.map(|e| e.label().to_string()),
            resource: scheduled.event.resource().cloned(),
        }
    }
}

/// Dispatch-ordered record of every event the loop handled
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    events: Vec<LoggedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn log(&mut self, event: LoggedEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Entries in dispatch order
    pub fn events(&self) -> &[LoggedEvent] {
        &self.events
    }

    pub fn events_of_kind(&self, kind: EventKind) -> Vec<&LoggedEvent> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }

    /// Entries concerning `case_id`, including its `CompleteCase`
    pub fn events_for_case(&self, case_id: CaseId) -> Vec<&LoggedEvent> {
        self.events
            .iter()
            .filter(|e| e.case_id == Some(case_id))
            .collect()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// SHA-256 over the JSON rendering of every entry, hex encoded.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let mut hasher = Sha256::new();
        for event in &self.events {
            hasher.update(serde_json::to_vec(event)?);
            hasher.update(b"\n");
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}
