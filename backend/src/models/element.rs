//! Elements: the tasks and events that make up a case
//!
//! An element is either a TASK (needs a resource and takes a sampled
//! duration) or an EVENT (happens at a fixed occurrence time, no resource).
//! The kind and the presence of an occurrence time are checked together at
//! construction, so an event without a time cannot exist.

use crate::core::time::SimTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Free-form attributes attached to elements and accumulated on cases.
pub type DataBag = BTreeMap<String, serde_json::Value>;

/// Unique element identifier (unique across a run)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Unique case identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CaseId(pub u64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "case{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Task,
    Event,
}

/// Errors raised when constructing an element
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ElementError {
    #[error("Event '{label}' of {case_id} has no occurrence time")]
    MissingOccurrenceTime { case_id: CaseId, label: String },

    #[error("Task '{label}' of {case_id} must not carry an occurrence time")]
    UnexpectedOccurrenceTime { case_id: CaseId, label: String },

    #[error("Element '{label}' of {case_id} has non-finite occurrence time {time}")]
    NonFiniteOccurrenceTime {
        case_id: CaseId,
        label: String,
        time: SimTime,
    },

    #[error("Element label must not be empty ({case_id})")]
    EmptyLabel { case_id: CaseId },
}

/// A task or event belonging to one case
///
/// # Example
/// ```
/// use case_sim_core::models::element::{CaseId, Element, ElementId, ElementKind};
///
/// let intake = Element::task(ElementId(1), CaseId(7), "A", "intake").unwrap();
/// assert_eq!(intake.kind(), ElementKind::Task);
/// assert_eq!(intake.occurrence_time(), None);
///
/// let left = Element::event(ElementId(2), CaseId(7), "A", "patient_left", 168.0).unwrap();
/// assert_eq!(left.occurrence_time(), Some(168.0));
///
/// // An event without a time is rejected
/// assert!(Element::new(ElementId(3), CaseId(7), "A", "x", ElementKind::Event, None).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    id: ElementId,
    case_id: CaseId,
    case_type: String,
    label: String,
    kind: ElementKind,
    #[serde(default)]
    data: DataBag,
    occurrence_time: Option<SimTime>,
}

impl Element {
    /// Create an element, checking kind against occurrence time.
    pub fn new(
        id: ElementId,
        case_id: CaseId,
        case_type: impl Into<String>,
        label: impl Into<String>,
        kind: ElementKind,
        occurrence_time: Option<SimTime>,
    ) -> Result<Self, ElementError> {
        let label = label.into();
        if label.is_empty() {
            return Err(ElementError::EmptyLabel { case_id });
        }
        match (kind, occurrence_time) {
            (ElementKind::Event, None) => {
                return Err(ElementError::MissingOccurrenceTime { case_id, label })
            }
            (ElementKind::Task, Some(_)) => {
                return Err(ElementError::UnexpectedOccurrenceTime { case_id, label })
            }
            (ElementKind::Event, Some(time)) if !time.is_finite() => {
                return Err(ElementError::NonFiniteOccurrenceTime {
                    case_id,
                    label,
                    time,
                })
            }
            _ => {}
        }

        Ok(Self {
            id,
            case_id,
            case_type: case_type.into(),
            label,
            kind,
            data: DataBag::new(),
            occurrence_time,
        })
    }

    /// Create a task element.
    pub fn task(
        id: ElementId,
        case_id: CaseId,
        case_type: impl Into<String>,
        label: impl Into<String>,
    ) -> Result<Self, ElementError> {
        Self::new(id, case_id, case_type, label, ElementKind::Task, None)
    }

    /// Create an event element occurring at `at`.
    pub fn event(
        id: ElementId,
        case_id: CaseId,
        case_type: impl Into<String>,
        label: impl Into<String>,
        at: SimTime,
    ) -> Result<Self, ElementError> {
        Self::new(id, case_id, case_type, label, ElementKind::Event, Some(at))
    }

    /// Attach a data bag, replacing any previous one.
    pub fn with_data(mut self, data: DataBag) -> Self {
        self.data = data;
        self
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn case_id(&self) -> CaseId {
        self.case_id
    }

    pub fn case_type(&self) -> &str {
        &self.case_type
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn is_task(&self) -> bool {
        self.kind == ElementKind::Task
    }

    pub fn is_event(&self) -> bool {
        self.kind == ElementKind::Event
    }

    pub fn data(&self) -> &DataBag {
        &self.data
    }

    /// Occurrence time; always `Some` for events and `None` for tasks.
    pub fn occurrence_time(&self) -> Option<SimTime> {
        self.occurrence_time
    }

    /// Whether this element is `label` of `case_id`.
    pub fn matches(&self, case_id: CaseId, label: &str) -> bool {
        self.case_id == case_id && self.label == label
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}({})", self.case_id, self.label, self.id)
    }
}

/// Sequential id source for elements and cases.
///
/// Problems own one of these; ids are never reused within a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdSequence {
    next_element: u64,
    next_case: u64,
}

impl IdSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_element_id(&mut self) -> ElementId {
        let id = ElementId(self.next_element);
        self.next_element += 1;
        id
    }

    pub fn next_case_id(&mut self) -> CaseId {
        let id = CaseId(self.next_case);
        self.next_case += 1;
        id
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
