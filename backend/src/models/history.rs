//! Run history: task intervals and event completions
//!
//! Used by scoring functions and by tests that check who worked on what and
//! when. Recording can be switched off in `SimulatorConfig` for long runs.

use crate::core::time::SimTime;
use crate::models::element::{CaseId, Element, ElementId};
use crate::models::resource::ResourceId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A resource working on a task, `[start, end)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInterval {
    pub element_id: ElementId,
    pub case_id: CaseId,
    pub label: String,
    pub resource: ResourceId,
    pub start: SimTime,
    /// `None` while the task is still running
    pub end: Option<SimTime>,
}

/// An event element that was completed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCompletion {
    pub element_id: ElementId,
    pub case_id: CaseId,
    pub label: String,
    pub time: SimTime,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunHistory {
    intervals: Vec<TaskInterval>,
    events: Vec<EventCompletion>,
    #[serde(skip)]
    open: HashMap<ElementId, usize>,
}

impl RunHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn task_started(&mut self, element: &Element, resource: &ResourceId, start: SimTime) {
        self.open.insert(element.id(), self.intervals.len());
        self.intervals.push(TaskInterval {
            element_id: element.id(),
            case_id: element.case_id(),
            label: element.label().to_string(),
            resource: resource.clone(),
            start,
            end: None,
        });
    }

    /// Close the running interval of a task (completed or cancelled).
    pub fn close_task(&mut self, element_id: ElementId, end: SimTime) {
        if let Some(index) = self.open.remove(&element_id) {
            self.intervals[index].end = Some(end);
        }
    }

    pub fn event_completed(&mut self, element: &Element, time: SimTime) {
        self.events.push(EventCompletion {
            element_id: element.id(),
            case_id: element.case_id(),
            label: element.label().to_string(),
            time,
        });
    }

    pub fn task_intervals(&self) -> &[TaskInterval] {
        &self.intervals
    }

    pub fn event_completions(&self) -> &[EventCompletion] {
        &self.events
    }

    /// Completions of events with the given label
    pub fn completions_of<'a>(
        &'a self,
        label: &'a str,
    ) -> impl Iterator<Item = &'a EventCompletion> + 'a {
        self.events.iter().filter(move |e| e.label == label)
    }

    /// Intervals worked by one resource, in start order
    pub fn intervals_for_resource<'a>(
        &'a self,
        resource: &'a ResourceId,
    ) -> impl Iterator<Item = &'a TaskInterval> + 'a {
        self.intervals.iter().filter(move |i| &i.resource == resource)
    }

    pub fn clear(&mut self) {
        self.intervals.clear();
        self.events.clear();
        self.open.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_closed_once() {
        let mut history = RunHistory::new();
        let task = Element::task(ElementId(3), CaseId(1), "A", "surgery").unwrap();
        let or1 = ResourceId::from("OR1");

        history.task_started(&task, &or1, 1.0);
        assert_eq!(history.task_intervals()[0].end, None);

        history.close_task(ElementId(3), 4.0);
        history.close_task(ElementId(3), 9.0);
        assert_eq!(history.task_intervals()[0].end, Some(4.0));
        assert_eq!(history.intervals_for_resource(&or1).count(), 1);
    }
}
