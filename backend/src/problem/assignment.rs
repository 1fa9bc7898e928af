//! Task-to-resource assignment
//!
//! The default policy serves the prioritized class first, then the base
//! class on whatever resources are left. Within a class, tasks are taken in
//! activation order and each one gets the first available resource (arena
//! order) that appears in its eligible pool. No randomness is involved.
//!
//! Whatever policy a problem uses, the kernel checks the result with
//! [`validate_assignments`] before acting on it.

use crate::models::element::{Element, ElementId};
use crate::models::pool::ResourcePool;
use crate::models::resource::{Resource, ResourceId};
use crate::problem::ProblemError;
use std::collections::HashSet;
use thiserror::Error;

/// An assignment list the kernel refuses to apply
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AssignmentError {
    #[error("Assigned task {0} is not waiting for a resource")]
    UnknownTask(ElementId),

    #[error("Task {0} assigned more than once")]
    DuplicateTask(ElementId),

    #[error("Assigned resource {0} is not available")]
    ResourceNotAvailable(ResourceId),

    #[error("Resource {0} assigned more than once")]
    DuplicateResource(ResourceId),
}

/// Priority-then-base greedy assignment.
///
/// # Example
/// ```
/// use case_sim_core::models::element::{CaseId, Element, ElementId};
/// use case_sim_core::models::resource::{Resource, ResourceId};
/// use case_sim_core::problem::assign_by_priority;
///
/// let routine = Element::task(ElementId(0), CaseId(0), "A", "treat").unwrap();
/// let urgent = Element::task(ElementId(1), CaseId(1), "EM", "treat").unwrap();
/// let doctor = Resource::new("DOC1", "DOC");
///
/// let pairs = assign_by_priority(
///     &[&routine, &urgent],
///     &[&doctor],
///     |_| Ok(vec![ResourceId::from("DOC1")]),
///     |task| task.case_type() == "EM",
/// )
/// .unwrap();
/// assert_eq!(pairs, vec![(ElementId(1), ResourceId::from("DOC1"))]);
/// ```
pub fn assign_by_priority<P, Q>(
    unassigned: &[&Element],
    available: &[&Resource],
    pool_of: P,
    is_prioritized: Q,
) -> Result<Vec<(ElementId, ResourceId)>, ProblemError>
where
    P: Fn(&Element) -> Result<Vec<ResourceId>, ProblemError>,
    Q: Fn(&Element) -> bool,
{
    let mut remaining: Vec<&Resource> = available.to_vec();
    let mut assignments = Vec::new();

    for prioritized_class in [true, false] {
        for task in unassigned
            .iter()
            .copied()
            .filter(|task| is_prioritized(task) == prioritized_class)
        {
            if remaining.is_empty() {
                return Ok(assignments);
            }
            let eligible = pool_of(task)?;
            if let Some(position) = remaining
                .iter()
                .position(|resource| eligible.contains(resource.id()))
            {
                let resource = remaining.remove(position);
                assignments.push((task.id(), resource.id().clone()));
            }
        }
    }
    Ok(assignments)
}

/// Reject lists that reuse a task or resource, or name one that is not
/// waiting / not available.
pub fn validate_assignments(
    assignments: &[(ElementId, ResourceId)],
    unassigned: &[Element],
    pool: &ResourcePool,
) -> Result<(), AssignmentError> {
    let mut tasks = HashSet::new();
    let mut resources = HashSet::new();

    for (task, resource) in assignments {
        if !unassigned.iter().any(|e| e.id() == *task) {
            return Err(AssignmentError::UnknownTask(*task));
        }
        if !tasks.insert(*task) {
            return Err(AssignmentError::DuplicateTask(*task));
        }
        if !pool.is_available(resource) {
            return Err(AssignmentError::ResourceNotAvailable(resource.clone()));
        }
        if !resources.insert(resource.clone()) {
            return Err(AssignmentError::DuplicateResource(resource.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::element::CaseId;

    fn task(id: u64, case_type: &str, label: &str) -> Element {
        Element::task(ElementId(id), CaseId(id), case_type, label).unwrap()
    }

    fn pool_by_label(element: &Element) -> Result<Vec<ResourceId>, ProblemError> {
        match element.label() {
            "surgery" => Ok(vec!["OR1".into(), "OR2".into()]),
            "nursing" => Ok(vec!["BED1".into()]),
            other => Err(ProblemError::UnknownLabel(other.to_string())),
        }
    }

    #[test]
    fn test_each_resource_used_once() {
        let tasks = [task(0, "A", "surgery"), task(1, "A", "surgery"), task(2, "A", "surgery")];
        let refs: Vec<&Element> = tasks.iter().collect();
        let or1 = Resource::new("OR1", "OR");
        let or2 = Resource::new("OR2", "OR");

        let pairs = assign_by_priority(&refs, &[&or1, &or2], pool_by_label, |_| false).unwrap();
        assert_eq!(
            pairs,
            vec![
                (ElementId(0), ResourceId::from("OR1")),
                (ElementId(1), ResourceId::from("OR2")),
            ]
        );
    }

    #[test]
    fn test_ineligible_resources_skipped() {
        let tasks = [task(0, "A", "nursing"), task(1, "A", "surgery")];
        let refs: Vec<&Element> = tasks.iter().collect();
        let or1 = Resource::new("OR1", "OR");

        let pairs = assign_by_priority(&refs, &[&or1], pool_by_label, |_| false).unwrap();
        assert_eq!(pairs, vec![(ElementId(1), ResourceId::from("OR1"))]);
    }

    #[test]
    fn test_pool_error_propagates() {
        let tasks = [task(0, "A", "dancing")];
        let refs: Vec<&Element> = tasks.iter().collect();
        let or1 = Resource::new("OR1", "OR");

        let result = assign_by_priority(&refs, &[&or1], pool_by_label, |_| false);
        assert_eq!(result, Err(ProblemError::UnknownLabel("dancing".into())));
    }

    #[test]
    fn test_validate_rejects_reuse() {
        let pool = ResourcePool::new(vec![Resource::new("OR1", "OR")]).unwrap();
        let waiting = vec![task(0, "A", "surgery"), task(1, "A", "surgery")];

        let reused = vec![
            (ElementId(0), ResourceId::from("OR1")),
            (ElementId(1), ResourceId::from("OR1")),
        ];
        assert_eq!(
            validate_assignments(&reused, &waiting, &pool),
            Err(AssignmentError::DuplicateResource(ResourceId::from("OR1")))
        );

        let unknown = vec![(ElementId(7), ResourceId::from("OR1"))];
        assert_eq!(
            validate_assignments(&unknown, &waiting, &pool),
            Err(AssignmentError::UnknownTask(ElementId(7)))
        );
    }
}
