//! Resource pool
//!
//! Every resource is in exactly one of three states: available, busy on one
//! element, or away (outside its availability calendar). The arena keeps a
//! single status per record and three ordered index sets mirror it, so the
//! partition cannot drift and iteration always follows arena order.
//!
//! # Transitions
//!
//! ```text
//! Available --acquire--> Busy --release(true)--> Available
//!                         \--release(false)--> Away
//! Away --reconcile(true)--> Available --reconcile(false)--> Away
//! ```
//!
//! Busy resources are never revoked; a resource that goes off-calendar while
//! working is moved away only when it is released.

use crate::core::time::SimTime;
use crate::models::element::ElementId;
use crate::models::resource::{Resource, ResourceId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised by pool transitions
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PoolError {
    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceId),

    #[error("Duplicate resource id: {0}")]
    DuplicateResource(ResourceId),

    #[error("Resource {resource} is not available (currently {status})")]
    NotAvailable {
        resource: ResourceId,
        status: &'static str,
    },

    #[error("Resource {0} is not busy")]
    NotBusy(ResourceId),

    #[error("Resource {resource} is held by {actual}, not {expected}")]
    WrongHolder {
        resource: ResourceId,
        expected: ElementId,
        actual: ElementId,
    },
}

/// Current state of one resource
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResourceStatus {
    Available,
    Busy { element: ElementId, since: SimTime },
    Away,
}

impl ResourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceStatus::Available => "available",
            ResourceStatus::Busy { .. } => "busy",
            ResourceStatus::Away => "away",
        }
    }
}

#[derive(Debug, Clone)]
struct ResourceRecord {
    resource: Resource,
    status: ResourceStatus,
}

/// Arena of resources partitioned by status
///
/// # Example
/// ```
/// use case_sim_core::models::element::ElementId;
/// use case_sim_core::models::pool::ResourcePool;
/// use case_sim_core::models::resource::{Resource, ResourceId};
///
/// let mut pool = ResourcePool::new(vec![Resource::new("R1", "desk")]).unwrap();
/// let r1 = ResourceId::from("R1");
///
/// pool.acquire(&r1, ElementId(0), 0.0).unwrap();
/// assert_eq!(pool.holder(&r1), Some(ElementId(0)));
///
/// // Off-calendar at release: goes away instead of back to available
/// let became_available = pool.release(&r1, false).unwrap();
/// assert!(!became_available);
/// assert_eq!(pool.away_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResourcePool {
    records: Vec<ResourceRecord>,
    index: HashMap<ResourceId, usize>,
    available: BTreeSet<usize>,
    busy: BTreeSet<usize>,
    away: BTreeSet<usize>,
}

impl ResourcePool {
    /// Build a pool with every resource available.
    pub fn new(resources: Vec<Resource>) -> Result<Self, PoolError> {
        let mut pool = Self::default();
        for resource in resources {
            let slot = pool.records.len();
            if pool.index.insert(resource.id().clone(), slot).is_some() {
                return Err(PoolError::DuplicateResource(resource.id().clone()));
            }
            pool.records.push(ResourceRecord {
                resource,
                status: ResourceStatus::Available,
            });
            pool.available.insert(slot);
        }
        Ok(pool)
    }

    fn slot(&self, id: &ResourceId) -> Result<usize, PoolError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| PoolError::UnknownResource(id.clone()))
    }

    fn set_status(&mut self, slot: usize, status: ResourceStatus) {
        match self.records[slot].status {
            ResourceStatus::Available => self.available.remove(&slot),
            ResourceStatus::Busy { .. } => self.busy.remove(&slot),
            ResourceStatus::Away => self.away.remove(&slot),
        };
        match status {
            ResourceStatus::Available => self.available.insert(slot),
            ResourceStatus::Busy { .. } => self.busy.insert(slot),
            ResourceStatus::Away => self.away.insert(slot),
        };
        self.records[slot].status = status;
    }

    /// Available → busy on `element`.
    pub fn acquire(
        &mut self,
        id: &ResourceId,
        element: ElementId,
        now: SimTime,
    ) -> Result<(), PoolError> {
        let slot = self.slot(id)?;
        let status = self.records[slot].status;
        if status != ResourceStatus::Available {
            return Err(PoolError::NotAvailable {
                resource: id.clone(),
                status: status.as_str(),
            });
        }
        self.set_status(
            slot,
            ResourceStatus::Busy {
                element,
                since: now,
            },
        );
        Ok(())
    }

    /// Check that `id` is busy on `element` and stamp the start moment.
    pub fn confirm_start(
        &mut self,
        id: &ResourceId,
        element: ElementId,
        now: SimTime,
    ) -> Result<(), PoolError> {
        let slot = self.slot(id)?;
        match self.records[slot].status {
            ResourceStatus::Busy { element: actual, .. } if actual == element => {
                self.records[slot].status = ResourceStatus::Busy {
                    element,
                    since: now,
                };
                Ok(())
            }
            ResourceStatus::Busy { element: actual, .. } => Err(PoolError::WrongHolder {
                resource: id.clone(),
                expected: element,
                actual,
            }),
            _ => Err(PoolError::NotBusy(id.clone())),
        }
    }

    /// Busy → available (if `available`) or away. Returns whether the
    /// resource became available.
    pub fn release(&mut self, id: &ResourceId, available: bool) -> Result<bool, PoolError> {
        let slot = self.slot(id)?;
        if !matches!(self.records[slot].status, ResourceStatus::Busy { .. }) {
            return Err(PoolError::NotBusy(id.clone()));
        }
        let next = if available {
            ResourceStatus::Available
        } else {
            ResourceStatus::Away
        };
        self.set_status(slot, next);
        Ok(available)
    }

    /// Apply the availability calendar to idle resources.
    ///
    /// Away resources for which `is_available` holds become available,
    /// available ones for which it fails go away, busy ones are left alone.
    /// Returns the number of resources re-admitted.
    pub fn reconcile<F>(&mut self, is_available: F) -> usize
    where
        F: Fn(&Resource) -> bool,
    {
        let returning: Vec<usize> = self
            .away
            .iter()
            .copied()
            .filter(|&slot| is_available(&self.records[slot].resource))
            .collect();
        let leaving: Vec<usize> = self
            .available
            .iter()
            .copied()
            .filter(|&slot| !is_available(&self.records[slot].resource))
            .collect();

        for &slot in &returning {
            self.set_status(slot, ResourceStatus::Available);
        }
        for slot in leaving {
            self.set_status(slot, ResourceStatus::Away);
        }
        returning.len()
    }

    /// Put every resource back to available (used on restart).
    pub fn reset(&mut self) {
        for slot in 0..self.records.len() {
            self.set_status(slot, ResourceStatus::Available);
        }
    }

    pub fn resource(&self, id: &ResourceId) -> Option<&Resource> {
        self.index.get(id).map(|&slot| &self.records[slot].resource)
    }

    pub fn status(&self, id: &ResourceId) -> Option<ResourceStatus> {
        self.index.get(id).map(|&slot| self.records[slot].status)
    }

    /// Element currently occupying the resource
    pub fn holder(&self, id: &ResourceId) -> Option<ElementId> {
        match self.status(id)? {
            ResourceStatus::Busy { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn is_available(&self, id: &ResourceId) -> bool {
        self.status(id) == Some(ResourceStatus::Available)
    }

    /// Available resources in arena order
    pub fn available(&self) -> impl Iterator<Item = &Resource> {
        self.available
            .iter()
            .map(move |&slot| &self.records[slot].resource)
    }

    pub fn busy(&self) -> impl Iterator<Item = &Resource> {
        self.busy.iter().map(move |&slot| &self.records[slot].resource)
    }

    pub fn away(&self) -> impl Iterator<Item = &Resource> {
        self.away.iter().map(move |&slot| &self.records[slot].resource)
    }

    /// Available resources of one type, in arena order
    pub fn available_of_type<'a>(
        &'a self,
        resource_type: &'a str,
    ) -> impl Iterator<Item = &'a Resource> + 'a {
        self.available()
            .filter(move |resource| resource.resource_type() == resource_type)
    }

    /// Every resource in arena order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.records.iter().map(|record| &record.resource)
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn busy_count(&self) -> usize {
        self.busy.len()
    }

    pub fn away_count(&self) -> usize {
        self.away.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the index sets agree with every record's status.
    pub fn is_consistent(&self) -> bool {
        let sizes_match =
            self.available.len() + self.busy.len() + self.away.len() == self.records.len();
        sizes_match
            && self
                .records
                .iter()
                .enumerate()
                .all(|(slot, record)| match record.status {
                    ResourceStatus::Available => self.available.contains(&slot),
                    ResourceStatus::Busy { .. } => self.busy.contains(&slot),
                    ResourceStatus::Away => self.away.contains(&slot),
                })
    }
}
