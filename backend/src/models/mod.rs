//! Domain models for the case simulator

pub mod case;
pub mod element;
pub mod event;
pub mod history;
pub mod pool;
pub mod resource;

// Re-exports
pub use case::{CaseError, CaseRecord, CaseRegistry, CompletedCase};
pub use element::{CaseId, DataBag, Element, ElementError, ElementId, ElementKind, IdSequence};
pub use event::{EventKind, EventLog, LoggedEvent, ScheduledEvent, SimEvent};
pub use history::{EventCompletion, RunHistory, TaskInterval};
pub use pool::{PoolError, ResourcePool, ResourceStatus};
pub use resource::{Resource, ResourceId};
