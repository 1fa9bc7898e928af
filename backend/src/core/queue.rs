//! Event queue and simulation clock
//!
//! Pending events are kept in firing order under the key
//! `(moment, tiebreak, sequence)`:
//!
//! - `moment`: when the event fires
//! - `tiebreak`: 1 for `CompleteEvent`, 0 otherwise, so event completions
//!   run after everything else scheduled for the same instant
//! - `sequence`: insertion counter, FIFO among otherwise-equal entries
//!
//! The clock is the moment of the most recently popped event and never goes
//! backwards. Entries can be removed out of order for cancellation, which is
//! why the store is an ordered map rather than a binary heap.

use crate::core::time::SimTime;
use crate::models::event::{EventKind, ScheduledEvent, SimEvent};
use log::trace;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by queue insertion
#[derive(Debug, Error, Clone, PartialEq)]
pub enum QueueError {
    #[error("Cannot schedule {kind} at {moment}: clock is already at {now}")]
    EventInPast {
        kind: EventKind,
        moment: SimTime,
        now: SimTime,
    },

    #[error("Cannot schedule {kind} at non-finite moment {moment}")]
    NonFiniteMoment { kind: EventKind, moment: SimTime },
}

#[derive(Debug, Clone, Copy)]
struct QueueKey {
    moment: SimTime,
    tiebreak: u8,
    sequence: u64,
}

impl PartialEq for QueueKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueueKey {}

impl PartialOrd for QueueKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.moment
            .total_cmp(&other.moment)
            .then(self.tiebreak.cmp(&other.tiebreak))
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Time-ordered queue of pending events, owning the simulation clock
///
/// # Example
/// ```
/// use case_sim_core::core::queue::EventQueue;
/// use case_sim_core::models::event::SimEvent;
///
/// let mut queue = EventQueue::new();
/// queue.schedule(5.0, SimEvent::PlanEvents).unwrap();
/// queue.schedule(1.0, SimEvent::AssignResources).unwrap();
///
/// let first = queue.pop_next().unwrap();
/// assert_eq!(first.moment, 1.0);
/// assert_eq!(queue.now(), 1.0);
///
/// // The clock never goes back
/// assert!(queue.schedule(0.5, SimEvent::PlanEvents).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: BTreeMap<QueueKey, SimEvent>,
    next_sequence: u64,
    now: SimTime,
}

impl EventQueue {
    /// Create an empty queue with the clock at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation time
    pub fn now(&self) -> SimTime {
        self.now
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Insert an event; returns its insertion sequence number.
    pub fn schedule(&mut self, moment: SimTime, event: SimEvent) -> Result<u64, QueueError> {
        let kind = event.kind();
        if !moment.is_finite() {
            return Err(QueueError::NonFiniteMoment { kind, moment });
        }
        if moment < self.now {
            return Err(QueueError::EventInPast {
                kind,
                moment,
                now: self.now,
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;
        trace!("schedule {} at {} (seq {})", kind, moment, sequence);

        let key = QueueKey {
            moment,
            tiebreak: kind.tiebreak(),
            sequence,
        };
        self.events.insert(key, event);
        Ok(sequence)
    }

    /// Remove the earliest event and advance the clock to its moment.
    pub fn pop_next(&mut self) -> Option<ScheduledEvent> {
        let (key, event) = self.events.pop_first()?;
        debug_assert!(
            key.moment >= self.now,
            "event at {} popped with clock at {}",
            key.moment,
            self.now
        );
        self.now = key.moment;
        Some(ScheduledEvent {
            moment: key.moment,
            sequence: key.sequence,
            event,
        })
    }

    /// Moment of the next event without removing it.
    pub fn peek_moment(&self) -> Option<SimTime> {
        self.events.keys().next().map(|key| key.moment)
    }

    /// Move the clock forward to `moment`; earlier moments are ignored.
    pub fn advance_to(&mut self, moment: SimTime) {
        if moment.is_finite() && moment > self.now {
            self.now = moment;
        }
    }

    /// Remove the most recently scheduled pending event matching `predicate`.
    pub fn remove_latest<F>(&mut self, predicate: F) -> Option<ScheduledEvent>
    where
        F: Fn(&SimEvent) -> bool,
    {
        let key = self
            .events
            .iter()
            .filter(|(_, event)| predicate(event))
            .map(|(key, _)| *key)
            .max_by_key(|key| key.sequence)?;

        let event = self.events.remove(&key)?;
        trace!("removed {} at {} (seq {})", event.kind(), key.moment, key.sequence);
        Some(ScheduledEvent {
            moment: key.moment,
            sequence: key.sequence,
            event,
        })
    }

    /// Pending events in firing order, as `(moment, event)`.
    pub fn iter(&self) -> impl Iterator<Item = (SimTime, &SimEvent)> {
        self.events.iter().map(|(key, event)| (key.moment, event))
    }

    /// Drop every pending event and reset the clock to zero.
    pub fn clear(&mut self) {
        self.events.clear();
        self.next_sequence = 0;
        self.now = 0.0;
    }
}
