//! Output sinks for tracker emissions
//!
//! The tracker never talks to an analytics backend directly. It appends each
//! payload to an [`EventSink`]; the host supplies the queue.

use crate::error::TrackerError;
use crate::types::DataLayerEvent;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Append-only destination for queue payloads
pub trait EventSink {
    fn push(&mut self, event: DataLayerEvent) -> Result<(), TrackerError>;
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn push(&mut self, event: DataLayerEvent) -> Result<(), TrackerError> {
        (**self).push(event)
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn push(&mut self, event: DataLayerEvent) -> Result<(), TrackerError> {
        (**self).push(event)
    }
}

/// How a tracker obtains the host's event queue at activation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Assume the host defined the queue; pushes fail if it did not
    RequireExisting,
    /// Create an empty queue when the host did not define one
    CreateIfMissing,
}

/// Shared handle to the page's append-only event queue.
///
/// Clones share the same list. Callbacks run one at a time on the host's
/// event loop, so interior mutability without locking is sufficient.
#[derive(Debug, Clone, Default)]
pub struct DataLayer {
    entries: Rc<RefCell<Vec<DataLayerEvent>>>,
}

impl DataLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Copy of all entries pushed so far
    pub fn entries(&self) -> Vec<DataLayerEvent> {
        self.entries.borrow().clone()
    }

    /// Remove and return all entries, as a collector forwarding them would
    pub fn drain(&self) -> Vec<DataLayerEvent> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

impl EventSink for DataLayer {
    fn push(&mut self, event: DataLayerEvent) -> Result<(), TrackerError> {
        self.entries.borrow_mut().push(event);
        Ok(())
    }
}

/// The queue as seen from the tracker: possibly absent
#[derive(Debug, Clone)]
pub struct HostQueue {
    queue: Option<DataLayer>,
}

impl HostQueue {
    /// Apply `policy` to whatever queue the host defined
    pub fn resolve(existing: Option<DataLayer>, policy: QueuePolicy) -> Self {
        let queue = match (existing, policy) {
            (Some(queue), _) => Some(queue),
            (None, QueuePolicy::CreateIfMissing) => Some(DataLayer::new()),
            (None, QueuePolicy::RequireExisting) => None,
        };
        Self { queue }
    }

    pub fn queue(&self) -> Option<&DataLayer> {
        self.queue.as_ref()
    }
}

impl EventSink for HostQueue {
    fn push(&mut self, event: DataLayerEvent) -> Result<(), TrackerError> {
        match self.queue.as_mut() {
            Some(queue) => queue.push(event),
            None => Err(TrackerError::QueueUnavailable),
        }
    }
}

/// Test double that records every pushed payload
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    events: Vec<DataLayerEvent>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every push fails as an undefined queue would
    pub fn failing() -> Self {
        Self {
            events: Vec::new(),
            fail: true,
        }
    }

    pub fn events(&self) -> &[DataLayerEvent] {
        &self.events
    }

    /// `eventAction` of every recorded payload, in push order
    pub fn actions(&self) -> Vec<&str> {
        self.events.iter().map(|e| e.event_action.as_str()).collect()
    }
}

impl EventSink for RecordingSink {
    fn push(&mut self, event: DataLayerEvent) -> Result<(), TrackerError> {
        if self.fail {
            return Err(TrackerError::QueueUnavailable);
        }
        self.events.push(event);
        Ok(())
    }
}
