//! Single-owner capture handoff
//!
//! A foreign context calls [`Coordinator::request_capture`], which records a
//! request in a one-slot mailbox and blocks. The framebuffer owner calls
//! [`CaptureService::tick`] from its own loop; when a request is pending it
//! renders, encodes and publishes the result, then wakes the requester.
//!
//! Every request carries a ticket. A requester only accepts the completion
//! for its own ticket, so an owner that finishes a request after its caller
//! timed out never satisfies a later, unrelated request.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::ViewSelector;

pub mod coordinator;
pub mod owner;

pub use coordinator::Coordinator;
pub use owner::{CaptureService, OwnerHandle};

/// The product of one capture cycle.
///
/// Published behind an `Arc` and never mutated afterwards. An empty result
/// records a failed cycle together with its reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureResult {
    data: Vec<u8>,
    width: u32,
    height: u32,
    failure: Option<String>,
}

impl CaptureResult {
    pub fn image(data: Vec<u8>, width: u32, height: u32) -> Self {
        CaptureResult {
            data,
            width,
            height,
            failure: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        CaptureResult {
            data: Vec::new(),
            width: 0,
            height: 0,
            failure: Some(reason.into()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }
}

impl AsRef<[u8]> for CaptureResult {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Request {
    pub(crate) ticket: u64,
    pub(crate) selector: Option<ViewSelector>,
}

#[derive(Debug, Default)]
pub(crate) struct Slot {
    pub(crate) next_ticket: u64,
    /// Request recorded but not yet picked up by the owner.
    pub(crate) pending: Option<Request>,
    /// Ticket of the requester currently blocked, if any.
    pub(crate) waiting: Option<u64>,
    /// Ticket of the most recently serviced request.
    pub(crate) completed: u64,
    pub(crate) result: Option<Arc<CaptureResult>>,
    pub(crate) stopped: bool,
}

/// State shared between a coordinator and the owner.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl Shared {
    pub(crate) fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn ready(&self) -> &Condvar {
        &self.ready
    }

    /// Claim the pending request. Clearing the flag is the owner's first
    /// action, so a request is serviced at most once.
    pub(crate) fn take_pending(&self) -> Option<Request> {
        self.lock().pending.take()
    }

    /// Drop the slot's reference to the previous result. Requesters that
    /// still hold a clone keep it alive.
    pub(crate) fn release_result(&self) {
        self.lock().result = None;
    }

    pub(crate) fn publish(&self, ticket: u64, result: CaptureResult) {
        let mut slot = self.lock();
        slot.result = Some(Arc::new(result));
        slot.completed = ticket;
        drop(slot);
        self.ready.notify_all();
    }

    pub(crate) fn mark_stopped(&self) {
        let mut slot = self.lock();
        slot.stopped = true;
        slot.pending = None;
        drop(slot);
        self.ready.notify_all();
    }
}
