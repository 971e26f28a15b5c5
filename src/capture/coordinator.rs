use std::sync::{Arc, PoisonError};
use std::time::Duration;

use log::{debug, warn};

use crate::capture::{CaptureResult, Request, Shared};
use crate::{DisplayInfo, Error, Result, ViewSelector};

/// Requester-side handle to the capture owner.
///
/// Cheap to clone and safe to share between threads. At most one capture is
/// in flight at a time: a request made while another caller is still waiting
/// fails fast with [`Error::Busy`] instead of replacing the pending selector.
#[derive(Debug, Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
    timeout: Duration,
    info: Arc<DisplayInfo>,
}

impl Coordinator {
    pub(crate) fn new(shared: Arc<Shared>, timeout: Duration, info: DisplayInfo) -> Self {
        Coordinator {
            shared,
            timeout,
            info: Arc::new(info),
        }
    }

    /// Ask the owner to capture the display and wait for the image.
    ///
    /// `selector` picks the page to capture; `None` captures whatever is
    /// currently shown. Out-of-range selectors are ignored by the owner and the
    /// active page is captured instead.
    ///
    /// The returned image stays valid for as long as the caller holds it, even
    /// after the owner has moved on to the next capture.
    pub fn request_capture(&self, selector: Option<ViewSelector>) -> Result<Arc<CaptureResult>> {
        let mut slot = self.shared.lock();
        if slot.stopped {
            return Err(Error::OwnerStopped);
        }
        if slot.waiting.is_some() {
            return Err(Error::Busy);
        }

        slot.next_ticket += 1;
        let ticket = slot.next_ticket;
        slot.pending = Some(Request { ticket, selector });
        slot.waiting = Some(ticket);
        debug!("Capture requested (ticket {}, page {:?})", ticket, selector);

        let (mut slot, _) = self
            .shared
            .ready()
            .wait_timeout_while(slot, self.timeout, |s| s.completed < ticket && !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);
        slot.waiting = None;

        if slot.completed >= ticket {
            let result = slot
                .result
                .clone()
                .ok_or_else(|| Error::CaptureFailed("no image was published".into()))?;
            if result.is_empty() {
                let reason = result.failure().unwrap_or("empty image").to_string();
                return Err(Error::CaptureFailed(reason));
            }
            return Ok(result);
        }

        // Abandon the request so a late owner tick does not service it.
        if slot.pending.is_some_and(|r| r.ticket == ticket) {
            slot.pending = None;
        }
        if slot.stopped {
            return Err(Error::OwnerStopped);
        }
        let ms = self.timeout.as_millis() as u64;
        warn!("Screenshot capture timed out after {}ms (ticket {})", ms, ticket);
        Err(Error::Timeout(ms))
    }

    /// Number of pages, or `None` when the mode cannot know it.
    pub fn page_count(&self) -> Option<usize> {
        self.info.pages
    }

    /// Setup-time metadata about the display; reads no shared mutable state.
    pub fn info(&self) -> &DisplayInfo {
        &self.info
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a request is recorded and not yet picked up by the owner.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    /// The most recently published result, if it has not been released yet.
    pub fn last_result(&self) -> Option<Arc<CaptureResult>> {
        self.shared.lock().result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    fn coordinator(timeout_ms: u64) -> (Arc<Shared>, Coordinator) {
        let shared = Arc::new(Shared::default());
        let info = DisplayInfo {
            width: 4,
            height: 4,
            pages: Some(1),
            mode: "single".into(),
            page_names: Vec::new(),
        };
        let c = Coordinator::new(shared.clone(), Duration::from_millis(timeout_ms), info);
        (shared, c)
    }

    /// Minimal owner: service one request as soon as it shows up.
    fn serve_once(shared: Arc<Shared>, result: CaptureResult) -> thread::JoinHandle<()> {
        thread::spawn(move || loop {
            if let Some(req) = shared.take_pending() {
                shared.publish(req.ticket, result);
                return;
            }
            thread::sleep(Duration::from_millis(1));
        })
    }

    #[test]
    fn returns_published_image() {
        let (shared, c) = coordinator(2000);
        let owner = serve_once(shared, CaptureResult::image(vec![7; 60], 2, 2));
        let img = c.request_capture(Some(0)).unwrap();
        assert_eq!(img.len(), 60);
        owner.join().unwrap();
        assert!(!c.is_pending());
    }

    #[test]
    fn empty_result_is_a_capture_failure() {
        let (shared, c) = coordinator(2000);
        let owner = serve_once(shared, CaptureResult::failed("Failed to allocate 230454 bytes for BMP"));
        let err = c.request_capture(None).unwrap_err();
        assert_eq!(
            err,
            Error::CaptureFailed("Failed to allocate 230454 bytes for BMP".into())
        );
        owner.join().unwrap();
    }

    #[test]
    fn timeout_clears_pending_flag() {
        let (_shared, c) = coordinator(50);
        let start = Instant::now();
        assert_eq!(c.request_capture(None), Err(Error::Timeout(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!c.is_pending());
    }

    #[test]
    fn late_completion_does_not_satisfy_next_request() {
        let (shared, c) = coordinator(50);
        assert_eq!(c.request_capture(None), Err(Error::Timeout(50)));

        // The owner finishes the abandoned ticket after its caller left.
        shared.publish(1, CaptureResult::image(vec![1; 54], 0, 0));

        let start = Instant::now();
        assert_eq!(c.request_capture(None), Err(Error::Timeout(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn second_caller_is_rejected_while_one_waits() {
        let (shared, c) = coordinator(2000);
        let first = {
            let c = c.clone();
            thread::spawn(move || c.request_capture(None))
        };
        while !c.is_pending() {
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(c.request_capture(Some(1)), Err(Error::Busy));

        let req = shared.take_pending().unwrap();
        assert_eq!(req.selector, None);
        shared.publish(req.ticket, CaptureResult::image(vec![0; 54], 0, 0));
        assert!(first.join().unwrap().is_ok());
    }

    #[test]
    fn stopped_owner_fails_fast() {
        let (shared, c) = coordinator(5000);
        let waiter = {
            let c = c.clone();
            thread::spawn(move || c.request_capture(None))
        };
        while !c.is_pending() {
            thread::sleep(Duration::from_millis(1));
        }
        shared.mark_stopped();
        assert_eq!(waiter.join().unwrap(), Err(Error::OwnerStopped));
        assert_eq!(c.request_capture(None), Err(Error::OwnerStopped));
    }
}
