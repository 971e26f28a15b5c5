use std::sync::Arc;

use crate::{CaptureResult, Coordinator, DisplayInfo, Error, Result, ViewSelector};

/// An async-friendly capture handle.
///
/// [`Coordinator::request_capture`] blocks for up to the configured timeout,
/// so this facade runs it on tokio's blocking pool instead of stalling a
/// runtime worker. Semantics (timeout, busy rejection, failure reporting) are
/// exactly those of the wrapped coordinator.
#[derive(Debug, Clone)]
pub struct AsyncCapture {
    coordinator: Coordinator,
}

impl AsyncCapture {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    /// Capture the display, optionally switching to page `selector` first.
    pub async fn capture(&self, selector: Option<ViewSelector>) -> Result<Arc<CaptureResult>> {
        let coordinator = self.coordinator.clone();
        tokio::task::spawn_blocking(move || coordinator.request_capture(selector))
            .await
            .map_err(|e| Error::Other(format!("Capture task canceled: {}", e)))?
    }

    pub fn info(&self) -> &DisplayInfo {
        self.coordinator.info()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }
}

impl From<Coordinator> for AsyncCapture {
    fn from(coordinator: Coordinator) -> Self {
        Self::new(coordinator)
    }
}
