use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::capture::{CaptureResult, Coordinator, Shared};
use crate::platform::{DisplayBackend, PageMode, StateCell};
use crate::rendering::raster::RasterEncoder;
use crate::{CaptureConfig, DisplayInfo, Error, Result, ViewSelector};

/// What a capture cycle changed and must put back.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SavedView<P> {
    Unchanged,
    NativePage(Option<P>),
    GlobalPage(i32),
}

/// The framebuffer owner's side of the capture handoff.
///
/// Owns the display backend. Call [`tick`](Self::tick) from the loop that
/// already drives the display, or hand the whole service to a dedicated
/// thread with [`spawn`](Self::spawn).
pub struct CaptureService<B: DisplayBackend> {
    backend: B,
    mode: PageMode<B::Page>,
    sleep: Option<Arc<dyn StateCell<bool>>>,
    encoder: RasterEncoder,
    page_count: Option<usize>,
    tick_interval: Duration,
    shared: Arc<Shared>,
    coordinator: Coordinator,
}

impl<B: DisplayBackend> CaptureService<B> {
    pub fn new(backend: B, mode: PageMode<B::Page>, config: CaptureConfig) -> Result<Self> {
        config.validate()?;

        let page_count = mode.page_count(&config.page_names);
        let (width, height) = backend.displayed_size();
        let info = DisplayInfo {
            width,
            height,
            pages: page_count,
            mode: mode.name().to_string(),
            page_names: config.page_names.clone(),
        };

        match page_count {
            Some(pages) => info!(
                "Display capture ready (mode: {}, pages: {})",
                mode.name(),
                pages
            ),
            None => info!("Display capture ready (mode: {}, pages: unknown)", mode.name()),
        }

        let shared = Arc::new(Shared::default());
        let coordinator = Coordinator::new(
            shared.clone(),
            Duration::from_millis(config.timeout_ms),
            info,
        );

        Ok(CaptureService {
            backend,
            mode,
            sleep: None,
            encoder: RasterEncoder::with_budget(config.max_image_bytes),
            page_count,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            shared,
            coordinator,
        })
    }

    /// Wake the display through `cell` for the duration of each capture.
    pub fn with_sleep_cell(mut self, cell: Arc<dyn StateCell<bool>>) -> Self {
        self.sleep = Some(cell);
        self
    }

    pub fn coordinator(&self) -> Coordinator {
        self.coordinator.clone()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Service the pending request, if any. Returns whether one was serviced.
    ///
    /// The whole cycle runs to completion before returning and always ends by
    /// publishing a result, so a waiting requester is never left blocked.
    pub fn tick(&mut self) -> bool {
        let Some(request) = self.shared.take_pending() else {
            return false;
        };
        debug!("Servicing capture ticket {}", request.ticket);

        let result = self.capture_cycle(request.selector);
        self.shared.publish(request.ticket, result);
        true
    }

    fn capture_cycle(&mut self, selector: Option<ViewSelector>) -> CaptureResult {
        let was_sleeping = self.wake();
        let saved = self.switch_view(selector);
        let switched = saved != SavedView::Unchanged;

        self.backend.render();
        let result = self.encode_frame();

        self.restore_view(saved);
        if was_sleeping {
            if let Some(cell) = &self.sleep {
                cell.set(true);
            }
        }

        // The capture left the alternate page in the framebuffer; draw the
        // restored state so the panel shows what it showed before.
        if switched || was_sleeping {
            self.backend.render();
        }

        result
    }

    fn wake(&self) -> bool {
        match &self.sleep {
            Some(cell) if cell.get() => {
                debug!("Waking display for capture");
                cell.set(false);
                true
            }
            _ => false,
        }
    }

    fn switch_view(&mut self, selector: Option<ViewSelector>) -> SavedView<B::Page> {
        let Some(index) = selector else {
            return SavedView::Unchanged;
        };
        if self.page_count.is_some_and(|count| index >= count) {
            warn!(
                "Ignoring page {} (only {} pages); capturing the active page",
                index,
                self.page_count.unwrap_or_default()
            );
            return SavedView::Unchanged;
        }

        match &self.mode {
            PageMode::Single => SavedView::Unchanged,
            PageMode::NativePages(pages) => {
                let target = pages[index].clone();
                let saved = self.backend.active_page();
                self.backend.show_page(Some(target));
                SavedView::NativePage(saved)
            }
            PageMode::GlobalPage(cell) => {
                let Ok(target) = i32::try_from(index) else {
                    warn!("Ignoring page {}: out of range for a page global", index);
                    return SavedView::Unchanged;
                };
                let current = cell.get();
                if current == target {
                    return SavedView::Unchanged;
                }
                cell.set(target);
                SavedView::GlobalPage(current)
            }
        }
    }

    fn restore_view(&mut self, saved: SavedView<B::Page>) {
        match (saved, &self.mode) {
            (SavedView::Unchanged, _) => {}
            (SavedView::NativePage(page), _) => self.backend.show_page(page),
            (SavedView::GlobalPage(value), PageMode::GlobalPage(cell)) => cell.set(value),
            (SavedView::GlobalPage(_), _) => {}
        }
    }

    fn encode_frame(&mut self) -> CaptureResult {
        // The previous image is only released now: a requester may have been
        // streaming it until this cycle started.
        self.shared.release_result();

        let view = match self.backend.framebuffer() {
            Ok(view) => view,
            Err(e) => {
                error!("{}", e);
                return CaptureResult::failed(e.to_string());
            }
        };
        let (width, height) = (view.displayed_width(), view.displayed_height());

        match self.encoder.encode(&view) {
            Ok(data) => {
                info!("Generated {}x{} BMP ({} bytes)", width, height, data.len());
                CaptureResult::image(data, width, height)
            }
            Err(e) => {
                error!("{}", e);
                CaptureResult::failed(e.to_string())
            }
        }
    }
}

impl<B> CaptureService<B>
where
    B: DisplayBackend + Send + 'static,
    B::Page: Send,
{
    /// Move the service onto a dedicated owner thread that ticks at the
    /// configured interval until the returned handle is shut down.
    pub fn spawn(mut self) -> Result<OwnerHandle> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let interval = self.tick_interval;

        let thread = thread::Builder::new()
            .name("capture-owner".into())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    self.tick();
                    thread::sleep(interval);
                }
            })?;

        Ok(OwnerHandle {
            stop,
            thread: Some(thread),
        })
    }
}

impl<B: DisplayBackend> Drop for CaptureService<B> {
    fn drop(&mut self) {
        self.shared.mark_stopped();
    }
}

/// Handle to an owner thread started with [`CaptureService::spawn`].
pub struct OwnerHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl OwnerHandle {
    /// Stop ticking and wait for the owner thread to exit.
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| Error::Other("capture owner thread panicked".into())),
            None => Ok(()),
        }
    }
}

impl Drop for OwnerHandle {
    fn drop(&mut self) {
        let _ = self.stop_and_join();
    }
}
