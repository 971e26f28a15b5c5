//! In-memory display backend and state cells
//!
//! `MemoryDisplay` keeps its RGB565 framebuffer in a `Vec<u8>` and draws
//! through a [`Canvas`] that applies the display rotation the same way a panel
//! driver does. Every backend call is appended to a [`CallLog`] so tests can
//! assert on the exact order of page switches and render passes.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::platform::{DisplayBackend, StateCell};
use crate::rendering::{FramebufferView, Rgb565, Rotation, BYTES_PER_PIXEL};
use crate::Result;

/// Pages of a `MemoryDisplay` are plain indices.
pub type PageId = usize;

/// Draw callback invoked on every render pass with the active page.
pub type Painter = Box<dyn FnMut(&mut Canvas<'_>, Option<PageId>) + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Render { page: Option<PageId> },
    ShowPage(Option<PageId>),
    CellWrite { cell: String, value: String },
}

/// Shared, append-only record of backend and cell activity.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<BackendCall>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: BackendCall) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn render_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, BackendCall::Render { .. }))
            .count()
    }
}

/// A `StateCell` stored behind a mutex, optionally logging writes.
pub struct MemoryCell<T> {
    name: String,
    value: Mutex<T>,
    log: Option<CallLog>,
}

impl<T> MemoryCell<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        MemoryCell {
            name: name.into(),
            value: Mutex::new(value),
            log: None,
        }
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = Some(log);
        self
    }
}

impl<T: Clone + fmt::Debug + Send> StateCell<T> for MemoryCell<T> {
    fn get(&self) -> T {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, value: T) {
        if let Some(log) = &self.log {
            log.push(BackendCall::CellWrite {
                cell: self.name.clone(),
                value: format!("{value:?}"),
            });
        }
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

/// Drawing surface in screen (displayed) coordinates.
pub struct Canvas<'a> {
    pixels: &'a mut [u8],
    native_width: u32,
    native_height: u32,
    rotation: Rotation,
}

impl Canvas<'_> {
    pub fn width(&self) -> u32 {
        self.rotation
            .displayed_size(self.native_width, self.native_height)
            .0
    }

    pub fn height(&self) -> u32 {
        self.rotation
            .displayed_size(self.native_width, self.native_height)
            .1
    }

    /// Write one pixel; coordinates outside the screen are clipped.
    pub fn draw_pixel(&mut self, x: u32, y: u32, color: Rgb565) {
        if x >= self.width() || y >= self.height() {
            return;
        }
        let (bx, by) = self
            .rotation
            .to_native(x, y, self.native_width, self.native_height);
        let pos = (by as usize * self.native_width as usize + bx as usize) * BYTES_PER_PIXEL;
        self.pixels[pos..pos + BYTES_PER_PIXEL].copy_from_slice(&color.to_bytes());
    }

    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgb565) {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for py in y..y_end {
            for px in x..x_end {
                self.draw_pixel(px, py, color);
            }
        }
    }

    pub fn fill(&mut self, color: Rgb565) {
        for chunk in self.pixels.chunks_exact_mut(BYTES_PER_PIXEL) {
            chunk.copy_from_slice(&color.to_bytes());
        }
    }
}

const PALETTE: [Rgb565; 6] = [
    Rgb565::from_channels(0, 0, 16),
    Rgb565::from_channels(0, 40, 0),
    Rgb565::from_channels(24, 0, 0),
    Rgb565::from_channels(24, 48, 0),
    Rgb565::from_channels(0, 48, 24),
    Rgb565::from_channels(24, 0, 24),
];

/// Background colour `page_pattern` uses for a page.
pub fn page_color(page: Option<PageId>) -> Rgb565 {
    match page {
        Some(id) => PALETTE[id % PALETTE.len()],
        None => Rgb565::BLACK,
    }
}

/// Default painter: page-coloured background, a white 8x8 marker in the
/// top-left corner and one white tick per page index along the top edge.
pub fn page_pattern(canvas: &mut Canvas<'_>, page: Option<PageId>) {
    canvas.fill(page_color(page));
    canvas.fill_rect(0, 0, 8, 8, Rgb565::WHITE);
    if let Some(id) = page {
        let width = canvas.width() as usize;
        for x in (12..width).step_by(6).take(id) {
            canvas.fill_rect(x as u32, 0, 4, 8, Rgb565::WHITE);
        }
    }
}

/// Display backend whose framebuffer lives on the heap.
pub struct MemoryDisplay {
    native_width: u32,
    native_height: u32,
    rotation: Rotation,
    buffer: Vec<u8>,
    active: Option<PageId>,
    painter: Painter,
    log: CallLog,
}

impl MemoryDisplay {
    /// A blank panel of the given native size drawing with [`page_pattern`].
    pub fn new(native_width: u32, native_height: u32, rotation: Rotation) -> Self {
        let len = native_width as usize * native_height as usize * BYTES_PER_PIXEL;
        MemoryDisplay {
            native_width,
            native_height,
            rotation,
            buffer: vec![0; len],
            active: None,
            painter: Box::new(page_pattern),
            log: CallLog::new(),
        }
    }

    /// A panel sized so that its displayed geometry is `width`x`height`.
    pub fn with_displayed_size(width: u32, height: u32, rotation: Rotation) -> Self {
        let (native_width, native_height) = rotation.displayed_size(width, height);
        Self::new(native_width, native_height, rotation)
    }

    pub fn with_painter<F>(mut self, painter: F) -> Self
    where
        F: FnMut(&mut Canvas<'_>, Option<PageId>) + Send + 'static,
    {
        self.painter = Box::new(painter);
        self
    }

    pub fn with_active_page(mut self, page: Option<PageId>) -> Self {
        self.active = page;
        self
    }

    pub fn with_log(mut self, log: CallLog) -> Self {
        self.log = log;
        self
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn pixels(&self) -> &[u8] {
        &self.buffer
    }
}

impl DisplayBackend for MemoryDisplay {
    type Page = PageId;

    fn render(&mut self) {
        self.log.push(BackendCall::Render { page: self.active });
        let mut canvas = Canvas {
            pixels: &mut self.buffer,
            native_width: self.native_width,
            native_height: self.native_height,
            rotation: self.rotation,
        };
        (self.painter)(&mut canvas, self.active);
    }

    fn native_width(&self) -> u32 {
        self.native_width
    }

    fn native_height(&self) -> u32 {
        self.native_height
    }

    fn rotation(&self) -> Rotation {
        self.rotation
    }

    fn framebuffer(&self) -> Result<FramebufferView<'_>> {
        FramebufferView::new(
            &self.buffer,
            self.native_width,
            self.native_height,
            self.rotation,
        )
    }

    fn active_page(&self) -> Option<PageId> {
        self.active
    }

    fn show_page(&mut self, page: Option<PageId>) {
        self.log.push(BackendCall::ShowPage(page));
        self.active = page;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canvas_draws_in_screen_coordinates() {
        for rotation in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            let mut display = MemoryDisplay::with_displayed_size(6, 4, rotation).with_painter(
                |canvas: &mut Canvas<'_>, _| {
                    canvas.fill(Rgb565::BLACK);
                    canvas.draw_pixel(5, 0, Rgb565::WHITE);
                },
            );
            display.render();

            let view = display.framebuffer().unwrap();
            assert_eq!((view.displayed_width(), view.displayed_height()), (6, 4));
            assert_eq!(view.pixel_at(5, 0), Rgb565::WHITE, "{rotation:?}");
            assert_eq!(view.pixel_at(0, 0), Rgb565::BLACK, "{rotation:?}");
        }
    }

    #[test]
    fn render_and_page_switches_are_logged() {
        let mut display = MemoryDisplay::new(4, 4, Rotation::Deg0).with_active_page(Some(0));
        display.render();
        display.show_page(Some(2));
        display.render();
        assert_eq!(
            display.log().calls(),
            vec![
                BackendCall::Render { page: Some(0) },
                BackendCall::ShowPage(Some(2)),
                BackendCall::Render { page: Some(2) },
            ]
        );
        assert_eq!(display.log().render_count(), 2);
    }

    #[test]
    fn memory_cell_logs_writes() {
        let log = CallLog::new();
        let cell = MemoryCell::new("sleep", true).with_log(log.clone());
        cell.set(false);
        assert!(!cell.get());
        assert_eq!(
            log.calls(),
            vec![BackendCall::CellWrite {
                cell: "sleep".into(),
                value: "false".into()
            }]
        );
    }

    #[test]
    fn page_pattern_clips_ticks_for_huge_page_ids() {
        let mut display =
            MemoryDisplay::new(40, 10, Rotation::Deg0).with_active_page(Some(usize::MAX));
        display.render();
        let view = display.framebuffer().unwrap();
        assert_eq!(view.pixel_at(36, 0), Rgb565::WHITE);
        assert_eq!(view.pixel_at(39, 9), page_color(Some(usize::MAX)));
    }

    #[test]
    fn page_pattern_marks_page_index() {
        let mut display = MemoryDisplay::new(40, 10, Rotation::Deg0).with_active_page(Some(2));
        display.render();
        let view = display.framebuffer().unwrap();
        assert_eq!(view.pixel_at(0, 0), Rgb565::WHITE);
        assert_eq!(view.pixel_at(9, 9), page_color(Some(2)));
        assert_eq!(view.pixel_at(12, 0), Rgb565::WHITE);
        assert_eq!(view.pixel_at(18, 0), Rgb565::WHITE);
        assert_eq!(view.pixel_at(24, 0), page_color(Some(2)));
    }
}
