//! External collaborators of the capture core
//!
//! The capture service drives a [`DisplayBackend`] it owns exclusively and,
//! depending on configuration, a couple of shared [`StateCell`]s that the rest
//! of the application also reads (which page to draw, whether the display is
//! asleep). Nothing here knows about transports.

use std::fmt;
use std::sync::Arc;

use crate::rendering::{FramebufferView, Rotation};
use crate::Result;

pub mod memory;

pub use memory::{BackendCall, CallLog, Canvas, MemoryCell, MemoryDisplay, PageId};

/// The rendering backend that owns the framebuffer.
///
/// Only the capture owner calls these methods, always from the owner's own
/// execution context.
pub trait DisplayBackend {
    /// Handle identifying one of the backend's native pages.
    type Page: Clone + PartialEq + fmt::Debug;

    /// Run a synchronous draw pass of the active page into the framebuffer.
    fn render(&mut self);

    fn native_width(&self) -> u32;

    fn native_height(&self) -> u32;

    fn rotation(&self) -> Rotation;

    /// Size of what is shown on screen, after rotation.
    fn displayed_size(&self) -> (u32, u32) {
        self.rotation()
            .displayed_size(self.native_width(), self.native_height())
    }

    /// Read-only access to the raw pixel memory.
    fn framebuffer(&self) -> Result<FramebufferView<'_>>;

    fn active_page(&self) -> Option<Self::Page>;

    fn show_page(&mut self, page: Option<Self::Page>);
}

/// A value shared between the capture owner and the rest of the application.
pub trait StateCell<T>: Send + Sync {
    fn get(&self) -> T;
    fn set(&self, value: T);
}

/// How the capture service finds and switches between pages.
pub enum PageMode<P> {
    /// No page switching; only the current screen can be captured.
    Single,
    /// Pages are backend handles activated through [`DisplayBackend::show_page`].
    NativePages(Vec<P>),
    /// The active page is an integer the application's draw code reads.
    GlobalPage(Arc<dyn StateCell<i32>>),
}

impl<P> PageMode<P> {
    pub fn name(&self) -> &'static str {
        match self {
            PageMode::Single => "single",
            PageMode::NativePages(_) => "native_pages",
            PageMode::GlobalPage(_) => "global_pages",
        }
    }

    /// Number of pages, if known. Global-page mode only knows its count from
    /// configured page names.
    pub fn page_count(&self, page_names: &[String]) -> Option<usize> {
        match self {
            PageMode::Single => Some(1),
            PageMode::NativePages(pages) => Some(pages.len()),
            PageMode::GlobalPage(_) if page_names.is_empty() => None,
            PageMode::GlobalPage(_) => Some(page_names.len()),
        }
    }
}

impl<P: fmt::Debug> fmt::Debug for PageMode<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageMode::Single => f.write_str("Single"),
            PageMode::NativePages(pages) => f.debug_tuple("NativePages").field(pages).finish(),
            PageMode::GlobalPage(cell) => f.debug_tuple("GlobalPage").field(&cell.get()).finish(),
        }
    }
}
