//! Framebuffer geometry and the raster encoder
//!
//! A [`FramebufferView`] is the read-only capability a display backend grants
//! to the encoder: the raw RGB565 pixel memory in native (panel) orientation
//! plus the rotation that maps it to what is shown on screen.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub mod pixel;
pub mod raster;

pub use pixel::Rgb565;

/// Bytes per pixel in the native framebuffer.
pub const BYTES_PER_PIXEL: usize = 2;

/// Display rotation, applied when pixels are written to the framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    #[serde(rename = "0")]
    Deg0,
    #[serde(rename = "90")]
    Deg90,
    #[serde(rename = "180")]
    Deg180,
    #[serde(rename = "270")]
    Deg270,
}

impl Rotation {
    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    /// Whether displayed width/height are the native height/width.
    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }

    /// Displayed (post-rotation) size for a panel of the given native size.
    pub fn displayed_size(self, native_width: u32, native_height: u32) -> (u32, u32) {
        if self.swaps_axes() {
            (native_height, native_width)
        } else {
            (native_width, native_height)
        }
    }

    /// Map a screen coordinate to the native buffer coordinate holding it.
    ///
    /// `native_width`/`native_height` are the pre-rotation panel dimensions.
    /// Callers must pass a screen coordinate inside the displayed size.
    ///
    /// | rotation | bx        | by        |
    /// |----------|-----------|-----------|
    /// | 0        | sx        | sy        |
    /// | 90       | w - 1 - sy| sx        |
    /// | 180      | w - 1 - sx| h - 1 - sy|
    /// | 270      | sy        | h - 1 - sx|
    pub fn to_native(self, sx: u32, sy: u32, native_width: u32, native_height: u32) -> (u32, u32) {
        match self {
            Rotation::Deg0 => (sx, sy),
            Rotation::Deg90 => (native_width - 1 - sy, sx),
            Rotation::Deg180 => (native_width - 1 - sx, native_height - 1 - sy),
            Rotation::Deg270 => (sy, native_height - 1 - sx),
        }
    }
}

/// Read-only view of a backend's RGB565 framebuffer.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferView<'a> {
    pixels: &'a [u8],
    native_width: u32,
    native_height: u32,
    rotation: Rotation,
}

impl<'a> FramebufferView<'a> {
    /// Wrap pixel memory laid out row-major in native orientation.
    ///
    /// Fails when `pixels` is shorter than `native_width * native_height * 2`.
    pub fn new(
        pixels: &'a [u8],
        native_width: u32,
        native_height: u32,
        rotation: Rotation,
    ) -> Result<Self> {
        let needed = native_width as usize * native_height as usize * BYTES_PER_PIXEL;
        if pixels.len() < needed {
            return Err(Error::InvalidFramebuffer(format!(
                "{}x{} panel needs {} bytes, buffer has {}",
                native_width,
                native_height,
                needed,
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            native_width,
            native_height,
            rotation,
        })
    }

    pub fn native_width(&self) -> u32 {
        self.native_width
    }

    pub fn native_height(&self) -> u32 {
        self.native_height
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn displayed_width(&self) -> u32 {
        self.rotation.displayed_size(self.native_width, self.native_height).0
    }

    pub fn displayed_height(&self) -> u32 {
        self.rotation.displayed_size(self.native_width, self.native_height).1
    }

    pub fn pixels(&self) -> &'a [u8] {
        self.pixels
    }

    /// The pixel shown at screen coordinate `(sx, sy)`.
    pub fn pixel_at(&self, sx: u32, sy: u32) -> Rgb565 {
        let (bx, by) = self
            .rotation
            .to_native(sx, sy, self.native_width, self.native_height);
        let pos = (by as usize * self.native_width as usize + bx as usize) * BYTES_PER_PIXEL;
        Rgb565::from_bytes(self.pixels[pos], self.pixels[pos + 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_degrees_round_trip() {
        for deg in [0, 90, 180, 270] {
            assert_eq!(Rotation::from_degrees(deg).map(Rotation::degrees), Some(deg));
        }
        assert_eq!(Rotation::from_degrees(45), None);
    }

    #[test]
    fn quarter_turns_swap_displayed_axes() {
        assert_eq!(Rotation::Deg0.displayed_size(240, 320), (240, 320));
        assert_eq!(Rotation::Deg90.displayed_size(240, 320), (320, 240));
        assert_eq!(Rotation::Deg180.displayed_size(240, 320), (240, 320));
        assert_eq!(Rotation::Deg270.displayed_size(240, 320), (320, 240));
    }

    #[test]
    fn to_native_maps_screen_corners() {
        // 4x2 native panel
        let (w, h) = (4, 2);
        assert_eq!(Rotation::Deg0.to_native(3, 1, w, h), (3, 1));
        // 90: displayed 2x4, screen origin is the native top-right
        assert_eq!(Rotation::Deg90.to_native(0, 0, w, h), (3, 0));
        assert_eq!(Rotation::Deg90.to_native(1, 3, w, h), (0, 1));
        assert_eq!(Rotation::Deg180.to_native(0, 0, w, h), (3, 1));
        // 270: screen origin is the native bottom-left
        assert_eq!(Rotation::Deg270.to_native(0, 0, w, h), (0, 1));
        assert_eq!(Rotation::Deg270.to_native(1, 3, w, h), (3, 0));
    }

    #[test]
    fn to_native_is_a_bijection() {
        let (w, h) = (5u32, 3u32);
        for rot in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            let (dw, dh) = rot.displayed_size(w, h);
            let mut seen = vec![false; (w * h) as usize];
            for sy in 0..dh {
                for sx in 0..dw {
                    let (bx, by) = rot.to_native(sx, sy, w, h);
                    assert!(bx < w && by < h, "{rot:?} mapped out of bounds");
                    let idx = (by * w + bx) as usize;
                    assert!(!seen[idx], "{rot:?} visited ({bx},{by}) twice");
                    seen[idx] = true;
                }
            }
            assert!(seen.iter().all(|v| *v));
        }
    }

    #[test]
    fn short_buffer_is_rejected() {
        let buf = vec![0u8; 10];
        let err = FramebufferView::new(&buf, 4, 2, Rotation::Deg0).unwrap_err();
        assert!(matches!(err, Error::InvalidFramebuffer(_)));
    }

    #[test]
    fn pixel_at_reads_high_byte_first() {
        let buf = [0x00, 0x00, 0xF8, 0x00];
        let view = FramebufferView::new(&buf, 2, 1, Rotation::Deg0).unwrap();
        assert_eq!(view.pixel_at(1, 0).red5(), 31);
        assert_eq!(view.pixel_at(0, 0), Rgb565::BLACK);
    }
}
