//! Raster encoder: RGB565 framebuffer to uncompressed 24-bit BMP
//!
//! Output is a BITMAPFILEHEADER (14 bytes) followed by a BITMAPINFOHEADER
//! (40 bytes) and bottom-up BGR rows padded to 4-byte boundaries. A 320x240
//! display encodes to 54 + 960 * 240 = 230,454 bytes.

use crate::rendering::FramebufferView;
use crate::{Error, Result};

/// Size of the BITMAPFILEHEADER.
pub const FILE_HEADER_SIZE: usize = 14;
/// Size of the BITMAPINFOHEADER.
pub const INFO_HEADER_SIZE: usize = 40;
/// Offset of the pixel data from the start of the file.
pub const HEADER_SIZE: usize = FILE_HEADER_SIZE + INFO_HEADER_SIZE;
/// Output depth.
pub const BITS_PER_PIXEL: u16 = 24;

const MAGIC: [u8; 2] = *b"BM";

/// Bytes per output row, padded to a multiple of 4.
pub fn row_stride(width: u32) -> usize {
    (width as usize * 3).div_ceil(4) * 4
}

/// Total encoded size for a displayed geometry.
pub fn encoded_len(width: u32, height: u32) -> usize {
    HEADER_SIZE + row_stride(width) * height as usize
}

/// Encode a framebuffer with no allocation budget.
pub fn encode(view: &FramebufferView<'_>) -> Result<Vec<u8>> {
    RasterEncoder::new().encode(view)
}

/// Stateless BMP encoder with an optional cap on the output size.
///
/// The cap models a fixed memory pool for screenshots: an image that would
/// not fit is reported as [`Error::AllocationFailed`], exactly like a failed
/// reservation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterEncoder {
    max_bytes: Option<usize>,
}

impl RasterEncoder {
    pub fn new() -> Self {
        Self { max_bytes: None }
    }

    pub fn with_budget(max_bytes: Option<usize>) -> Self {
        Self { max_bytes }
    }

    pub fn budget(&self) -> Option<usize> {
        self.max_bytes
    }

    /// Encode the displayed (post-rotation) contents of `view`.
    pub fn encode(&self, view: &FramebufferView<'_>) -> Result<Vec<u8>> {
        let width = view.displayed_width();
        let height = view.displayed_height();
        let stride = row_stride(width);
        let pixel_bytes = stride * height as usize;
        let file_size = HEADER_SIZE + pixel_bytes;

        let file_size_le = u32::try_from(file_size).map_err(|_| {
            Error::InvalidFramebuffer(format!("{width}x{height} exceeds the BMP size limit"))
        })?;

        let mut out = self.allocate(file_size)?;
        write_header(&mut out[..HEADER_SIZE], width, height, file_size_le, pixel_bytes as u32);

        if stride == 0 || height == 0 {
            return Ok(out);
        }

        // BMP rows run bottom-to-top: screen row 0 is the last output row.
        for (sy, row) in out[HEADER_SIZE..]
            .chunks_exact_mut(stride)
            .rev()
            .enumerate()
        {
            for (sx, bgr) in row.chunks_exact_mut(3).take(width as usize).enumerate() {
                let (r, g, b) = view.pixel_at(sx as u32, sy as u32).to_rgb888();
                bgr.copy_from_slice(&[b, g, r]);
            }
        }

        Ok(out)
    }

    fn allocate(&self, len: usize) -> Result<Vec<u8>> {
        if self.max_bytes.is_some_and(|max| len > max) {
            return Err(Error::AllocationFailed(len));
        }
        let mut buf = Vec::new();
        buf.try_reserve_exact(len)
            .map_err(|_| Error::AllocationFailed(len))?;
        buf.resize(len, 0);
        Ok(buf)
    }
}

fn write_header(header: &mut [u8], width: u32, height: u32, file_size: u32, pixel_bytes: u32) {
    header.fill(0);

    // BITMAPFILEHEADER
    header[0..2].copy_from_slice(&MAGIC);
    header[2..6].copy_from_slice(&file_size.to_le_bytes());
    header[10..14].copy_from_slice(&(HEADER_SIZE as u32).to_le_bytes());

    // BITMAPINFOHEADER; positive height means bottom-up rows
    header[14..18].copy_from_slice(&(INFO_HEADER_SIZE as u32).to_le_bytes());
    header[18..22].copy_from_slice(&width.to_le_bytes());
    header[22..26].copy_from_slice(&height.to_le_bytes());
    header[26..28].copy_from_slice(&1u16.to_le_bytes());
    header[28..30].copy_from_slice(&BITS_PER_PIXEL.to_le_bytes());
    header[34..38].copy_from_slice(&pixel_bytes.to_le_bytes());
}

/// The fields of an encoded image that consumers need to read it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BmpHeader {
    pub file_size: u32,
    pub pixel_offset: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bits_per_pixel: u16,
    pub image_size: u32,
}

impl BmpHeader {
    /// Parse the fixed 54-byte header of an uncompressed 24-bit BMP.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::InvalidImage(format!(
                "{} bytes is shorter than the {HEADER_SIZE}-byte header",
                bytes.len()
            )));
        }
        if bytes[0..2] != MAGIC {
            return Err(Error::InvalidImage("missing BM signature".into()));
        }
        let info_size = le32(bytes, 14);
        if info_size as usize != INFO_HEADER_SIZE {
            return Err(Error::InvalidImage(format!(
                "unsupported info header size {info_size}"
            )));
        }

        let header = BmpHeader {
            file_size: le32(bytes, 2),
            pixel_offset: le32(bytes, 10),
            width: le32(bytes, 18) as i32,
            height: le32(bytes, 22) as i32,
            planes: le16(bytes, 26),
            bits_per_pixel: le16(bytes, 28),
            image_size: le32(bytes, 34),
        };
        if header.bits_per_pixel != BITS_PER_PIXEL {
            return Err(Error::InvalidImage(format!(
                "expected {BITS_PER_PIXEL} bits per pixel, found {}",
                header.bits_per_pixel
            )));
        }
        Ok(header)
    }

    pub fn row_stride(&self) -> usize {
        row_stride(self.width.unsigned_abs())
    }

    /// Whether rows are stored bottom-to-top.
    pub fn is_bottom_up(&self) -> bool {
        self.height > 0
    }

    /// RGB of the pixel at screen coordinate `(sx, sy)` (top-left origin).
    pub fn rgb_at(&self, bytes: &[u8], sx: u32, sy: u32) -> Option<(u8, u8, u8)> {
        let height = self.height.unsigned_abs();
        if sx >= self.width.unsigned_abs() || sy >= height {
            return None;
        }
        let row = if self.is_bottom_up() { height - 1 - sy } else { sy };
        let pos = self.pixel_offset as usize + row as usize * self.row_stride() + sx as usize * 3;
        let bgr = bytes.get(pos..pos + 3)?;
        Some((bgr[2], bgr[1], bgr[0]))
    }
}

fn le32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn le16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}
