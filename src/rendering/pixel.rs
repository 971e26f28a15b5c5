//! Packed 16-bit pixels (5 bits red, 6 bits green, 5 bits blue)

/// Largest value of a 5-bit channel.
pub const MAX_5BIT: u8 = 0x1F;
/// Largest value of a 6-bit channel.
pub const MAX_6BIT: u8 = 0x3F;

/// A single RGB565 pixel as stored in the framebuffer.
///
/// The framebuffer keeps the high byte first:
///
/// ```text
/// byte[0] = RRRRRGGG
/// byte[1] = GGGBBBBB
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb565(pub u16);

impl Rgb565 {
    pub const BLACK: Rgb565 = Rgb565(0x0000);
    pub const WHITE: Rgb565 = Rgb565(0xFFFF);

    /// Build a pixel from its two framebuffer bytes (high byte first).
    pub const fn from_bytes(high: u8, low: u8) -> Self {
        Rgb565(((high as u16) << 8) | low as u16)
    }

    /// The two framebuffer bytes for this pixel (high byte first).
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Pack raw channel values. Out-of-range bits are masked off.
    pub const fn from_channels(r5: u8, g6: u8, b5: u8) -> Self {
        let r = (r5 & MAX_5BIT) as u16;
        let g = (g6 & MAX_6BIT) as u16;
        let b = (b5 & MAX_5BIT) as u16;
        Rgb565((r << 11) | (g << 5) | b)
    }

    pub const fn red5(self) -> u8 {
        (self.0 >> 11) as u8 & MAX_5BIT
    }

    pub const fn green6(self) -> u8 {
        (self.0 >> 5) as u8 & MAX_6BIT
    }

    pub const fn blue5(self) -> u8 {
        self.0 as u8 & MAX_5BIT
    }

    /// Expand to 8 bits per channel with proportional scaling.
    ///
    /// Shifting would leave the top of each channel short of 255 (31 << 3 is
    /// 248), so every channel is scaled by `255 / max` instead.
    pub fn to_rgb888(self) -> (u8, u8, u8) {
        (
            expand(self.red5(), MAX_5BIT),
            expand(self.green6(), MAX_6BIT),
            expand(self.blue5(), MAX_5BIT),
        )
    }

    /// Quantize an 8-bit-per-channel colour, rounding to the nearest step.
    pub fn from_rgb888(r: u8, g: u8, b: u8) -> Self {
        Self::from_channels(
            quantize(r, MAX_5BIT),
            quantize(g, MAX_6BIT),
            quantize(b, MAX_5BIT),
        )
    }
}

impl From<u16> for Rgb565 {
    fn from(raw: u16) -> Self {
        Rgb565(raw)
    }
}

fn expand(value: u8, max: u8) -> u8 {
    (value as u32 * 255 / max as u32) as u8
}

fn quantize(value: u8, max: u8) -> u8 {
    ((value as u32 * max as u32 + 127) / 255) as u8
}
