// THEORY:
// `PixelBuffer` is the "dumb" data container the whole engine speaks: a flat run of
// bytes, four per pixel, laid out (R, G, B, A) in row-major order. It knows nothing about
// frames or time. It only guarantees the layout. `saturate` turns values computed in
// floating point into bytes, so a gradient that lands on 191.25 or -3.0 becomes a valid
// byte instead of wrapping.
//
// `Frame` pairs a buffer with the dimensions it was read at. Frames are ephemeral: one is
// read off the surface every cycle, mutated, written back and dropped.

use image::RgbaImage;

/// Number of channel samples per pixel.
pub const CHANNELS: usize = 4;

pub type Rgba = [u8; CHANNELS];

/// A flat RGBA byte buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
}

impl PixelBuffer {
    /// An empty buffer, the state of the previous frame before the first cycle.
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn from_raw(data: Vec<u8>) -> Self {
        debug_assert!(
            data.len() % CHANNELS == 0,
            "pixel buffer length {} is not a multiple of {CHANNELS}",
            data.len()
        );
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of whole pixels in the buffer.
    pub fn pixel_count(&self) -> usize {
        self.data.len() / CHANNELS
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// The pixel at `index` (counted in pixels, not bytes).
    pub fn pixel(&self, index: usize) -> Option<Rgba> {
        let start = index.checked_mul(CHANNELS)?;
        let bytes = self.data.get(start..start + CHANNELS)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Converts a computed sample to a byte the way a clamped byte array stores it:
/// round half to even, then clamp. NaN becomes 0.
pub fn saturate(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round_ties_even().clamp(0.0, 255.0) as u8
}

/// A pixel buffer paired with the dimensions it was captured at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: PixelBuffer,
}

impl Frame {
    pub fn new(width: u32, height: u32, pixels: PixelBuffer) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(width, height, PixelBuffer::from_raw(image.into_raw()))
    }
}
