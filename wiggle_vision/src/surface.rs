// THEORY:
// The `Surface` is the engine's canvas: an RGBA raster with exactly the operations a
// 2D drawing context offers the effect and nothing more.
//
// - `resize` follows raster-surface semantics. Asking for the current size is a no-op.
//   Any other size reallocates and leaves the surface transparent black.
// - `draw_image` scales a source frame to a destination rectangle and places it at a
//   possibly negative offset. Whatever falls outside the surface is clipped. Camera
//   frames are opaque, so the draw replaces pixels rather than blending them.
// - `image_data` / `put_image_data` move pixels out and back in as a `Frame`.

use crate::core_modules::pixel_buffer::{CHANNELS, Frame};
use image::RgbaImage;
use image::imageops::{self, FilterType};

/// Filter used when a draw scales its source. Bilinear, like a smoothed 2D canvas.
const SCALE_FILTER: FilterType = FilterType::Triangle;

#[derive(Debug, Clone)]
pub struct Surface {
    image: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Matches the surface to `width` x `height`. Returns `true` when it had to
    /// reallocate, which also clears it.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.image.dimensions() == (width, height) {
            return false;
        }
        self.image = RgbaImage::new(width, height);
        true
    }

    /// Draws `source` scaled to `width` x `height` with its top-left corner at `(x, y)`.
    pub fn draw_image(&mut self, source: &RgbaImage, x: i64, y: i64, width: u32, height: u32) {
        if width == 0 || height == 0 || source.width() == 0 || source.height() == 0 {
            return;
        }
        if source.dimensions() == (width, height) {
            imageops::replace(&mut self.image, source, x, y);
        } else {
            let scaled = imageops::resize(source, width, height, SCALE_FILTER);
            imageops::replace(&mut self.image, &scaled, x, y);
        }
    }

    /// A copy of every pixel currently on the surface.
    pub fn image_data(&self) -> Frame {
        Frame::from_image(self.image.clone())
    }

    /// Writes `frame` at the origin, clipped to the surface.
    pub fn put_image_data(&mut self, frame: &Frame) {
        let (surface_width, surface_height) = self.image.dimensions();
        let columns = frame.width.min(surface_width) as usize;
        let rows = frame.height.min(surface_height) as usize;
        let source = frame.pixels.as_slice();
        let source_stride = frame.width as usize * CHANNELS;
        let target_stride = surface_width as usize * CHANNELS;
        let target: &mut [u8] = &mut self.image;

        for row in 0..rows {
            let from = row * source_stride;
            let Some(source_row) = source.get(from..from + columns * CHANNELS) else {
                break;
            };
            let to = row * target_stride;
            target[to..to + columns * CHANNELS].copy_from_slice(source_row);
        }
    }

    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }
}
