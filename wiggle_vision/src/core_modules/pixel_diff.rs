// THEORY:
// The `pixel_diff` module is the heart of the effect. It takes the live frame and the
// frame retained from the previous cycle and decides, for every pixel, whether it
// changed. Then it repaints the live frame in place:
//
// 1.  **Classification**: A pixel is CHANGED when any of its R, G or B channels falls
//     outside `previous ± tolerance` (inclusive bounds). Alpha is never compared and
//     never written. A pixel with no counterpart in the previous buffer, as on the very
//     first frame, is CHANGED.
// 2.  **Recolour**: CHANGED pixels are painted with a ramp keyed on their byte offset
//     (`R = 255 - t*255`, `G = B = t*255` with `t = offset / length`), so motion shows as
//     a cyan-to-red sweep down the frame rather than a flat highlight. UNCHANGED pixels
//     go black in drawing mode and pass through untouched otherwise.
// 3.  **Memory**: `PixelDiffEngine` owns the previous frame. It snapshots the pristine
//     live buffer *before* repainting it, so the next cycle compares against camera
//     colours and never against its own gradient.
//
// Mismatched lengths are tolerated: bytes past the end of either buffer are simply not
// compared. A partial trailing pixel is left alone.

use crate::config::EffectConfig;
use crate::core_modules::pixel_buffer::{CHANNELS, PixelBuffer, saturate};
use tracing::debug;

/// The flat highlight colour of each mode. The shipped recolour policy paints a
/// gradient instead, so this only tints presentation chrome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl HighlightColor {
    pub const WHITE: Self = Self::new(255, 255, 255);
    pub const RED: Self = Self::new(255, 0, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn for_mode(drawing_mode: bool) -> Self {
        if drawing_mode { Self::WHITE } else { Self::RED }
    }
}

/// Classification of a single pixel against its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelClass {
    Changed,
    Unchanged,
}

/// What a single diff pass saw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffOutcome {
    /// At least one pixel was classified CHANGED.
    pub changed: bool,
    /// How many pixels were classified CHANGED.
    pub changed_pixels: usize,
}

/// `true` when `current` lies within `previous ± tolerance`, bounds included.
#[inline]
pub fn in_range(current: u8, previous: u8, tolerance: u8) -> bool {
    let (current, previous, tolerance) = (
        i16::from(current),
        i16::from(previous),
        i16::from(tolerance),
    );
    previous - tolerance <= current && current <= previous + tolerance
}

/// Classifies one RGBA pixel. A missing predecessor counts as a change.
#[inline]
pub fn classify(current: &[u8], previous: Option<&[u8]>, tolerance: u8) -> PixelClass {
    let Some(previous) = previous else {
        return PixelClass::Changed;
    };
    let unchanged = current[..3]
        .iter()
        .zip(&previous[..3])
        .all(|(&cur, &prev)| in_range(cur, prev, tolerance));
    if unchanged {
        PixelClass::Unchanged
    } else {
        PixelClass::Changed
    }
}

/// The gradient colour for a CHANGED pixel at byte `offset` of a `total`-byte buffer.
pub fn gradient_at(offset: usize, total: usize) -> [u8; 3] {
    let ramp = if total == 0 {
        0.0
    } else {
        offset as f64 / total as f64 * 255.0
    };
    [saturate(255.0 - ramp), saturate(ramp), saturate(ramp)]
}

/// Classifies and recolours `current` in place against `previous`.
///
/// `previous` is only read. Pixels beyond its end are treated as CHANGED, so an empty
/// `previous` marks the whole frame as changed.
pub fn diff(current: &mut [u8], previous: &[u8], tolerance: u8, drawing_mode: bool) -> DiffOutcome {
    if !previous.is_empty() && previous.len() != current.len() {
        debug!(
            current = current.len(),
            previous = previous.len(),
            "pixel buffer lengths differ, comparing the overlap only"
        );
    }

    let total = current.len();
    let mut outcome = DiffOutcome::default();

    for (index, pixel) in current.chunks_exact_mut(CHANNELS).enumerate() {
        let offset = index * CHANNELS;
        let predecessor = previous.get(offset..offset + CHANNELS);

        match classify(pixel, predecessor, tolerance) {
            PixelClass::Changed => {
                outcome.changed = true;
                outcome.changed_pixels += 1;
                pixel[..3].copy_from_slice(&gradient_at(offset, total));
            }
            PixelClass::Unchanged => {
                if drawing_mode {
                    pixel[..3].fill(0);
                }
            }
        }
    }

    outcome
}

/// The diff engine together with the frame it remembers from the previous cycle.
#[derive(Debug, Clone)]
pub struct PixelDiffEngine {
    tolerance_band: u8,
    drawing_mode: bool,
    previous: PixelBuffer,
}

impl PixelDiffEngine {
    pub fn new(tolerance_band: u8, drawing_mode: bool) -> Self {
        Self {
            tolerance_band,
            drawing_mode,
            previous: PixelBuffer::new(),
        }
    }

    pub fn from_config(config: &EffectConfig) -> Self {
        Self::new(config.tolerance_band, config.drawing_mode)
    }

    /// Replaces the remembered frame. The render loop uses this to install the
    /// jittered snapshot in drawing mode.
    pub fn retain(&mut self, snapshot: PixelBuffer) {
        self.previous = snapshot;
    }

    pub fn previous(&self) -> &PixelBuffer {
        &self.previous
    }

    /// Forgets the remembered frame. The next pass sees every pixel as changed.
    pub fn reset(&mut self) {
        self.previous = PixelBuffer::new();
    }

    /// Diffs `current` against the remembered frame and recolours it in place.
    /// The pristine input is remembered for the next pass.
    pub fn process(&mut self, current: &mut PixelBuffer) -> DiffOutcome {
        let snapshot = current.clone();
        let outcome = diff(
            current.as_mut_slice(),
            self.previous.as_slice(),
            self.tolerance_band,
            self.drawing_mode,
        );
        self.previous = snapshot;
        outcome
    }
}
