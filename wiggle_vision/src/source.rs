// THEORY:
// A `FrameSource` is whatever produces live frames: a camera, a video file, a scripted
// list of images. The render loop only needs three things from it:
//
// 1.  **Readiness**: `ready` resolves once the source can actually produce frames. For
//     a camera this is where the device is acquired and the first frame is awaited.
//     A failure here is a `DeviceAcquisition` error and the loop never starts.
// 2.  **Dimensions**: the native size of the current frame. The surface follows it.
// 3.  **The current frame**: an RGBA raster, borrowed for the duration of one cycle.
//
// `release` gives the source a chance to close its device when the loop stops.
//
// `SequenceSource` is the in-crate implementation: it replays a fixed list of images,
// either once (then reports exhaustion) or forever. Built from file paths, it decodes
// them in `ready`, so a missing image is an acquisition failure like an absent camera.

use crate::error::{Result, WiggleError};
use async_trait::async_trait;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait(?Send)]
pub trait FrameSource {
    /// Resolves when the first frame can be produced.
    async fn ready(&mut self) -> Result<()>;

    /// Native size of the current frame.
    fn dimensions(&self) -> (u32, u32);

    /// Advances to and returns the current frame.
    fn current_frame(&mut self) -> Result<&RgbaImage>;

    /// Releases any underlying device. Called once when the loop stops.
    fn release(&mut self) {}
}

/// Replays a fixed list of frames.
#[derive(Debug, Clone)]
pub struct SequenceSource {
    frames: Vec<RgbaImage>,
    /// Image files still to be decoded by `ready`.
    pending: Vec<PathBuf>,
    /// Index of the frame returned by the last `current_frame` call.
    position: Option<usize>,
    looping: bool,
}

impl SequenceSource {
    pub fn new(frames: Vec<RgbaImage>, looping: bool) -> Self {
        Self {
            frames,
            pending: Vec::new(),
            position: None,
            looping,
        }
    }

    /// A sequence of image files, decoded in order when the source becomes ready.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P], looping: bool) -> Self {
        Self {
            pending: paths.iter().map(|path| path.as_ref().to_path_buf()).collect(),
            ..Self::new(Vec::new(), looping)
        }
    }

    fn decode_pending(&mut self) -> Result<()> {
        for path in std::mem::take(&mut self.pending) {
            let image = image::open(&path).map_err(|err| {
                WiggleError::DeviceAcquisition(format!("{}: {err}", path.display()))
            })?;
            self.frames.push(image.to_rgba8());
        }
        debug!(frames = self.frames.len(), "loaded frame sequence");
        Ok(())
    }

    fn next_position(&self) -> Option<usize> {
        let next = self.position.map_or(0, |position| position + 1);
        if next < self.frames.len() {
            Some(next)
        } else if self.looping && !self.frames.is_empty() {
            Some(0)
        } else {
            None
        }
    }
}

#[async_trait(?Send)]
impl FrameSource for SequenceSource {
    async fn ready(&mut self) -> Result<()> {
        if !self.pending.is_empty() {
            self.decode_pending()?;
        }
        if self.frames.is_empty() {
            return Err(WiggleError::DeviceAcquisition(
                "frame sequence is empty".to_string(),
            ));
        }
        Ok(())
    }

    fn dimensions(&self) -> (u32, u32) {
        let upcoming = self.next_position().or(self.position).unwrap_or(0);
        self.frames
            .get(upcoming)
            .map_or((0, 0), |frame| frame.dimensions())
    }

    fn current_frame(&mut self) -> Result<&RgbaImage> {
        let next = self.next_position().ok_or(WiggleError::SourceExhausted)?;
        self.position = Some(next);
        Ok(&self.frames[next])
    }
}
