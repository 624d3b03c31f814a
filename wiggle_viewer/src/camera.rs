use async_trait::async_trait;
use image::RgbaImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use wiggle_vision::{FrameSource, Result, WiggleError};

/// How long `ready` keeps polling a freshly opened device for its first frame.
const READY_ATTEMPTS: u32 = 100;
const READY_POLL: Duration = Duration::from_millis(50);

/// Where frames come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureTarget {
    Camera(i32),
    File(PathBuf),
}

impl fmt::Display for CaptureTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera(index) => write!(f, "camera {index}"),
            Self::File(path) => write!(f, "file {}", path.display()),
        }
    }
}

/// A camera or video file opened through OpenCV `videoio`.
pub struct CaptureSource {
    target: CaptureTarget,
    capture: Option<VideoCapture>,
    bgr: Mat,
    rgba: Mat,
    image: RgbaImage,
    /// The first frame, read during `ready` and not yet handed out.
    primed: bool,
}

impl CaptureSource {
    pub fn new(target: CaptureTarget) -> Self {
        Self {
            target,
            capture: None,
            bgr: Mat::default(),
            rgba: Mat::default(),
            image: RgbaImage::new(0, 0),
            primed: false,
        }
    }

    fn open(&self) -> opencv::Result<VideoCapture> {
        match &self.target {
            CaptureTarget::Camera(index) => VideoCapture::new(*index, videoio::CAP_ANY),
            CaptureTarget::File(path) => {
                VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY)
            }
        }
    }

    /// Reads the next frame into `self.image`. `Ok(false)` when the device had nothing.
    fn read_frame(&mut self) -> Result<bool> {
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| WiggleError::Capture("capture device is not open".to_string()))?;
        if !capture.is_opened().map_err(capture_error)? {
            return Err(WiggleError::DeviceAcquisition(format!(
                "{} was disconnected",
                self.target
            )));
        }

        if !capture.read(&mut self.bgr).map_err(capture_error)? || self.bgr.empty() {
            return Ok(false);
        }

        // OpenCV hands out BGR. The engine works in RGBA.
        imgproc::cvt_color(&self.bgr, &mut self.rgba, imgproc::COLOR_BGR2RGBA, 0)
            .map_err(capture_error)?;
        let size = self.rgba.size().map_err(capture_error)?;
        let (width, height) = (size.width as u32, size.height as u32);
        let bytes = self.rgba.data_bytes().map_err(capture_error)?;

        if self.image.dimensions() == (width, height) {
            self.image.copy_from_slice(bytes);
        } else {
            self.image = RgbaImage::from_raw(width, height, bytes.to_vec()).ok_or_else(|| {
                WiggleError::Capture(format!("frame buffer does not fit {width}x{height}"))
            })?;
            debug!(width, height, "capture frame size changed");
        }
        Ok(true)
    }
}

#[async_trait(?Send)]
impl FrameSource for CaptureSource {
    async fn ready(&mut self) -> Result<()> {
        let capture = self
            .open()
            .map_err(|err| WiggleError::DeviceAcquisition(format!("{}: {err}", self.target)))?;
        let opened = capture
            .is_opened()
            .map_err(|err| WiggleError::DeviceAcquisition(err.to_string()))?;
        if !opened {
            return Err(WiggleError::DeviceAcquisition(format!(
                "could not open {}",
                self.target
            )));
        }
        self.capture = Some(capture);
        info!(device = %self.target, "capture device opened");

        for _ in 0..READY_ATTEMPTS {
            if self.read_frame()? {
                self.primed = true;
                return Ok(());
            }
            sleep(READY_POLL).await;
        }
        Err(WiggleError::DeviceAcquisition(format!(
            "{} produced no frames",
            self.target
        )))
    }

    fn dimensions(&self) -> (u32, u32) {
        let reported = self.capture.as_ref().and_then(|capture| {
            let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH).ok()?;
            let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT).ok()?;
            (width >= 1.0 && height >= 1.0).then_some((width as u32, height as u32))
        });
        reported.unwrap_or_else(|| self.image.dimensions())
    }

    fn current_frame(&mut self) -> Result<&RgbaImage> {
        if std::mem::take(&mut self.primed) {
            return Ok(&self.image);
        }
        if self.read_frame()? {
            return Ok(&self.image);
        }
        match self.target {
            CaptureTarget::File(_) => Err(WiggleError::SourceExhausted),
            CaptureTarget::Camera(_) => Err(WiggleError::Capture(
                "camera returned an empty frame".to_string(),
            )),
        }
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(err) = capture.release() {
                warn!(%err, "failed to release capture device");
            }
        }
    }
}

fn capture_error(err: opencv::Error) -> WiggleError {
    WiggleError::Capture(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_describe_themselves() {
        assert_eq!(CaptureTarget::Camera(2).to_string(), "camera 2");
        assert_eq!(
            CaptureTarget::File(PathBuf::from("clip.mp4")).to_string(),
            "file clip.mp4"
        );
    }

    #[test]
    fn unopened_source_reports_no_size_and_cannot_read() {
        let mut source = CaptureSource::new(CaptureTarget::Camera(0));
        assert_eq!(source.dimensions(), (0, 0));
        assert!(matches!(
            source.current_frame(),
            Err(WiggleError::Capture(_))
        ));
    }
}
