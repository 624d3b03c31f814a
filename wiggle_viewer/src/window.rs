use opencv::{
    core::{self, Mat, Point, Scalar},
    highgui, imgproc,
    prelude::*,
};
use tracing::{info, warn};
use wiggle_vision::{HighlightColor, MotionState, Presenter, Result, StopHandle, Surface, WiggleError};

const BADGE_CENTER: (i32, i32) = (16, 16);
const BADGE_RADIUS: i32 = 8;

/// Shows the rendered surface in an OpenCV window and mirrors the motion indicator in
/// the title. Any key press inside the window, or closing it, stops the loop.
pub struct HighGuiPresenter {
    window: String,
    stop: StopHandle,
    highlight: HighlightColor,
    motion: MotionState,
    rgba: Mat,
    bgr: Mat,
}

impl HighGuiPresenter {
    pub fn new(window: &str, stop: StopHandle, highlight: HighlightColor) -> Result<Self> {
        highgui::named_window(window, highgui::WINDOW_AUTOSIZE).map_err(present_error)?;
        let mut presenter = Self {
            window: window.to_string(),
            stop,
            highlight,
            motion: MotionState::NotMoving,
            rgba: Mat::default(),
            bgr: Mat::default(),
        };
        presenter.update_title();
        Ok(presenter)
    }

    fn update_title(&self) {
        let title = window_title(&self.window, self.motion);
        if let Err(err) = highgui::set_window_title(&self.window, &title) {
            warn!(%err, "failed to update window title");
        }
    }

    fn upload(&mut self, surface: &Surface) -> opencv::Result<()> {
        let (width, height) = (surface.width() as i32, surface.height() as i32);
        if self.rgba.rows() != height || self.rgba.cols() != width {
            self.rgba =
                Mat::new_rows_cols_with_default(height, width, core::CV_8UC4, Scalar::all(0.0))?;
        }
        self.rgba
            .data_bytes_mut()?
            .copy_from_slice(surface.as_image().as_raw());
        imgproc::cvt_color(&self.rgba, &mut self.bgr, imgproc::COLOR_RGBA2BGR, 0)?;

        if self.motion == MotionState::Moving {
            let HighlightColor { red, green, blue } = self.highlight;
            let color = Scalar::new(f64::from(blue), f64::from(green), f64::from(red), 0.0);
            let center = Point::new(BADGE_CENTER.0, BADGE_CENTER.1);
            imgproc::circle(&mut self.bgr, center, BADGE_RADIUS, color, -1, imgproc::LINE_8, 0)?;
        }
        Ok(())
    }

    fn window_closed(&self) -> bool {
        highgui::get_window_property(&self.window, highgui::WND_PROP_VISIBLE)
            .map(|visible| visible < 1.0)
            .unwrap_or(true)
    }
}

impl Presenter for HighGuiPresenter {
    fn present(&mut self, surface: &Surface) -> Result<()> {
        if surface.width() == 0 || surface.height() == 0 {
            return Ok(());
        }
        self.upload(surface).map_err(present_error)?;
        highgui::imshow(&self.window, &self.bgr).map_err(present_error)?;

        let key = highgui::wait_key(1).map_err(present_error)?;
        if key > 0 && key != 255 {
            info!(key, "key pressed, stopping");
            self.stop.stop();
        } else if self.window_closed() {
            info!("window closed, stopping");
            self.stop.stop();
        }
        Ok(())
    }

    fn show_motion(&mut self, state: MotionState) {
        self.motion = state;
        self.update_title();
    }
}

impl Drop for HighGuiPresenter {
    fn drop(&mut self) {
        let _ = highgui::destroy_window(&self.window);
    }
}

fn window_title(window: &str, state: MotionState) -> String {
    format!("{window} [{}]", state.marker())
}

fn present_error(err: opencv::Error) -> WiggleError {
    WiggleError::Present(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_carries_the_indicator_marker() {
        assert_eq!(
            window_title("wiggle vision", MotionState::Moving),
            "wiggle vision [moving]"
        );
        assert_eq!(
            window_title("wiggle vision", MotionState::NotMoving),
            "wiggle vision [not-moving]"
        );
    }
}
