// THEORY:
// The engine's only visible outputs are the stream of rendered surfaces and the
// moving / not-moving indicator. Both leave through the `Presenter` seam, so the core
// never knows whether it is feeding a desktop window, a test recorder or nothing at all.

use crate::core_modules::motion_state::MotionState;
use crate::error::Result;
use crate::surface::Surface;

pub trait Presenter {
    /// Shows the surface after a completed cycle.
    fn present(&mut self, surface: &Surface) -> Result<()>;

    /// Reflects a motion indicator transition. Only called when the state changes.
    fn show_motion(&mut self, state: MotionState);
}
