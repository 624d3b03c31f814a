// THEORY:
// This file is the main entry point for the `wiggle_vision` library crate. It exposes the
// `RenderLoop` and the small set of seams a host needs to drive it: a `FrameSource` that
// produces frames, a `Presenter` that shows the result and the motion indicator, and the
// `EffectConfig` that fixes the effect's constants for a run.
//
// The per-pixel machinery (`core_modules`) is public for hosts and tests that want to
// run the diff or the debounce on their own, but a typical host only touches the
// re-exports below.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod presenter;
pub mod render_loop;
pub mod source;
pub mod surface;

pub use config::EffectConfig;
pub use core_modules::motion_state::{MotionState, MotionStateTracker, MotionTransition};
pub use core_modules::pixel_buffer::{Frame, PixelBuffer};
pub use core_modules::pixel_diff::{DiffOutcome, HighlightColor, PixelDiffEngine};
pub use error::{Result, WiggleError};
pub use presenter::Presenter;
pub use render_loop::{CycleReport, LoopExit, RenderLoop, StopHandle};
pub use source::{FrameSource, SequenceSource};
pub use surface::Surface;
