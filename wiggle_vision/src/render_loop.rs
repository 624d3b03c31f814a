// THEORY:
// The `RenderLoop` is the top-level API of the engine. It owns every piece of mutable
// state the effect has: the surface, the diff engine and its remembered frame, the
// motion tracker and the wiggle RNG. Nothing is global and nothing is shared.
//
// One cycle, run once per display tick:
// 1.  Match the surface to the source's native size.
// 2.  In drawing mode, draw the live frame enlarged by `2 * wiggle` at a random negative
//     offset and read that composite back as the "previous" frame. The reference is a
//     spatially shifted copy of *this* instant, so flat regions cancel out and only
//     edges light up. It is not the temporal predecessor, and that is the effect.
// 3.  Draw the live frame unjittered at exact size and read it back.
// 4.  Diff and recolour it, write it back, present it.
// 5.  Feed the change signal to the motion tracker, stamped with the instant it was
//     detected. A tick only says when a cycle was due; a slow camera read can start it
//     well after that, and the debounce must run from the detection.
//
// `run` drives cycles on a single task. It first awaits the source's readiness, then
// selects over three things: the stop signal, the render tick, and the tracker's single
// pending debounce deadline. Cycles are synchronous, so they never overlap, and the
// debounce firing can never interleave with one.

use crate::config::EffectConfig;
use crate::core_modules::motion_state::{MotionState, MotionStateTracker, MotionTransition};
use crate::core_modules::pixel_diff::{DiffOutcome, PixelDiffEngine};
use crate::error::{Result, WiggleError};
use crate::presenter::Presenter;
use crate::source::FrameSource;
use crate::surface::Surface;
use futures::future::OptionFuture;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, error, info, warn};

/// Explicit stop for a running loop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// A handle and the receiver to pass to `RenderLoop::run`.
    pub fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, rx)
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Why `run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The stop handle fired.
    Stopped,
    /// A finite source ran out of frames.
    SourceExhausted,
    /// The source could not be acquired, or was lost, and the loop idled until stopped.
    AcquisitionFailed,
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub outcome: DiffOutcome,
    pub transition: Option<MotionTransition>,
    /// Offset of the jittered capture, in drawing mode.
    pub jitter: Option<(i64, i64)>,
    /// The surface was reallocated to follow the source.
    pub resized: bool,
}

/// One axis of the wiggle: `-floor(U[0,1) * wiggle / 2) - wiggle`.
pub fn jitter_offset<R: Rng>(rng: &mut R, wiggle_amount: u32) -> i64 {
    let range = f64::from(wiggle_amount) / 2.0;
    let roll = (rng.r#gen::<f64>() * range).floor() as i64;
    -roll - i64::from(wiggle_amount)
}

pub struct RenderLoop<S, P> {
    source: S,
    presenter: P,
    surface: Surface,
    engine: PixelDiffEngine,
    tracker: MotionStateTracker,
    config: EffectConfig,
    rng: StdRng,
    cycles: u64,
}

impl<S: FrameSource, P: Presenter> RenderLoop<S, P> {
    pub fn new(source: S, presenter: P, config: EffectConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            presenter,
            surface: Surface::new(0, 0),
            engine: PixelDiffEngine::from_config(&config),
            tracker: MotionStateTracker::new(config.debounce),
            config,
            rng: StdRng::from_entropy(),
            cycles: 0,
        })
    }

    /// Replaces the wiggle RNG, for reproducible jitter.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &EffectConfig {
        &self.config
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn motion_state(&self) -> MotionState {
        self.tracker.state()
    }

    pub fn tracker(&self) -> &MotionStateTracker {
        &self.tracker
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs one capture → diff → recolour → present cycle.
    pub fn cycle(&mut self) -> Result<CycleReport> {
        let (width, height) = self.source.dimensions();
        let resized = self.surface.resize(width, height);
        if resized {
            debug!(width, height, "surface resized to follow the source");
        }

        let frame = self.source.current_frame()?;

        let mut jitter = None;
        if self.config.drawing_mode {
            let wiggle = self.config.wiggle_amount;
            let x = jitter_offset(&mut self.rng, wiggle);
            let y = jitter_offset(&mut self.rng, wiggle);
            let padding = wiggle.saturating_mul(2);
            self.surface.draw_image(
                frame,
                x,
                y,
                width.saturating_add(padding),
                height.saturating_add(padding),
            );
            self.engine.retain(self.surface.image_data().pixels);
            jitter = Some((x, y));
        }

        self.surface.draw_image(frame, 0, 0, width, height);

        let mut live = self.surface.image_data();
        let outcome = self.engine.process(&mut live.pixels);
        self.surface.put_image_data(&live);

        if let Err(err) = self.presenter.present(&self.surface) {
            warn!(%err, "failed to present frame");
        }

        let detected = Instant::now();
        let transition = self.tracker.on_frame(outcome.changed, detected);
        if let Some(transition) = transition {
            self.announce(transition);
        }

        self.cycles += 1;
        debug!(
            cycle = self.cycles,
            changed_pixels = outcome.changed_pixels,
            ?jitter,
            "render cycle complete"
        );

        Ok(CycleReport {
            outcome,
            transition,
            jitter,
            resized,
        })
    }

    /// Fires the debounce deadline if it is due.
    pub fn poll_motion(&mut self, now: Instant) -> Option<MotionTransition> {
        let transition = self.tracker.poll(now);
        if let Some(transition) = transition {
            self.announce(transition);
        }
        transition
    }

    /// Drives cycles once per tick until stopped or until the source gives out.
    pub async fn run(&mut self, mut stop: watch::Receiver<bool>) -> LoopExit {
        let ready = tokio::select! {
            biased;
            _ = wait_for_stop(&mut stop) => None,
            ready = self.source.ready() => Some(ready),
        };

        let exit = match ready {
            None => {
                info!("stopped before the frame source became ready");
                LoopExit::Stopped
            }
            Some(Err(err)) => {
                error!(%err, "frame source acquisition failed, staying idle");
                wait_for_stop(&mut stop).await;
                LoopExit::AcquisitionFailed
            }
            Some(Ok(())) => {
                let (width, height) = self.source.dimensions();
                info!(
                    width,
                    height,
                    refresh_rate_hz = self.config.refresh_rate_hz,
                    drawing_mode = self.config.drawing_mode,
                    "frame source ready, rendering"
                );
                self.render(&mut stop).await
            }
        };

        self.shutdown();
        exit
    }

    async fn render(&mut self, stop: &mut watch::Receiver<bool>) -> LoopExit {
        let mut ticker = interval(self.config.frame_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let debounce: OptionFuture<_> = self.tracker.deadline().map(sleep_until).into();

            tokio::select! {
                biased;
                _ = wait_for_stop(stop) => return LoopExit::Stopped,
                Some(()) = debounce => {
                    self.poll_motion(Instant::now());
                }
                _ = ticker.tick() => match self.cycle() {
                    Ok(_) => {}
                    Err(WiggleError::SourceExhausted) => {
                        info!("frame source exhausted");
                        return LoopExit::SourceExhausted;
                    }
                    Err(err) if err.ends_loop() => {
                        error!(%err, "frame source lost, staying idle");
                        wait_for_stop(stop).await;
                        return LoopExit::AcquisitionFailed;
                    }
                    Err(err) => warn!(%err, "skipping render cycle"),
                },
            }
        }
    }

    fn announce(&mut self, transition: MotionTransition) {
        info!(
            from = transition.from.marker(),
            to = transition.to.marker(),
            "motion state changed"
        );
        self.presenter.show_motion(transition.to);
    }

    fn shutdown(&mut self) {
        self.tracker.cancel();
        self.source.release();
        info!(cycles = self.cycles, "render loop stopped");
    }
}

/// Resolves once the stop flag is set or every handle is gone.
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel_diff::gradient_at;
    use crate::source::SequenceSource;
    use image::{Rgba, RgbaImage};

    #[derive(Default)]
    struct Recorder {
        presented: usize,
        motion: Vec<MotionState>,
    }

    impl Presenter for Recorder {
        fn present(&mut self, _surface: &Surface) -> Result<()> {
            self.presented += 1;
            Ok(())
        }

        fn show_motion(&mut self, state: MotionState) {
            self.motion.push(state);
        }
    }

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
    }

    fn render_loop(frames: Vec<RgbaImage>, drawing_mode: bool) -> RenderLoop<SequenceSource, Recorder> {
        let config = EffectConfig {
            drawing_mode,
            ..EffectConfig::default()
        };
        RenderLoop::new(SequenceSource::new(frames, true), Recorder::default(), config)
            .unwrap()
            .with_rng(StdRng::seed_from_u64(7))
    }

    #[test]
    fn jitter_stays_within_the_wiggle_band() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let offset = jitter_offset(&mut rng, 5);
            assert!((-7..=-5).contains(&offset), "offset {offset}");
        }
        assert_eq!(jitter_offset(&mut rng, 0), 0);
    }

    #[test]
    fn rejects_invalid_configuration() {
        let config = EffectConfig {
            refresh_rate_hz: 0,
            ..EffectConfig::default()
        };
        let result = RenderLoop::new(SequenceSource::new(Vec::new(), false), Recorder::default(), config);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_a_wiggle_too_large_to_allocate() {
        let config = EffectConfig {
            wiggle_amount: u32::MAX,
            ..EffectConfig::default()
        };
        let frames = vec![solid(4, 4, 10)];
        let result = RenderLoop::new(SequenceSource::new(frames, true), Recorder::default(), config);
        assert!(matches!(
            result,
            Err(WiggleError::InvalidConfig { field: "wiggle_amount", .. })
        ));
    }

    #[test]
    fn first_passthrough_cycle_paints_the_whole_gradient() {
        let mut render = render_loop(vec![solid(2, 2, 50)], false);
        let report = render.cycle().unwrap();

        assert!(report.resized);
        assert_eq!(report.jitter, None);
        assert_eq!(report.outcome.changed_pixels, 4);
        let data = render.surface().image_data();
        for index in 0..4 {
            let pixel = data.pixels.pixel(index).unwrap();
            assert_eq!(&pixel[..3], &gradient_at(index * 4, 16));
            assert_eq!(pixel[3], 255);
        }
        assert_eq!(render.motion_state(), MotionState::Moving);
        assert_eq!(render.presenter().motion, vec![MotionState::Moving]);
    }

    #[test]
    fn static_passthrough_frames_show_the_camera_colours() {
        let mut render = render_loop(vec![solid(3, 2, 50)], false);
        render.cycle().unwrap();
        let report = render.cycle().unwrap();

        assert!(!report.resized);
        assert!(!report.outcome.changed);
        assert_eq!(render.surface().as_image(), &solid(3, 2, 50));
        assert_eq!(render.presenter().presented, 2);
    }

    #[test]
    fn uniform_frames_in_drawing_mode_render_black() {
        let mut render = render_loop(vec![solid(8, 8, 50), solid(8, 8, 200)], true);
        for _ in 0..4 {
            let report = render.cycle().unwrap();
            assert!(!report.outcome.changed);
            assert!(report.jitter.is_some());
        }
        assert!(render.surface().as_image().pixels().all(|p| p.0 == [0, 0, 0, 255]));
        assert_eq!(render.motion_state(), MotionState::NotMoving);
        assert!(render.presenter().motion.is_empty());
    }

    #[test]
    fn edges_light_up_in_drawing_mode() {
        let mut frame = solid(32, 32, 0);
        for y in 0..32 {
            for x in 0..8 {
                frame.put_pixel(x, y, Rgba([255, 255, 255, 255]));
            }
        }
        let mut render = render_loop(vec![frame], true);
        let report = render.cycle().unwrap();

        assert!(report.outcome.changed);
        assert!(report.outcome.changed_pixels < 32 * 32);
        assert_eq!(render.surface().as_image().get_pixel(31, 31).0, [0, 0, 0, 255]);
    }

    #[test]
    fn surface_follows_the_source_size() {
        let mut render = render_loop(vec![solid(2, 2, 10), solid(4, 3, 10)], false);
        assert!(render.cycle().unwrap().resized);
        let report = render.cycle().unwrap();
        assert!(report.resized);
        assert_eq!(render.surface().dimensions(), (4, 3));
        assert!(report.outcome.changed);
    }

    #[test]
    fn debounce_returns_to_not_moving() {
        let mut render = render_loop(vec![solid(1, 1, 10)], false);
        let before = Instant::now();
        render.cycle().unwrap();
        let debounce = render.config().debounce;
        let deadline = render.tracker().deadline().unwrap();
        assert!(deadline >= before + debounce);

        assert_eq!(render.poll_motion(deadline - debounce / 2), None);
        let transition = render.poll_motion(deadline).unwrap();
        assert_eq!(transition.to, MotionState::NotMoving);
        assert_eq!(
            render.presenter().motion,
            vec![MotionState::Moving, MotionState::NotMoving]
        );
    }

    #[test]
    fn stop_handle_reports_its_state() {
        let (handle, rx) = StopHandle::new();
        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());
        assert!(*rx.borrow());
    }
}
