mod camera;
mod window;

use camera::{CaptureSource, CaptureTarget};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;
use window::HighGuiPresenter;
use wiggle_vision::{
    EffectConfig, FrameSource, HighlightColor, LoopExit, RenderLoop, SequenceSource, StopHandle,
};

const WINDOW_NAME: &str = "wiggle vision";

/// Paints motion from a camera, a video file or a list of images.
#[derive(Debug, Parser)]
#[command(name = "wiggle_viewer", version)]
struct Args {
    /// Camera index to open when no other input is given.
    #[arg(long, default_value_t = 0)]
    camera: i32,

    /// Video file to play instead of a camera.
    #[arg(long, conflicts_with = "frames")]
    input: Option<PathBuf>,

    /// Image files to loop through instead of a camera.
    #[arg(long, num_args = 1..)]
    frames: Vec<PathBuf>,

    /// Pass unchanged pixels through and skip the jittered capture.
    #[arg(long)]
    no_drawing: bool,

    /// Per-channel tolerance band.
    #[arg(long)]
    tolerance: Option<u8>,

    /// Wiggle amount in pixels.
    #[arg(long)]
    wiggle: Option<u32>,

    /// Motion indicator debounce in milliseconds.
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Render cadence in frames per second.
    #[arg(long)]
    fps: Option<u32>,
}

impl Args {
    /// Applies the command line on top of `base`.
    fn effect_config(&self, base: EffectConfig) -> EffectConfig {
        let mut config = base;
        if self.no_drawing {
            config.drawing_mode = false;
        }
        if let Some(tolerance) = self.tolerance {
            config.tolerance_band = tolerance;
        }
        if let Some(wiggle) = self.wiggle {
            config.wiggle_amount = wiggle;
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(fps) = self.fps {
            config.refresh_rate_hz = fps;
        }
        config
    }

    fn capture_target(&self) -> CaptureTarget {
        match &self.input {
            Some(path) => CaptureTarget::File(path.clone()),
            None => CaptureTarget::Camera(self.camera),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.effect_config(EffectConfig::from_env());
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let exit = runtime.block_on(run(args, config))?;
    info!(?exit, "viewer finished");
    Ok(())
}

async fn run(args: Args, config: EffectConfig) -> anyhow::Result<LoopExit> {
    let (stop, stop_rx) = StopHandle::new();

    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, stopping");
            ctrl_c.stop();
        }
    });

    let highlight = HighlightColor::for_mode(config.drawing_mode);
    let presenter = HighGuiPresenter::new(WINDOW_NAME, stop, highlight)?;

    if args.frames.is_empty() {
        let source = CaptureSource::new(args.capture_target());
        drive(source, presenter, config, stop_rx).await
    } else {
        let source = SequenceSource::from_paths(args.frames.as_slice(), true);
        drive(source, presenter, config, stop_rx).await
    }
}

async fn drive<S: FrameSource>(
    source: S,
    presenter: HighGuiPresenter,
    config: EffectConfig,
    stop: watch::Receiver<bool>,
) -> anyhow::Result<LoopExit> {
    let mut render = RenderLoop::new(source, presenter, config)?;
    Ok(render.run(stop).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_open_the_first_camera() {
        let args = Args::try_parse_from(["wiggle_viewer"]).unwrap();
        assert_eq!(args.capture_target(), CaptureTarget::Camera(0));
        assert_eq!(
            args.effect_config(EffectConfig::default()),
            EffectConfig::default()
        );
    }

    #[test]
    fn flags_override_the_base_config() {
        let args = Args::try_parse_from([
            "wiggle_viewer",
            "--no-drawing",
            "--tolerance",
            "12",
            "--wiggle",
            "3",
            "--debounce-ms",
            "900",
            "--fps",
            "24",
        ])
        .unwrap();
        let config = args.effect_config(EffectConfig::default());
        assert!(!config.drawing_mode);
        assert_eq!(config.tolerance_band, 12);
        assert_eq!(config.wiggle_amount, 3);
        assert_eq!(config.debounce, Duration::from_millis(900));
        assert_eq!(config.refresh_rate_hz, 24);
    }

    #[test]
    fn input_file_replaces_the_camera() {
        let args = Args::try_parse_from(["wiggle_viewer", "--input", "clip.mp4"]).unwrap();
        assert_eq!(
            args.capture_target(),
            CaptureTarget::File(PathBuf::from("clip.mp4"))
        );
    }

    #[test]
    fn input_and_frames_are_exclusive() {
        let result =
            Args::try_parse_from(["wiggle_viewer", "--input", "clip.mp4", "--frames", "a.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn tolerance_must_fit_a_channel() {
        assert!(Args::try_parse_from(["wiggle_viewer", "--tolerance", "300"]).is_err());
    }
}
