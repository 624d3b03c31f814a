// THEORY:
// The effect used to be driven by constants baked in at build time. They now live in
// a single `EffectConfig` value handed to the `RenderLoop` when it is built, and they
// never change for the lifetime of that loop. The defaults reproduce the classic look:
// drawing mode on, a tolerance band of 20, a wiggle of 5 pixels and a 600 ms debounce.
//
// Overrides come from the environment (`WIGGLE_*`) and, in the viewer, from the command
// line on top of that. Values are parsed leniently. A malformed variable is logged and
// ignored, but a well-formed value that makes no sense (a zero refresh rate, a wiggle so
// large the padded capture cannot be allocated) is rejected by `validate`.

use crate::error::{Result, WiggleError};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_TOLERANCE_BAND: u8 = 20;
pub const DEFAULT_WIGGLE_AMOUNT: u32 = 5;
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(600);
pub const DEFAULT_REFRESH_RATE_HZ: u32 = 60;

/// Largest accepted wiggle. The jittered capture is `2 * wiggle` wider and taller than
/// the frame.
pub const MAX_WIGGLE_AMOUNT: u32 = 1024;

pub const ENV_DRAWING: &str = "WIGGLE_DRAWING";
pub const ENV_TOLERANCE: &str = "WIGGLE_TOLERANCE";
pub const ENV_WIGGLE: &str = "WIGGLE_WIGGLE";
pub const ENV_DEBOUNCE_MS: &str = "WIGGLE_DEBOUNCE_MS";
pub const ENV_REFRESH_HZ: &str = "WIGGLE_REFRESH_HZ";

/// Configuration for the effect, fixed for the lifetime of a `RenderLoop`.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectConfig {
    /// Stylised drawing: blacks out unchanged pixels and enables the jittered capture.
    pub drawing_mode: bool,
    /// Per-channel symmetric window within which a channel counts as unchanged.
    pub tolerance_band: u8,
    /// Upper bound, in pixels, of the jitter applied to the "previous" capture.
    pub wiggle_amount: u32,
    /// How long the indicator stays `Moving` after the last frame with a change.
    pub debounce: Duration,
    /// Render cadence. One cycle per tick.
    pub refresh_rate_hz: u32,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            drawing_mode: true,
            tolerance_band: DEFAULT_TOLERANCE_BAND,
            wiggle_amount: DEFAULT_WIGGLE_AMOUNT,
            debounce: DEFAULT_DEBOUNCE,
            refresh_rate_hz: DEFAULT_REFRESH_RATE_HZ,
        }
    }
}

impl EffectConfig {
    /// Defaults with any `WIGGLE_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides read through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(drawing) = parse_var::<_, bool>(&lookup, ENV_DRAWING) {
            config.drawing_mode = drawing;
        }
        if let Some(tolerance) = parse_var(&lookup, ENV_TOLERANCE) {
            config.tolerance_band = tolerance;
        }
        if let Some(wiggle) = parse_var(&lookup, ENV_WIGGLE) {
            config.wiggle_amount = wiggle;
        }
        if let Some(ms) = parse_var(&lookup, ENV_DEBOUNCE_MS) {
            config.debounce = Duration::from_millis(ms);
        }
        if let Some(hz) = parse_var(&lookup, ENV_REFRESH_HZ) {
            config.refresh_rate_hz = hz;
        }
        config
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_rate_hz == 0 {
            return Err(WiggleError::invalid_config(
                "refresh_rate_hz",
                "must be at least 1",
            ));
        }
        if self.debounce.is_zero() {
            return Err(WiggleError::invalid_config("debounce", "must be non-zero"));
        }
        if self.wiggle_amount > MAX_WIGGLE_AMOUNT {
            return Err(WiggleError::invalid_config(
                "wiggle_amount",
                format!("must be at most {MAX_WIGGLE_AMOUNT}"),
            ));
        }
        Ok(())
    }

    /// Time between two render ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.refresh_rate_hz.max(1)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw, "ignoring unparseable environment override");
            None
        }
    }
}
