// THEORY:
// Every failure the engine can see falls into one of a handful of buckets, and each
// bucket has a fixed policy in the render loop:
// - `DeviceAcquisition` is terminal: the loop logs it once and idles until stopped.
// - `Capture` is transient: the cycle is skipped and the next tick tries again.
// - `SourceExhausted` is a clean end of input (a file source ran out of frames).
// - `Present` is logged and the loop keeps going.
// - `InvalidConfig` only happens before the loop is ever built.
//
// Mismatched buffer lengths are deliberately absent here. The diff engine absorbs them.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WiggleError>;

#[derive(Debug, Error)]
pub enum WiggleError {
    #[error("capture device unavailable: {0}")]
    DeviceAcquisition(String),

    #[error("frame capture failed: {0}")]
    Capture(String),

    #[error("frame source exhausted")]
    SourceExhausted,

    #[error("presentation failed: {0}")]
    Present(String),

    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
}

impl WiggleError {
    pub fn invalid_config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the render loop should stop after seeing this error.
    pub fn ends_loop(&self) -> bool {
        matches!(self, Self::DeviceAcquisition(_) | Self::SourceExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_acquisition_and_exhaustion_end_the_loop() {
        assert!(WiggleError::DeviceAcquisition("no camera".into()).ends_loop());
        assert!(WiggleError::SourceExhausted.ends_loop());
        assert!(!WiggleError::Capture("short read".into()).ends_loop());
        assert!(!WiggleError::Present("window closed".into()).ends_loop());
    }

    #[test]
    fn invalid_config_names_the_field() {
        let err = WiggleError::invalid_config("refresh_rate_hz", "must be non-zero");
        assert_eq!(
            err.to_string(),
            "invalid configuration for `refresh_rate_hz`: must be non-zero"
        );
    }
}
