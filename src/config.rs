use crate::error::{ScrollPhaseError, ScrollPhaseResult};

/// Tunable constants for the transition pipeline. Defaults mirror the tuning
/// the narrative was authored against; the logic itself makes no assumption
/// about these values beyond what `validate` enforces.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Timing {
    /// Duration of an animated state transition, also the debounce window.
    pub transition_duration_ms: u64,
    /// Velocity above which rapid updates inside the window are deferred.
    pub velocity_threshold: f64,
    /// Quiet period after which scroll input is considered settled.
    pub idle_timeout_ms: u64,
    /// Velocity below which direction changes are treated as scroll jitter.
    pub bounce_threshold: f64,
    /// Multiplier from per-sample progress delta to the velocity scale used
    /// by the thresholds above.
    pub velocity_scale: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            transition_duration_ms: 300,
            velocity_threshold: 0.5,
            idle_timeout_ms: 150,
            bounce_threshold: 0.01,
            velocity_scale: 1000.0,
        }
    }
}

impl Timing {
    pub fn validate(&self) -> ScrollPhaseResult<()> {
        if self.transition_duration_ms == 0 {
            return Err(ScrollPhaseError::config(
                "transition_duration_ms must be > 0",
            ));
        }
        for (name, value) in [
            ("velocity_threshold", self.velocity_threshold),
            ("bounce_threshold", self.bounce_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ScrollPhaseError::config(format!(
                    "{name} must be finite and >= 0"
                )));
            }
        }
        if !self.velocity_scale.is_finite() || self.velocity_scale <= 0.0 {
            return Err(ScrollPhaseError::config(
                "velocity_scale must be finite and > 0",
            ));
        }
        Ok(())
    }
}
