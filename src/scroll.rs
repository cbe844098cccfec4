use crate::phase::{PhaseKey, PhaseMap};

/// Progress deltas below this magnitude do not change direction.
const DIRECTION_DEAD_ZONE: f64 = 1e-4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ScrollDirection {
    Up,
    Down,
    Idle,
}

/// One normalized reading of the scroll position.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ScrollSample {
    /// Position within the total scrollable range, in [0, 1].
    pub global_progress: f64,
    /// Band the progress falls into.
    pub phase: PhaseKey,
    /// Position within the band, linearly rescaled to [0, 1].
    pub phase_progress: f64,
    /// Sign of the progress change since the previous sample.
    pub direction: ScrollDirection,
    /// Magnitude of the progress change, scaled for thresholding.
    pub velocity: f64,
}

impl ScrollSample {
    fn initial() -> Self {
        Self {
            global_progress: 0.0,
            phase: PhaseKey::Push,
            phase_progress: 0.0,
            direction: ScrollDirection::Idle,
            velocity: 0.0,
        }
    }
}

/// Converts raw scroll geometry into [`ScrollSample`]s, tracking the previous
/// reading to derive direction and velocity.
#[derive(Clone, Debug)]
pub struct ScrollSampler {
    map: PhaseMap,
    velocity_scale: f64,
    last: ScrollSample,
}

impl Default for ScrollSampler {
    fn default() -> Self {
        Self::new(PhaseMap::default(), 1000.0)
    }
}

impl ScrollSampler {
    pub fn new(map: PhaseMap, velocity_scale: f64) -> Self {
        Self {
            map,
            velocity_scale,
            last: ScrollSample::initial(),
        }
    }

    /// The most recent sample (the initial zero sample before any input).
    pub fn last(&self) -> &ScrollSample {
        &self.last
    }

    pub fn phase_map(&self) -> &PhaseMap {
        &self.map
    }

    /// Fold a raw scroll reading into a sample.
    ///
    /// `scrollable_height` is document height minus viewport height; zero or
    /// negative (undefined geometry during load) yields progress 0 rather
    /// than a division error, and non-finite input is treated the same way.
    /// Returns `None` when the reading does not change progress, phase, or
    /// direction.
    pub fn sample(&mut self, scroll_offset: f64, scrollable_height: f64) -> Option<ScrollSample> {
        let global_progress = if scrollable_height > 0.0
            && scroll_offset.is_finite()
            && scrollable_height.is_finite()
        {
            (scroll_offset / scrollable_height).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let (phase, phase_progress) = self.map.resolve(global_progress);

        let delta = global_progress - self.last.global_progress;
        let direction = if delta > DIRECTION_DEAD_ZONE {
            ScrollDirection::Down
        } else if delta < -DIRECTION_DEAD_ZONE {
            ScrollDirection::Up
        } else {
            ScrollDirection::Idle
        };
        let velocity = delta.abs() * self.velocity_scale;

        if global_progress == self.last.global_progress
            && phase == self.last.phase
            && direction == self.last.direction
        {
            return None;
        }

        let sample = ScrollSample {
            global_progress,
            phase,
            phase_progress,
            direction,
            velocity,
        };
        self.last = sample;
        Some(sample)
    }

    /// Mark the scroll as settled: direction idle, velocity zero, position
    /// unchanged. Returns `None` when already settled.
    pub fn settle(&mut self) -> Option<ScrollSample> {
        if self.last.direction == ScrollDirection::Idle && self.last.velocity == 0.0 {
            return None;
        }
        self.last.direction = ScrollDirection::Idle;
        self.last.velocity = 0.0;
        Some(self.last)
    }

    pub fn reset(&mut self) {
        self.last = ScrollSample::initial();
    }
}
