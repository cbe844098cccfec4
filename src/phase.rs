use crate::{
    ease::Ease,
    error::{ScrollPhaseError, ScrollPhaseResult},
};

/// Canonical band edges over the normalized scroll range. Five contiguous
/// bands: band `i` covers `[BOUNDARIES[i], BOUNDARIES[i + 1])`, with 1.0
/// belonging to the last band.
pub const PHASE_BOUNDARIES: [f64; 6] = [0.0, 0.2, 0.4, 0.6, 0.8, 1.0];

/// The five narrative segments of the scroll range, in scroll order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PhaseKey {
    Push,
    Summit,
    Fall,
    Despair,
    Reveal,
}

impl PhaseKey {
    pub const ALL: [Self; 5] = [
        Self::Push,
        Self::Summit,
        Self::Fall,
        Self::Despair,
        Self::Reveal,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn config(self) -> &'static PhaseConfig {
        &PHASE_CONFIGS[self.index()]
    }

    pub fn name(self) -> &'static str {
        self.config().name
    }

    /// The easing curve applied to intra-phase progress for this phase.
    pub fn ease(self) -> Ease {
        match self {
            Self::Push => Ease::InOutQuad,
            Self::Summit => Ease::OutCubic,
            Self::Fall => Ease::InCubic,
            Self::Despair => Ease::InOutQuad,
            Self::Reveal => Ease::OutBack,
        }
    }
}

impl std::fmt::Display for PhaseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct PhaseConfig {
    pub start: f64,
    pub end: f64,
    pub name: &'static str,
    pub description: &'static str,
}

// Insertion order matches PhaseKey order.
pub static PHASE_CONFIGS: [PhaseConfig; 5] = [
    PhaseConfig {
        start: 0.0,
        end: 0.2,
        name: "Push",
        description: "Sisyphus pushes the boulder uphill",
    },
    PhaseConfig {
        start: 0.2,
        end: 0.4,
        name: "Summit",
        description: "Reaching the peak moment",
    },
    PhaseConfig {
        start: 0.4,
        end: 0.6,
        name: "Fall",
        description: "Boulder rolls back down",
    },
    PhaseConfig {
        start: 0.6,
        end: 0.8,
        name: "Despair",
        description: "Moment of existential reflection",
    },
    PhaseConfig {
        start: 0.8,
        end: 1.0,
        name: "Reveal",
        description: "OlympusCode brand reveal",
    },
];

/// Validated band table mapping global progress onto phases.
///
/// The default map uses [`PHASE_BOUNDARIES`]; custom maps keep the same
/// five-band structure but may move the interior edges.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseMap {
    boundaries: [f64; 6],
}

impl Default for PhaseMap {
    fn default() -> Self {
        Self {
            boundaries: PHASE_BOUNDARIES,
        }
    }
}

impl PhaseMap {
    pub fn new(boundaries: [f64; 6]) -> ScrollPhaseResult<Self> {
        let map = Self { boundaries };
        map.validate()?;
        Ok(map)
    }

    pub fn validate(&self) -> ScrollPhaseResult<()> {
        if self.boundaries.iter().any(|b| !b.is_finite()) {
            return Err(ScrollPhaseError::validation(
                "phase boundaries must be finite",
            ));
        }
        if self.boundaries[0] != 0.0 || self.boundaries[5] != 1.0 {
            return Err(ScrollPhaseError::validation(
                "phase boundaries must span [0, 1]",
            ));
        }
        if !self.boundaries.windows(2).all(|w| w[0] < w[1]) {
            return Err(ScrollPhaseError::validation(
                "phase boundaries must be strictly increasing",
            ));
        }
        Ok(())
    }

    pub fn boundaries(&self) -> &[f64; 6] {
        &self.boundaries
    }

    pub fn band(&self, key: PhaseKey) -> (f64, f64) {
        let i = key.index();
        (self.boundaries[i], self.boundaries[i + 1])
    }

    /// Map global progress onto `(phase, intra-phase progress)`.
    ///
    /// Input is clamped to [0, 1] (non-finite maps to 0). Exactly 1.0 is
    /// below no band's end, so it is handled as the explicit terminal case:
    /// last phase, progress 1.
    pub fn resolve(&self, global_progress: f64) -> (PhaseKey, f64) {
        let p = if global_progress.is_finite() {
            global_progress.clamp(0.0, 1.0)
        } else {
            0.0
        };

        for (i, key) in PhaseKey::ALL.iter().enumerate() {
            let start = self.boundaries[i];
            let end = self.boundaries[i + 1];
            if p >= start && p < end {
                return (*key, (p - start) / (end - start));
            }
        }

        (PhaseKey::Reveal, 1.0)
    }
}
