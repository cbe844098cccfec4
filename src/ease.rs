#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ease {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    OutCubic,
    InOutCubic,
    OutBack,
    InOutElastic,
}

impl Ease {
    /// Evaluate the curve at `t`. Input is clamped to [0, 1] (non-finite
    /// input maps to 0); output of the overshoot curves may exceed 1 for
    /// interior `t`.
    pub fn apply(self, t: f64) -> f64 {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
            Self::OutBack => {
                const C1: f64 = 1.70158;
                const C3: f64 = C1 + 1.0;
                1.0 + C3 * (t - 1.0).powi(3) + C1 * (t - 1.0).powi(2)
            }
            Self::InOutElastic => {
                const C5: f64 = std::f64::consts::TAU / 4.5;
                if t == 0.0 {
                    0.0
                } else if t == 1.0 {
                    1.0
                } else if t < 0.5 {
                    -(2f64.powf(20.0 * t - 10.0) * ((20.0 * t - 11.125) * C5).sin()) / 2.0
                } else {
                    2f64.powf(-20.0 * t + 10.0) * ((20.0 * t - 11.125) * C5).sin() / 2.0 + 1.0
                }
            }
        }
    }

    /// True for curves that leave the [0, 1] range on interior `t`.
    pub fn overshoots(self) -> bool {
        matches!(self, Self::OutBack | Self::InOutElastic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Ease; 9] = [
        Ease::Linear,
        Ease::InQuad,
        Ease::OutQuad,
        Ease::InOutQuad,
        Ease::InCubic,
        Ease::OutCubic,
        Ease::InOutCubic,
        Ease::OutBack,
        Ease::InOutElastic,
    ];

    #[test]
    fn endpoints_are_stable() {
        for ease in ALL {
            // OutBack lands within one ulp of zero rather than exactly on it.
            assert!(ease.apply(0.0).abs() < 1e-12, "{ease:?}");
            assert_eq!(ease.apply(1.0), 1.0, "{ease:?}");
        }
    }

    #[test]
    fn monotonic_spot_check() {
        for ease in ALL {
            if ease.overshoots() {
                continue;
            }
            let a = ease.apply(0.25);
            let b = ease.apply(0.5);
            let c = ease.apply(0.75);
            assert!(a < b, "{ease:?}");
            assert!(b < c, "{ease:?}");
        }
    }

    #[test]
    fn out_back_overshoots_near_the_end() {
        assert!(Ease::OutBack.apply(0.7) > 1.0);
        assert!(Ease::OutBack.apply(0.99) > 1.0);
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        assert_eq!(Ease::InQuad.apply(-1.0), 0.0);
        assert_eq!(Ease::InQuad.apply(2.0), 1.0);
        assert_eq!(Ease::Linear.apply(f64::NAN), 0.0);
    }
}
