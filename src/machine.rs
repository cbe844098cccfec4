use crate::{phase::PhaseKey, scroll::ScrollDirection};

/// Narrative states driving the visual and audio subsystems. `Idle` exists
/// only before the first forward transition or after a reset; the other five
/// correspond one-to-one with [`PhaseKey`]s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum AnimationState {
    Idle,
    Pushing,
    Summit,
    Falling,
    Despair,
    Reveal,
}

impl AnimationState {
    /// States reachable in a single transition. The narrative advances or
    /// retreats one phase at a time; skipping is never valid.
    pub fn successors(self) -> &'static [AnimationState] {
        match self {
            Self::Idle => &[Self::Pushing],
            Self::Pushing => &[Self::Summit, Self::Idle],
            Self::Summit => &[Self::Falling, Self::Pushing],
            Self::Falling => &[Self::Despair, Self::Summit],
            Self::Despair => &[Self::Reveal, Self::Falling],
            Self::Reveal => &[Self::Despair],
        }
    }
}

pub fn can_transition(from: AnimationState, to: AnimationState) -> bool {
    from != to && from.successors().contains(&to)
}

pub fn state_for_phase(key: PhaseKey) -> AnimationState {
    match key {
        PhaseKey::Push => AnimationState::Pushing,
        PhaseKey::Summit => AnimationState::Summit,
        PhaseKey::Fall => AnimationState::Falling,
        PhaseKey::Despair => AnimationState::Despair,
        PhaseKey::Reveal => AnimationState::Reveal,
    }
}

/// Emitted once per committed transition.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct TransitionEvent {
    pub from: AnimationState,
    pub to: AnimationState,
    pub phase_key: PhaseKey,
    pub direction: ScrollDirection,
    pub velocity: f64,
    pub timestamp_ms: u64,
}
