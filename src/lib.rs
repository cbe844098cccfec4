#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod ease;
pub mod error;
pub mod interp;
pub mod machine;
pub mod phase;
pub mod pipeline;
pub mod scroll;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Timing;
pub use ease::Ease;
pub use error::{ScrollPhaseError, ScrollPhaseResult};
pub use interp::{Lerp, interpolate};
pub use machine::{AnimationState, TransitionEvent, can_transition, state_for_phase};
pub use phase::{PHASE_BOUNDARIES, PhaseConfig, PhaseKey, PhaseMap};
pub use pipeline::ScrollPipeline;
pub use scroll::{ScrollDirection, ScrollSample, ScrollSampler};
pub use store::{
    AnimationStore, PhaseData, PhaseView, ScrollContext, Snapshot, SubscriptionId,
    TransitionContext, TransitionView,
};
