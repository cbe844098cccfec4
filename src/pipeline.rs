use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::{
    clock::{Clock, SystemClock},
    config::Timing,
    error::ScrollPhaseResult,
    phase::PhaseMap,
    scroll::{ScrollDirection, ScrollSample, ScrollSampler},
    store::{AnimationStore, PhaseData, SubscriptionId},
};

pub type SampleCallback = Box<dyn FnMut(&ScrollSample)>;

/// Wires the scroll sampler, phase easing, and animation store into one
/// frame-driven unit.
///
/// Raw scroll readings are recorded by [`ScrollPipeline::on_scroll`] and
/// consumed once per [`ScrollPipeline::tick`], so a flood of scroll events
/// between frames collapses to a single sample (latest reading wins). A quiet
/// period longer than the idle timeout settles the scroll context back to
/// idle.
pub struct ScrollPipeline {
    clock: Box<dyn Clock>,
    sampler: ScrollSampler,
    timing: Timing,
    store: AnimationStore,
    pending_input: Option<(f64, f64)>,
    last_input_ms: Option<u64>,
    next_subscription: u64,
    sample_listeners: Vec<(SubscriptionId, SampleCallback)>,
}

impl Default for ScrollPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrollPipeline {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock::new()))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        let timing = Timing::default();
        Self {
            clock,
            sampler: ScrollSampler::new(PhaseMap::default(), timing.velocity_scale),
            timing,
            store: AnimationStore::default(),
            pending_input: None,
            last_input_ms: None,
            next_subscription: 0,
            sample_listeners: Vec::new(),
        }
    }

    pub fn with_parts(
        map: PhaseMap,
        timing: Timing,
        clock: Box<dyn Clock>,
    ) -> ScrollPhaseResult<Self> {
        map.validate()?;
        Ok(Self {
            clock,
            sampler: ScrollSampler::new(map, timing.velocity_scale),
            timing,
            store: AnimationStore::new(timing)?,
            pending_input: None,
            last_input_ms: None,
            next_subscription: 0,
            sample_listeners: Vec::new(),
        })
    }

    pub fn store(&self) -> &AnimationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AnimationStore {
        &mut self.store
    }

    /// The most recent scroll sample (pull interface).
    pub fn sample(&self) -> &ScrollSample {
        self.sampler.last()
    }

    /// Subscribe to new scroll samples (push interface).
    pub fn on_sample<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&ScrollSample) + 'static,
    {
        let id = SubscriptionId::new(self.next_subscription);
        self.next_subscription += 1;
        self.sample_listeners.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe_sample(&mut self, id: SubscriptionId) -> bool {
        let before = self.sample_listeners.len();
        self.sample_listeners.retain(|(i, _)| *i != id);
        before != self.sample_listeners.len()
    }

    /// Record a raw scroll reading. Cheap; call from the scroll event
    /// handler as often as events arrive. Readings are folded in on the next
    /// tick, latest wins.
    pub fn on_scroll(&mut self, scroll_offset: f64, scrollable_height: f64) {
        self.pending_input = Some((scroll_offset, scrollable_height));
    }

    /// Advance the pipeline one frame: fold in pending scroll input (or
    /// settle after a quiet period), then drive the store's deferred and
    /// in-flight transitions.
    pub fn tick(&mut self) {
        let now_ms = self.clock.now_ms();

        if let Some((offset, height)) = self.pending_input.take() {
            self.last_input_ms = Some(now_ms);
            if let Some(sample) = self.sampler.sample(offset, height) {
                self.push_sample(sample, now_ms);
            }
        } else if let Some(last) = self.last_input_ms {
            if now_ms.saturating_sub(last) >= self.timing.idle_timeout_ms {
                if let Some(sample) = self.sampler.settle() {
                    self.push_sample(sample, now_ms);
                }
            }
        }

        self.store.tick(now_ms);
    }

    /// Restore the whole pipeline to its initial state. Subscribers on both
    /// the pipeline and the store are preserved.
    pub fn reset(&mut self) {
        self.sampler.reset();
        self.store.reset();
        self.pending_input = None;
        self.last_input_ms = None;
    }

    fn push_sample(&mut self, sample: ScrollSample, now_ms: u64) {
        for (id, callback) in &mut self.sample_listeners {
            let result = catch_unwind(AssertUnwindSafe(|| callback(&sample)));
            if result.is_err() {
                tracing::error!(id = ?id, "sample listener panicked");
            }
        }

        let eased_progress = sample.phase.ease().apply(sample.phase_progress);
        self.store.set_phase_data(
            PhaseData {
                phase_key: sample.phase,
                phase_progress: sample.phase_progress,
                eased_progress,
                global_progress: sample.global_progress,
                direction: sample.direction,
                velocity: sample.velocity,
                is_scrolling: sample.direction != ScrollDirection::Idle,
            },
            now_ms,
        );
    }
}
