use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::{
    config::Timing,
    error::ScrollPhaseResult,
    machine::{AnimationState, TransitionEvent, can_transition, state_for_phase},
    phase::PhaseKey,
    scroll::ScrollDirection,
};

pub type StateChangeCallback = Box<dyn FnMut(AnimationState, Option<AnimationState>)>;
pub type TransitionCallback = Box<dyn FnMut(&TransitionEvent)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Resolved phase data pushed into the store once per accepted scroll sample.
#[derive(Clone, Copy, Debug)]
pub struct PhaseData {
    pub phase_key: PhaseKey,
    pub phase_progress: f64,
    pub eased_progress: f64,
    pub global_progress: f64,
    pub direction: ScrollDirection,
    pub velocity: f64,
    pub is_scrolling: bool,
}

impl PhaseData {
    fn context(&self) -> TransitionContext {
        TransitionContext {
            phase_key: self.phase_key,
            direction: self.direction,
            velocity: self.velocity,
        }
    }
}

/// Scroll context carried along with a transition request, echoed into the
/// resulting [`TransitionEvent`].
#[derive(Clone, Copy, Debug)]
pub struct TransitionContext {
    pub phase_key: PhaseKey,
    pub direction: ScrollDirection,
    pub velocity: f64,
}

/// Point-in-time view of the store, safe to hand to any consumer.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct Snapshot {
    pub state: AnimationState,
    pub previous_state: Option<AnimationState>,
    pub phase_key: PhaseKey,
    pub phase_progress: f64,
    pub eased_progress: f64,
    pub global_progress: f64,
    pub direction: ScrollDirection,
    pub velocity: f64,
    pub is_scrolling: bool,
    pub is_transitioning: bool,
    pub transition_progress: f64,
    pub transition_start_ms: Option<u64>,
}

impl Snapshot {
    pub fn phase(&self) -> usize {
        self.phase_key.index()
    }
}

/// Scroll context view, mirroring the snapshot's scroll fields.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct ScrollContext {
    pub direction: ScrollDirection,
    pub velocity: f64,
    pub is_scrolling: bool,
}

/// Phase/progress view for consumers that only track progress.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct PhaseView {
    pub phase_key: PhaseKey,
    pub phase_progress: f64,
    pub eased_progress: f64,
    pub global_progress: f64,
}

/// Transition view for consumers that only blend across transitions.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct TransitionView {
    pub is_transitioning: bool,
    pub progress: f64,
    pub start_ms: Option<u64>,
}

/// Debounce sub-state: either settled, or holding the latest deferred target
/// until its deadline. Rapid requests replace the target (last write wins);
/// they are never queued.
#[derive(Clone, Copy, Debug)]
enum PendingTransition {
    Settled,
    Pending {
        target: AnimationState,
        context: TransitionContext,
        deadline_ms: u64,
    },
}

#[derive(Clone, Copy, Debug)]
struct ActiveTransition {
    target: AnimationState,
    context: TransitionContext,
    start_ms: u64,
}

/// Canonical owner of the narrative state.
///
/// All writes go through the methods below; consumers read [`Snapshot`]s or
/// subscribe to change notifications. The store holds no timers of its own:
/// callers stamp every write with `now_ms` and drive deferred work by calling
/// [`AnimationStore::tick`] once per frame, which keeps cancellation (reset,
/// unmount) a plain state change rather than a race.
pub struct AnimationStore {
    timing: Timing,

    state: AnimationState,
    previous_state: Option<AnimationState>,

    phase_key: PhaseKey,
    phase_progress: f64,
    eased_progress: f64,
    global_progress: f64,

    direction: ScrollDirection,
    velocity: f64,
    is_scrolling: bool,

    transition_progress: f64,
    active: Option<ActiveTransition>,
    pending: PendingTransition,
    last_state_change_ms: u64,

    next_subscription: u64,
    state_listeners: Vec<(SubscriptionId, StateChangeCallback)>,
    transition_listeners: Vec<(SubscriptionId, TransitionCallback)>,
}

impl Default for AnimationStore {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            state: AnimationState::Idle,
            previous_state: None,
            phase_key: PhaseKey::Push,
            phase_progress: 0.0,
            eased_progress: 0.0,
            global_progress: 0.0,
            direction: ScrollDirection::Idle,
            velocity: 0.0,
            is_scrolling: false,
            transition_progress: 0.0,
            active: None,
            pending: PendingTransition::Settled,
            last_state_change_ms: 0,
            next_subscription: 0,
            state_listeners: Vec::new(),
            transition_listeners: Vec::new(),
        }
    }
}

impl AnimationStore {
    pub fn new(timing: Timing) -> ScrollPhaseResult<Self> {
        timing.validate()?;
        Ok(Self {
            timing,
            ..Self::default()
        })
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn previous_state(&self) -> Option<AnimationState> {
        self.previous_state
    }

    pub fn phase_key(&self) -> PhaseKey {
        self.phase_key
    }

    pub fn is_transitioning(&self) -> bool {
        self.active.is_some()
    }

    pub fn transition_progress(&self) -> f64 {
        self.transition_progress
    }

    pub fn scroll_context(&self) -> ScrollContext {
        ScrollContext {
            direction: self.direction,
            velocity: self.velocity,
            is_scrolling: self.is_scrolling,
        }
    }

    pub fn phase_view(&self) -> PhaseView {
        PhaseView {
            phase_key: self.phase_key,
            phase_progress: self.phase_progress,
            eased_progress: self.eased_progress,
            global_progress: self.global_progress,
        }
    }

    pub fn transition_view(&self) -> TransitionView {
        TransitionView {
            is_transitioning: self.active.is_some(),
            progress: self.transition_progress,
            start_ms: self.active.map(|a| a.start_ms),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            previous_state: self.previous_state,
            phase_key: self.phase_key,
            phase_progress: self.phase_progress,
            eased_progress: self.eased_progress,
            global_progress: self.global_progress,
            direction: self.direction,
            velocity: self.velocity,
            is_scrolling: self.is_scrolling,
            is_transitioning: self.active.is_some(),
            transition_progress: self.transition_progress,
            transition_start_ms: self.active.map(|a| a.start_ms),
        }
    }

    /// Subscribe to committed state changes. Callbacks receive the new and
    /// previous state, are invoked synchronously after the write is already
    /// committed, and survive [`AnimationStore::reset`].
    pub fn on_state_change<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(AnimationState, Option<AnimationState>) + 'static,
    {
        let id = self.next_id();
        self.state_listeners.push((id, Box::new(callback)));
        id
    }

    /// Subscribe to [`TransitionEvent`]s, one per committed transition.
    pub fn on_transition<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&TransitionEvent) + 'static,
    {
        let id = self.next_id();
        self.transition_listeners.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.state_listeners.len() + self.transition_listeners.len();
        self.state_listeners.retain(|(i, _)| *i != id);
        self.transition_listeners.retain(|(i, _)| *i != id);
        before != self.state_listeners.len() + self.transition_listeners.len()
    }

    /// Apply a fresh phase-data update.
    ///
    /// The phase and scroll fields are stored unconditionally; whether the
    /// update also commits a state transition depends on the bounce and
    /// debounce guards and on the adjacency table. Returns `true` when a
    /// transition was started immediately, `false` when the update was a
    /// no-op, suppressed, deferred, or rejected.
    #[tracing::instrument(level = "trace", skip(self))]
    pub fn set_phase_data(&mut self, data: PhaseData, now_ms: u64) -> bool {
        let data = sanitize(data);

        self.phase_key = data.phase_key;
        self.phase_progress = data.phase_progress;
        self.eased_progress = data.eased_progress;
        self.global_progress = data.global_progress;
        self.direction = data.direction;
        self.velocity = data.velocity;
        self.is_scrolling = data.is_scrolling;

        let target = state_for_phase(data.phase_key);
        if target == self.state && self.active.is_none() {
            return false;
        }
        if let Some(active) = self.active {
            if active.target == target {
                return false;
            }
        }

        // Bounce protection: direction flips below the velocity floor are
        // scroll jitter, not intent.
        if data.velocity.abs() < self.timing.bounce_threshold
            && data.direction != ScrollDirection::Idle
        {
            tracing::debug!(?target, velocity = data.velocity, "bounce suppressed");
            return false;
        }

        self.request_transition(target, data.context(), now_ms)
    }

    /// Request a transition to `target`, subject to debounce and the
    /// adjacency table. Fast scrolling inside the debounce window defers the
    /// request; an invalid target is rejected with a `false` return, never an
    /// error.
    pub fn request_transition(
        &mut self,
        target: AnimationState,
        context: TransitionContext,
        now_ms: u64,
    ) -> bool {
        let elapsed = now_ms.saturating_sub(self.last_state_change_ms);
        let window = self.timing.transition_duration_ms;

        if elapsed < window && context.velocity > self.timing.velocity_threshold {
            let keep = matches!(
                self.pending,
                PendingTransition::Pending { target: t, .. } if t == target
            );
            if !keep {
                self.pending = PendingTransition::Pending {
                    target,
                    context,
                    deadline_ms: now_ms + (window - elapsed),
                };
                tracing::debug!(?target, "transition deferred past debounce window");
            }
            return false;
        }

        if !can_transition(self.state, target) {
            tracing::debug!(from = ?self.state, to = ?target, "transition rejected");
            return false;
        }

        self.begin_transition(target, context, now_ms);
        true
    }

    /// Advance deferred and in-flight work to `now_ms`. Call once per frame.
    pub fn tick(&mut self, now_ms: u64) {
        if let PendingTransition::Pending {
            target,
            context,
            deadline_ms,
        } = self.pending
        {
            if now_ms >= deadline_ms {
                self.pending = PendingTransition::Settled;
                if can_transition(self.state, target) {
                    self.begin_transition(target, context, now_ms);
                } else {
                    tracing::debug!(from = ?self.state, to = ?target, "deferred transition rejected");
                }
            }
        }

        if let Some(active) = self.active {
            let duration = self.timing.transition_duration_ms.max(1);
            let elapsed = now_ms.saturating_sub(active.start_ms);
            let progress = (elapsed as f64 / duration as f64).min(1.0);
            if progress < 1.0 {
                self.transition_progress = progress;
            } else {
                self.commit(active, now_ms);
            }
        }
    }

    /// Set the state directly, bypassing every guard: cancels pending and
    /// in-flight transitions, marks the transition complete, and notifies
    /// listeners if the value actually changed. The escape hatch for
    /// programmatic seeking, initialization, and tests.
    pub fn set_state_immediate(&mut self, target: AnimationState, now_ms: u64) {
        self.pending = PendingTransition::Settled;
        self.active = None;
        self.transition_progress = 1.0;
        self.last_state_change_ms = now_ms;

        if target == self.state {
            return;
        }

        let previous = self.state;
        self.state = target;
        self.previous_state = Some(previous);

        let event = TransitionEvent {
            from: previous,
            to: target,
            phase_key: self.phase_key,
            direction: self.direction,
            velocity: self.velocity,
            timestamp_ms: now_ms,
        };
        self.notify(&event);
    }

    /// Restore initial state. Cancels pending and in-flight transitions but
    /// preserves the subscriber set.
    pub fn reset(&mut self) {
        self.state = AnimationState::Idle;
        self.previous_state = None;
        self.phase_key = PhaseKey::Push;
        self.phase_progress = 0.0;
        self.eased_progress = 0.0;
        self.global_progress = 0.0;
        self.direction = ScrollDirection::Idle;
        self.velocity = 0.0;
        self.is_scrolling = false;
        self.transition_progress = 0.0;
        self.active = None;
        self.pending = PendingTransition::Settled;
        self.last_state_change_ms = 0;
    }

    fn next_id(&mut self) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        id
    }

    fn begin_transition(&mut self, target: AnimationState, context: TransitionContext, now_ms: u64) {
        self.pending = PendingTransition::Settled;
        self.transition_progress = 0.0;
        self.active = Some(ActiveTransition {
            target,
            context,
            start_ms: now_ms,
        });
    }

    fn commit(&mut self, active: ActiveTransition, now_ms: u64) {
        let previous = self.state;
        self.state = active.target;
        self.previous_state = Some(previous);
        self.active = None;
        self.transition_progress = 1.0;
        self.last_state_change_ms = now_ms;

        let event = TransitionEvent {
            from: previous,
            to: active.target,
            phase_key: active.context.phase_key,
            direction: active.context.direction,
            velocity: active.context.velocity,
            timestamp_ms: now_ms,
        };
        self.notify(&event);
    }

    // All fields are committed before this runs, so a listener reading the
    // snapshot it was handed sees consistent state. A panicking listener is
    // logged and must not block the rest.
    fn notify(&mut self, event: &TransitionEvent) {
        for (id, callback) in &mut self.state_listeners {
            let result = catch_unwind(AssertUnwindSafe(|| callback(event.to, Some(event.from))));
            if result.is_err() {
                tracing::error!(id = id.0, "state-change listener panicked");
            }
        }
        for (id, callback) in &mut self.transition_listeners {
            let result = catch_unwind(AssertUnwindSafe(|| callback(event)));
            if result.is_err() {
                tracing::error!(id = id.0, "transition listener panicked");
            }
        }
    }
}

fn sanitize(mut data: PhaseData) -> PhaseData {
    data.phase_progress = unit(data.phase_progress);
    data.global_progress = unit(data.global_progress);
    data.eased_progress = if data.eased_progress.is_finite() {
        data.eased_progress
    } else {
        0.0
    };
    data.velocity = if data.velocity.is_finite() {
        data.velocity
    } else {
        0.0
    };
    data
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    fn data(phase_key: PhaseKey, direction: ScrollDirection, velocity: f64) -> PhaseData {
        PhaseData {
            phase_key,
            phase_progress: 0.5,
            eased_progress: 0.5,
            global_progress: phase_key.config().start + 0.1,
            direction,
            velocity,
            is_scrolling: direction != ScrollDirection::Idle,
        }
    }

    fn ctx(phase_key: PhaseKey, velocity: f64) -> TransitionContext {
        TransitionContext {
            phase_key,
            direction: ScrollDirection::Down,
            velocity,
        }
    }

    /// Drive a store through begin + commit of one transition.
    fn commit_transition(store: &mut AnimationStore, phase_key: PhaseKey, now_ms: u64) {
        assert!(store.set_phase_data(data(phase_key, ScrollDirection::Down, 0.3), now_ms));
        store.tick(now_ms + store.timing.transition_duration_ms);
    }

    #[test]
    fn phase_fields_update_even_without_transition() {
        let mut store = AnimationStore::default();
        // Micro-movement: suppressed by bounce protection.
        let accepted = store.set_phase_data(data(PhaseKey::Push, ScrollDirection::Down, 0.001), 0);
        assert!(!accepted);
        assert_eq!(store.state(), AnimationState::Idle);
        assert_eq!(store.phase_key(), PhaseKey::Push);
        assert_eq!(store.snapshot().phase_progress, 0.5);
        assert_eq!(store.phase_view().eased_progress, 0.5);
        assert!(store.scroll_context().is_scrolling);
    }

    #[test]
    fn bounce_never_commits_a_state_change() {
        let mut store = AnimationStore::default();
        store.set_phase_data(data(PhaseKey::Push, ScrollDirection::Down, 0.009), 1_000);
        store.tick(2_000);
        assert_eq!(store.state(), AnimationState::Idle);
        assert!(!store.is_transitioning());
    }

    #[test]
    fn idle_direction_bypasses_bounce_guard() {
        let mut store = AnimationStore::default();
        let accepted = store.set_phase_data(data(PhaseKey::Push, ScrollDirection::Idle, 0.0), 1_000);
        assert!(accepted);
        assert!(store.is_transitioning());
    }

    #[test]
    fn transition_animates_then_commits() {
        let mut store = AnimationStore::default();
        assert!(store.set_phase_data(data(PhaseKey::Push, ScrollDirection::Down, 0.3), 1_000));
        assert!(store.is_transitioning());
        assert_eq!(store.state(), AnimationState::Idle);

        store.tick(1_150);
        assert!(store.is_transitioning());
        assert!((store.transition_progress() - 0.5).abs() < 1e-12);
        let view = store.transition_view();
        assert!(view.is_transitioning);
        assert_eq!(view.start_ms, Some(1_000));

        store.tick(1_300);
        assert!(!store.is_transitioning());
        assert_eq!(store.state(), AnimationState::Pushing);
        assert_eq!(store.previous_state(), Some(AnimationState::Idle));
        assert_eq!(store.transition_progress(), 1.0);
    }

    #[test]
    fn invalid_transition_is_rejected_not_thrown() {
        let mut store = AnimationStore::default();
        let accepted = store.set_phase_data(data(PhaseKey::Reveal, ScrollDirection::Down, 0.3), 1_000);
        assert!(!accepted);
        assert_eq!(store.state(), AnimationState::Idle);
    }

    #[test]
    fn debounce_keeps_only_the_latest_target() {
        let mut store = AnimationStore::default();
        commit_transition(&mut store, PhaseKey::Push, 1_000);
        assert_eq!(store.state(), AnimationState::Pushing);

        // Two fast requests inside the window; only the second survives.
        assert!(!store.request_transition(AnimationState::Summit, ctx(PhaseKey::Summit, 2.0), 1_350));
        assert!(!store.request_transition(AnimationState::Idle, ctx(PhaseKey::Push, 2.0), 1_400));

        store.tick(1_600);
        store.tick(1_900);
        assert_eq!(store.state(), AnimationState::Idle);
        assert_eq!(store.previous_state(), Some(AnimationState::Pushing));
    }

    #[test]
    fn slow_scrolling_is_not_debounced() {
        let mut store = AnimationStore::default();
        commit_transition(&mut store, PhaseKey::Push, 1_000);
        // Inside the window but below the velocity threshold.
        assert!(store.request_transition(AnimationState::Summit, ctx(PhaseKey::Summit, 0.3), 1_350));
    }

    #[test]
    fn deferred_transition_is_revalidated_at_the_deadline() {
        let mut store = AnimationStore::default();
        commit_transition(&mut store, PhaseKey::Push, 1_000);
        // Falling is not adjacent to Pushing; the deferral must not commit it.
        assert!(!store.request_transition(AnimationState::Falling, ctx(PhaseKey::Fall, 2.0), 1_350));
        store.tick(1_600);
        store.tick(1_900);
        assert_eq!(store.state(), AnimationState::Pushing);
    }

    #[test]
    fn set_state_immediate_bypasses_guards() {
        let mut store = AnimationStore::default();
        store.set_state_immediate(AnimationState::Despair, 1_000);
        assert_eq!(store.state(), AnimationState::Despair);
        assert!(!store.is_transitioning());
        assert_eq!(store.transition_progress(), 1.0);
    }

    #[test]
    fn reset_restores_initial_state_but_keeps_listeners() {
        let mut store = AnimationStore::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.on_state_change(move |state, _| sink.borrow_mut().push(state));

        commit_transition(&mut store, PhaseKey::Push, 1_000);
        store.reset();
        assert_eq!(store.state(), AnimationState::Idle);
        assert_eq!(store.previous_state(), None);
        assert_eq!(store.phase_key(), PhaseKey::Push);
        assert_eq!(store.snapshot().global_progress, 0.0);

        commit_transition(&mut store, PhaseKey::Push, 10_000);
        assert_eq!(
            *seen.borrow(),
            vec![AnimationState::Pushing, AnimationState::Pushing]
        );
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let mut store = AnimationStore::default();
        store.on_state_change(|_, _| panic!("bad listener"));
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        store.on_state_change(move |_, _| *sink.borrow_mut() += 1);

        store.set_state_immediate(AnimationState::Pushing, 1_000);
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(store.state(), AnimationState::Pushing);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let mut store = AnimationStore::default();
        let seen = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&seen);
        let id = store.on_state_change(move |_, _| *sink.borrow_mut() += 1);

        store.set_state_immediate(AnimationState::Pushing, 1_000);
        assert!(store.unsubscribe(id));
        store.set_state_immediate(AnimationState::Summit, 2_000);
        assert_eq!(*seen.borrow(), 1);
        assert!(!store.unsubscribe(id));
    }

    #[test]
    fn transition_event_carries_scroll_context() {
        let mut store = AnimationStore::default();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.on_transition(move |e| sink.borrow_mut().push(*e));

        assert!(store.set_phase_data(data(PhaseKey::Push, ScrollDirection::Down, 0.3), 1_000));
        store.tick(1_300);

        let events = events.borrow();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].from, AnimationState::Idle);
        assert_eq!(events[0].to, AnimationState::Pushing);
        assert_eq!(events[0].phase_key, PhaseKey::Push);
        assert_eq!(events[0].direction, ScrollDirection::Down);
        assert_eq!(events[0].velocity, 0.3);
        assert_eq!(events[0].timestamp_ms, 1_300);
    }

    #[test]
    fn malformed_input_is_clamped() {
        let mut store = AnimationStore::default();
        let bad = PhaseData {
            phase_key: PhaseKey::Push,
            phase_progress: f64::NAN,
            eased_progress: f64::INFINITY,
            global_progress: 7.0,
            direction: ScrollDirection::Down,
            velocity: f64::NAN,
            is_scrolling: true,
        };
        store.set_phase_data(bad, 1_000);
        let snap = store.snapshot();
        assert_eq!(snap.phase_progress, 0.0);
        assert_eq!(snap.eased_progress, 0.0);
        assert_eq!(snap.global_progress, 1.0);
        assert_eq!(snap.velocity, 0.0);
    }
}
