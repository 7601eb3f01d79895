//! State machine runtime

use core::mem;

use super::event::{Event, EventHandlingOutcome, EventHandlingResult};
use crate::container::FixedCapacityVector;
use crate::error::{expect, fatal_error, ErrorCode};

/// Maximum state nesting depth, not counting the top state
pub const MAX_NESTING_DEPTH: usize = 8;

/// State event handler
///
/// A handler describes one state: on [`Event::Discovery`] it reports its
/// superstate, on the other pseudo-events it runs the corresponding actions
/// or defers, and on application events it handles, transitions or defers.
///
/// A state is identified by its handler's address. Handlers must be named
/// non-generic functions; closures coerced at different sites and generic
/// functions instantiated in several crates do not have a single address.
pub type StateHandler<C, E> = fn(&mut Hsm<C, E>, Event<'_, E>) -> EventHandlingResult;

type Path<C, E> = FixedCapacityVector<StateHandler<C, E>, MAX_NESTING_DEPTH>;

/// The state a handler named when it returned
enum Slot<C, E> {
    Empty,
    InitialPseudostate(StateHandler<C, E>),
    Target(StateHandler<C, E>),
    Superstate(StateHandler<C, E>),
}

/// Hierarchical state machine
///
/// Owns the application context `C` that handlers operate on and
/// dispatches application events of type `E`.
pub struct Hsm<C, E> {
    context: C,
    current: Option<StateHandler<C, E>>,
    slot: Slot<C, E>,
}

impl<C, E> Hsm<C, E> {
    pub fn new(context: C, initial_pseudostate: StateHandler<C, E>) -> Self {
        Self {
            context,
            current: None,
            slot: Slot::InitialPseudostate(initial_pseudostate),
        }
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }

    pub fn into_context(self) -> C {
        self.context
    }

    /// The active leaf state, `None` until the topmost initial transition
    pub fn current_state(&self) -> Option<StateHandler<C, E>> {
        self.current
    }

    /// The implicit top state, which ignores every event
    ///
    /// States without an explicit superstate defer to it. Kept out of line
    /// so every reference to it resolves to the same address.
    #[inline(never)]
    pub fn top(_hsm: &mut Self, _event: Event<'_, E>) -> EventHandlingResult {
        EventHandlingResult::new(EventHandlingOutcome::EventIgnored)
    }

    /// Report that the event was handled
    pub fn event_handled(&mut self) -> EventHandlingResult {
        EventHandlingResult::new(EventHandlingOutcome::EventHandled)
    }

    /// Report that the event triggers a transition to `target`
    pub fn transition_to(&mut self, target: StateHandler<C, E>) -> EventHandlingResult {
        self.slot = Slot::Target(target);
        EventHandlingResult::new(EventHandlingOutcome::StateTransitionTriggered)
    }

    /// Report that `superstate` should handle the event
    pub fn defer_event_handling_to(
        &mut self,
        superstate: StateHandler<C, E>,
    ) -> EventHandlingResult {
        self.slot = Slot::Superstate(superstate);
        EventHandlingResult::new(EventHandlingOutcome::EventHandlingDeferredToSuperstate)
    }

    /// Run the transition out of the initial pseudostate
    ///
    /// Must be called exactly once, before any dispatch. The initial
    /// pseudostate handler receives `event` and must transition; nested
    /// initial transitions are then followed down to a leaf state.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn execute_topmost_initial_transition(&mut self, event: &E) {
        expect(self.current.is_none(), ErrorCode::LogicError);
        let initial_pseudostate = match self.take_slot() {
            Slot::InitialPseudostate(handler) => handler,
            _ => fatal_error(ErrorCode::LogicError),
        };

        let result = initial_pseudostate(self, Event::Application(event));
        let target = match (result.outcome(), self.take_slot()) {
            (EventHandlingOutcome::StateTransitionTriggered, Slot::Target(target)) => target,
            _ => fatal_error(ErrorCode::UnexpectedEventHandlingResult),
        };

        let top: StateHandler<C, E> = Self::top;
        self.current = Some(top);
        self.transition_from(top, target);
    }

    /// Deliver `event`, starting at the current state and walking up through
    /// superstates until a handler handles it or triggers a transition
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn dispatch(&mut self, event: &E) {
        let Some(mut state) = self.current else {
            fatal_error(ErrorCode::LogicError);
        };

        loop {
            let result = state(self, Event::Application(event));
            match (result.outcome(), self.take_slot()) {
                (EventHandlingOutcome::EventHandled | EventHandlingOutcome::EventIgnored, _) => {
                    return
                }
                (EventHandlingOutcome::StateTransitionTriggered, Slot::Target(target)) => {
                    self.transition_from(state, target);
                    return;
                }
                (
                    EventHandlingOutcome::EventHandlingDeferredToSuperstate,
                    Slot::Superstate(superstate),
                ) => state = superstate,
                _ => fatal_error(ErrorCode::UnexpectedEventHandlingResult),
            }
        }
    }

    /// Check if `state` is the current state or one of its superstates
    ///
    /// The top state is always active once the machine has started.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn is_in(&mut self, state: StateHandler<C, E>) -> bool {
        let Some(mut active) = self.current else {
            fatal_error(ErrorCode::LogicError);
        };

        loop {
            if same_state(active, state) {
                return true;
            }
            if self.is_top(active) {
                return false;
            }
            active = self.superstate_of(active);
        }
    }

    fn take_slot(&mut self) -> Slot<C, E> {
        mem::replace(&mut self.slot, Slot::Empty)
    }

    fn is_top(&self, state: StateHandler<C, E>) -> bool {
        same_state(state, Self::top)
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn superstate_of(&mut self, state: StateHandler<C, E>) -> StateHandler<C, E> {
        let result = state(self, Event::Discovery);
        match (result.outcome(), self.take_slot()) {
            (
                EventHandlingOutcome::EventHandlingDeferredToSuperstate,
                Slot::Superstate(superstate),
            ) => superstate,
            _ => fatal_error(ErrorCode::UnexpectedEventHandlingResult),
        }
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn run_action(&mut self, state: StateHandler<C, E>, event: Event<'_, E>) {
        let result = state(self, event);
        match result.outcome() {
            EventHandlingOutcome::EventHandled => {}
            EventHandlingOutcome::EventHandlingDeferredToSuperstate => {
                self.take_slot();
            }
            _ => fatal_error(ErrorCode::UnexpectedEventHandlingResult),
        }
    }

    fn enter(&mut self, state: StateHandler<C, E>) {
        self.run_action(state, Event::Entry);
    }

    fn exit(&mut self, state: StateHandler<C, E>) {
        self.run_action(state, Event::Exit);
    }

    /// Path from `from` towards the top state, stopping before `to`
    ///
    /// The flag reports whether `to` was reached. The top state is never
    /// part of a path.
    fn discover_path(
        &mut self,
        from: StateHandler<C, E>,
        to: StateHandler<C, E>,
    ) -> (Path<C, E>, bool) {
        let mut path = Path::new();
        let mut state = from;
        loop {
            if same_state(state, to) {
                return (path, true);
            }
            if self.is_top(state) {
                return (path, false);
            }
            path.push(state);
            state = self.superstate_of(state);
        }
    }

    /// Complete a transition triggered by `source` towards `target`
    fn transition_from(&mut self, mut source: StateHandler<C, E>, mut target: StateHandler<C, E>) {
        loop {
            let mut state = self.current.unwrap_or(Self::top);
            while !same_state(state, source) {
                expect(!self.is_top(state), ErrorCode::LogicError);
                self.exit(state);
                state = self.superstate_of(state);
            }

            if same_state(target, source) {
                self.exit(source);
                self.enter(target);
            } else {
                let (mut target_path, target_path_complete) = self.discover_path(target, source);
                let (mut source_path, source_path_complete) = if target_path_complete {
                    (Path::new(), false)
                } else {
                    self.discover_path(source, target)
                };

                if !target_path_complete && !source_path_complete {
                    while let (Some(&a), Some(&b)) = (target_path.last(), source_path.last()) {
                        if !same_state(a, b) {
                            break;
                        }
                        target_path.pop();
                        source_path.pop();
                    }
                }

                if !target_path_complete {
                    for &state in source_path.iter() {
                        self.exit(state);
                    }
                }
                if !source_path_complete {
                    for &state in target_path.iter().rev() {
                        self.enter(state);
                    }
                }
            }

            self.current = Some(target);

            let result = target(self, Event::NestedInitialTransition);
            match (result.outcome(), self.take_slot()) {
                (EventHandlingOutcome::StateTransitionTriggered, Slot::Target(next)) => {
                    source = target;
                    target = next;
                }
                (EventHandlingOutcome::EventHandlingDeferredToSuperstate, _) => return,
                _ => fatal_error(ErrorCode::UnexpectedEventHandlingResult),
            }
        }
    }
}

/// Handler identity by address
#[inline]
fn same_state<C, E>(a: StateHandler<C, E>, b: StateHandler<C, E>) -> bool {
    a as usize == b as usize
}
