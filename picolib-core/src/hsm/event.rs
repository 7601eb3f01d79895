//! Events and event handling results

use core::fmt;

/// Event delivered to a state handler
///
/// The first four variants are pseudo-events generated by the runtime to
/// discover the state hierarchy and run entry, exit and nested initial
/// transition actions. Application events are borrowed for the duration of
/// a dispatch.
pub enum Event<'a, E> {
    /// Report the superstate through `defer_event_handling_to`
    Discovery,
    /// Run entry actions, or defer if there are none
    Entry,
    /// Run exit actions, or defer if there are none
    Exit,
    /// Take the nested initial transition, or defer if there is none
    NestedInitialTransition,
    /// Application event
    Application(&'a E),
}

impl<E> Event<'_, E> {
    /// Check if the event was generated by the runtime
    pub fn is_pseudo_event(&self) -> bool {
        !matches!(self, Event::Application(_))
    }

    /// The application event, if this is one
    pub fn application(&self) -> Option<&E> {
        match self {
            Event::Application(event) => Some(*event),
            _ => None,
        }
    }
}

impl<E> Clone for Event<'_, E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Event<'_, E> {}

impl<E: fmt::Debug> fmt::Debug for Event<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Discovery => f.write_str("Discovery"),
            Event::Entry => f.write_str("Entry"),
            Event::Exit => f.write_str("Exit"),
            Event::NestedInitialTransition => f.write_str("NestedInitialTransition"),
            Event::Application(event) => f.debug_tuple("Application").field(event).finish(),
        }
    }
}

/// What a handler did with an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventHandlingOutcome {
    EventHandled,
    StateTransitionTriggered,
    EventHandlingDeferredToSuperstate,
    EventIgnored,
}

/// Result returned by a state handler
///
/// Only the runtime can construct one: handlers obtain it from
/// [`Hsm::event_handled`](super::Hsm::event_handled),
/// [`Hsm::transition_to`](super::Hsm::transition_to) or
/// [`Hsm::defer_event_handling_to`](super::Hsm::defer_event_handling_to).
/// `EventIgnored` is produced only by the implicit top state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub struct EventHandlingResult(EventHandlingOutcome);

impl EventHandlingResult {
    pub(super) const fn new(outcome: EventHandlingOutcome) -> Self {
        Self(outcome)
    }

    pub fn outcome(self) -> EventHandlingOutcome {
        self.0
    }
}
