//! Hierarchical state machines
//!
//! States are plain functions. A state learns its place in the hierarchy
//! only through its own answer to [`Event::Discovery`], so the machine needs
//! no state table:
//!
//! ```
//! use picolib_core::hsm::{Event, EventHandlingResult, Hsm};
//!
//! type Blinker = Hsm<u32, ()>;
//!
//! fn initial(hsm: &mut Blinker, _event: Event<'_, ()>) -> EventHandlingResult {
//!     hsm.transition_to(on)
//! }
//!
//! fn on(hsm: &mut Blinker, event: Event<'_, ()>) -> EventHandlingResult {
//!     match event {
//!         Event::Entry => {
//!             *hsm.context_mut() += 1;
//!             hsm.event_handled()
//!         }
//!         Event::Application(()) => hsm.transition_to(on),
//!         _ => hsm.defer_event_handling_to(Blinker::top),
//!     }
//! }
//!
//! let mut blinker = Blinker::new(0, initial);
//! blinker.execute_topmost_initial_transition(&());
//! blinker.dispatch(&());
//! assert_eq!(*blinker.context(), 2);
//! assert!(blinker.is_in(Blinker::top));
//! ```

pub mod event;
pub mod machine;

pub use event::{Event, EventHandlingOutcome, EventHandlingResult};
pub use machine::{Hsm, StateHandler, MAX_NESTING_DEPTH};
