//! Interrupt controller abstraction
//!
//! Data shared between the main thread and an interrupt handler is protected
//! by briefly disabling interrupts. [`CriticalSection`] does this as a scoped
//! guard: the interrupt enable state is saved and interrupts are disabled on
//! construction, and the saved state is restored when the guard is dropped.

use core::sync::atomic::{compiler_fence, Ordering};

/// Interrupt controller
///
/// Methods take `&self` so a controller can be shared between a buffer that
/// lives in a `static` and the interrupt handlers that use it.
pub trait InterruptController {
    /// Saved interrupt enable state
    type State: Copy;

    /// Disable interrupts
    fn disable_interrupt(&self);

    /// Enable interrupts
    fn enable_interrupt(&self);

    /// Save the current interrupt enable state
    fn save_interrupt_enable_state(&self) -> Self::State;

    /// Restore a previously saved interrupt enable state
    fn restore_interrupt_enable_state(&self, state: Self::State);
}

impl<C: InterruptController + ?Sized> InterruptController for &C {
    type State = C::State;

    fn disable_interrupt(&self) {
        (**self).disable_interrupt();
    }

    fn enable_interrupt(&self) {
        (**self).enable_interrupt();
    }

    fn save_interrupt_enable_state(&self) -> Self::State {
        (**self).save_interrupt_enable_state()
    }

    fn restore_interrupt_enable_state(&self, state: Self::State) {
        (**self).restore_interrupt_enable_state(state);
    }
}

/// Placeholder for data structures where no interrupt participates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NoInterruptController;

impl InterruptController for NoInterruptController {
    type State = ();

    fn disable_interrupt(&self) {}

    fn enable_interrupt(&self) {}

    fn save_interrupt_enable_state(&self) -> Self::State {}

    fn restore_interrupt_enable_state(&self, _state: Self::State) {}
}

/// Critical section guard
///
/// Interrupts stay disabled for the lifetime of the guard.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct CriticalSection<'a, C: InterruptController> {
    controller: &'a C,
    state: C::State,
}

impl<'a, C: InterruptController> CriticalSection<'a, C> {
    /// Enter a critical section
    pub fn new(controller: &'a C) -> Self {
        let state = controller.save_interrupt_enable_state();
        controller.disable_interrupt();
        compiler_fence(Ordering::SeqCst);

        Self { controller, state }
    }

    /// Run `f` with interrupts disabled
    pub fn with<R>(controller: &'a C, f: impl FnOnce() -> R) -> R {
        let _guard = Self::new(controller);
        f()
    }
}

impl<C: InterruptController> Drop for CriticalSection<'_, C> {
    fn drop(&mut self) {
        compiler_fence(Ordering::SeqCst);
        self.controller.restore_interrupt_enable_state(self.state);
    }
}

/// Cortex-M interrupt controller (PRIMASK)
#[cfg(feature = "cortex-m")]
#[derive(Debug, Clone, Copy, Default)]
pub struct CortexMInterruptController;

#[cfg(feature = "cortex-m")]
#[allow(unsafe_code)]
impl InterruptController for CortexMInterruptController {
    /// `true` if interrupts were enabled
    type State = bool;

    fn disable_interrupt(&self) {
        cortex_m::interrupt::disable();
    }

    fn enable_interrupt(&self) {
        // SAFETY: callers only re-enable interrupts outside of critical sections
        unsafe { cortex_m::interrupt::enable() };
    }

    fn save_interrupt_enable_state(&self) -> Self::State {
        cortex_m::register::primask::read().is_active()
    }

    fn restore_interrupt_enable_state(&self, state: Self::State) {
        if state {
            self.enable_interrupt();
        }
    }
}
