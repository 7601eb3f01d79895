//! Hardware abstraction traits
//!
//! These traits define the interface between the platform-independent
//! code in this crate and chip-specific implementations.

pub mod interrupt;

pub use interrupt::{CriticalSection, InterruptController, NoInterruptController};

#[cfg(feature = "cortex-m")]
pub use interrupt::CortexMInterruptController;
