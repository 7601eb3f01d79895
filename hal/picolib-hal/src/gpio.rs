//! GPIO pin abstractions
//!
//! Provides the digital output trait used for chip selects and other
//! driver-controlled lines.

use core::convert::Infallible;

use crate::spi::DeviceSelector;

/// Digital output pin
///
/// Implementations should handle the actual hardware register manipulation
/// for the specific chip.
pub trait OutputPin {
    /// Set the pin high (logic 1)
    fn set_high(&mut self);

    /// Set the pin low (logic 0)
    fn set_low(&mut self);

    /// Set the pin to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

/// [`OutputPin`] over an infallible `embedded-hal` output pin
pub struct EmbeddedHalPin<P>(pub P);

impl<P: embedded_hal::digital::OutputPin<Error = Infallible>> OutputPin for EmbeddedHalPin<P> {
    fn set_high(&mut self) {
        match self.0.set_high() {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }

    fn set_low(&mut self) {
        match self.0.set_low() {
            Ok(()) => {}
            Err(never) => match never {},
        }
    }
}

/// Chip select driven low to select the device
pub struct ActiveLowSelector<P> {
    pin: P,
}

impl<P: OutputPin> ActiveLowSelector<P> {
    /// Take the pin and leave the device deselected
    pub fn new(mut pin: P) -> Self {
        pin.set_high();
        Self { pin }
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> DeviceSelector for ActiveLowSelector<P> {
    fn select(&mut self) {
        self.pin.set_low();
    }

    fn deselect(&mut self) {
        self.pin.set_high();
    }
}
