//! SPI device façade
//!
//! A [`Device`] bundles the bus multiplexer aligner, the shared controller,
//! the device's clock configuration and its chip select. Each access is one
//! [`Selection`]: align, configure, select, and deselect on every exit.

use core::cell::{RefCell, RefMut};
use core::ops::{Deref, DerefMut};

use picolib_hal::{DeviceSelector, SpiController};

/// Device on an SPI bus
pub struct Device<'a, A, C: SpiController, S> {
    aligner: A,
    controller: &'a RefCell<C>,
    configuration: C::Configuration,
    selector: S,
}

/// The device is selected for as long as this guard lives
pub struct Selection<'d, C, S: DeviceSelector> {
    controller: RefMut<'d, C>,
    selector: &'d mut S,
}

impl<C, S: DeviceSelector> Deref for Selection<'_, C, S> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.controller
    }
}

impl<C, S: DeviceSelector> DerefMut for Selection<'_, C, S> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.controller
    }
}

impl<C, S: DeviceSelector> Drop for Selection<'_, C, S> {
    fn drop(&mut self) {
        self.selector.deselect();
    }
}

impl<'a, A: FnMut(), C: SpiController, S: DeviceSelector> Device<'a, A, C, S> {
    pub fn new(
        aligner: A,
        controller: &'a RefCell<C>,
        configuration: C::Configuration,
        selector: S,
    ) -> Self {
        Self {
            aligner,
            controller,
            configuration,
            selector,
        }
    }

    /// Put the chip select in its idle state
    pub fn initialize(&mut self) {
        self.selector.deselect();
    }

    pub fn configuration(&self) -> &C::Configuration {
        &self.configuration
    }

    pub fn controller(&self) -> &'a RefCell<C> {
        self.controller
    }

    /// Select the bus multiplexer branch the device is on
    pub fn align_bus_multiplexer(&mut self) {
        (self.aligner)();
    }

    /// Start a transaction with the device
    pub fn select(&mut self) -> Selection<'_, C, S> {
        self.align_bus_multiplexer();

        let mut controller = self.controller.borrow_mut();
        controller.configure(&self.configuration);
        self.selector.select();

        Selection {
            controller,
            selector: &mut self.selector,
        }
    }

    pub fn exchange(&mut self, data: u8) -> u8 {
        self.select().exchange(data)
    }

    pub fn exchange_block(&mut self, tx: &[u8], rx: &mut [u8]) {
        self.select().exchange_block(tx, rx);
    }

    pub fn receive(&mut self) -> u8 {
        self.select().receive()
    }

    pub fn receive_block(&mut self, rx: &mut [u8]) {
        self.select().receive_block(rx);
    }

    pub fn transmit(&mut self, data: u8) {
        self.select().transmit(data);
    }

    pub fn transmit_block(&mut self, tx: &[u8]) {
        self.select().transmit_block(tx);
    }
}
