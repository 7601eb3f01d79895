//! I2C device façade
//!
//! A [`Device`] bundles everything needed to talk to one device on a shared
//! I2C bus: the bus multiplexer aligner, the controller, the device address
//! and the error to trap with when the device does not acknowledge.
//!
//! Every access is one bus transaction. The aligner runs first, then a
//! [`BusControlGuard`] transmits START and guarantees STOP on every exit.

use core::cell::{RefCell, RefMut};
use core::ops::{Deref, DerefMut};

use picolib_core::{fatal_error, ErrorCode};
use picolib_hal::{I2cController, Operation, Response};

use crate::address::{AddressRange, Numeric, Transmitted};

/// Full 7-bit I2C address range
#[derive(Debug, Clone, Copy)]
pub struct AnyAddress;

impl AddressRange for AnyAddress {
    const NUMERIC_MIN: u8 = 0x00;
    const NUMERIC_MAX: u8 = 0x7F;
}

/// I2C device address, numeric form
pub type Address = Numeric<AnyAddress>;

/// I2C device address, transmitted form
pub type TransmittedAddress = Transmitted<AnyAddress>;

/// Register address sent ahead of register data
pub trait RegisterAddress: Copy {
    /// Transmit the register address, most significant byte first
    fn transmit<C: I2cController + ?Sized>(self, controller: &mut C) -> Response;
}

impl RegisterAddress for u8 {
    fn transmit<C: I2cController + ?Sized>(self, controller: &mut C) -> Response {
        controller.write(self)
    }
}

impl RegisterAddress for u16 {
    fn transmit<C: I2cController + ?Sized>(self, controller: &mut C) -> Response {
        controller.write_block(&self.to_be_bytes())
    }
}

/// Exclusive use of the bus for one transaction
///
/// START is transmitted on construction, STOP on drop.
pub struct BusControlGuard<'a, C: I2cController> {
    controller: RefMut<'a, C>,
}

impl<'a, C: I2cController> BusControlGuard<'a, C> {
    pub fn new(controller: &'a RefCell<C>) -> Self {
        let mut controller = controller.borrow_mut();
        controller.start();
        Self { controller }
    }
}

impl<C: I2cController> Deref for BusControlGuard<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.controller
    }
}

impl<C: I2cController> DerefMut for BusControlGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.controller
    }
}

impl<C: I2cController> Drop for BusControlGuard<'_, C> {
    fn drop(&mut self) {
        self.controller.stop();
    }
}

/// Device on an I2C bus
pub struct Device<'a, A, C> {
    aligner: A,
    controller: &'a RefCell<C>,
    address: TransmittedAddress,
    nonresponsive_device_error: ErrorCode,
}

impl<'a, A: FnMut(), C: I2cController> Device<'a, A, C> {
    pub fn new(
        aligner: A,
        controller: &'a RefCell<C>,
        address: TransmittedAddress,
        nonresponsive_device_error: ErrorCode,
    ) -> Self {
        Self {
            aligner,
            controller,
            address,
            nonresponsive_device_error,
        }
    }

    pub fn address(&self) -> TransmittedAddress {
        self.address
    }

    pub fn nonresponsive_device_error(&self) -> ErrorCode {
        self.nonresponsive_device_error
    }

    pub fn controller(&self) -> &'a RefCell<C> {
        self.controller
    }

    /// Select the bus multiplexer branch the device is on
    pub fn align_bus_multiplexer(&mut self) {
        (self.aligner)();
    }

    /// Check if the device acknowledges its address
    ///
    /// Never traps.
    pub fn ping(&mut self, operation: Operation) -> Response {
        self.align_bus_multiplexer();
        let mut bus = BusControlGuard::new(self.controller);

        let response = bus.address(self.address.as_unsigned_integer(), operation);
        if operation == Operation::Read && response == Response::Ack {
            bus.read(Response::Nack);
        }
        response
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn expect_ack(&self, response: Response) {
        if response != Response::Ack {
            error!(
                "I2C device {=u8:#x} is nonresponsive",
                self.address.as_unsigned_integer()
            );
            fatal_error(self.nonresponsive_device_error);
        }
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn begin(&mut self, operation: Operation) -> BusControlGuard<'a, C> {
        self.align_bus_multiplexer();
        let mut bus = BusControlGuard::new(self.controller);
        self.expect_ack(bus.address(self.address.as_unsigned_integer(), operation));
        bus
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn begin_register_read<R: RegisterAddress>(&mut self, register: R) -> BusControlGuard<'a, C> {
        let mut bus = self.begin(Operation::Write);
        self.expect_ack(register.transmit(&mut *bus));
        bus.repeated_start();
        self.expect_ack(bus.address(self.address.as_unsigned_integer(), Operation::Read));
        bus
    }

    /// Read a byte
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn read(&mut self) -> u8 {
        let mut bus = self.begin(Operation::Read);
        bus.read(Response::Nack)
    }

    /// Read a block of bytes
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn read_block(&mut self, data: &mut [u8]) {
        let mut bus = self.begin(Operation::Read);
        bus.read_block(data, Response::Nack);
    }

    /// Read a byte from `register`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn read_register<R: RegisterAddress>(&mut self, register: R) -> u8 {
        let mut bus = self.begin_register_read(register);
        bus.read(Response::Nack)
    }

    /// Read a block of bytes starting at `register`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn read_register_block<R: RegisterAddress>(&mut self, register: R, data: &mut [u8]) {
        let mut bus = self.begin_register_read(register);
        bus.read_block(data, Response::Nack);
    }

    /// Write a byte
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn write(&mut self, data: u8) {
        let mut bus = self.begin(Operation::Write);
        self.expect_ack(bus.write(data));
    }

    /// Write a block of bytes
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn write_block(&mut self, data: &[u8]) {
        let mut bus = self.begin(Operation::Write);
        self.expect_ack(bus.write_block(data));
    }

    /// Write a byte to `register`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn write_register<R: RegisterAddress>(&mut self, register: R, data: u8) {
        let mut bus = self.begin(Operation::Write);
        self.expect_ack(register.transmit(&mut *bus));
        self.expect_ack(bus.write(data));
    }

    /// Write a block of bytes starting at `register`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn write_register_block<R: RegisterAddress>(&mut self, register: R, data: &[u8]) {
        let mut bus = self.begin(Operation::Write);
        self.expect_ack(register.transmit(&mut *bus));
        self.expect_ack(bus.write_block(data));
    }
}
