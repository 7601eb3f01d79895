//! MCP23008 I2C port expander
//!
//! The device answers at `0b0100_A2A1A0`, the low bits set by its hardware
//! address pins.

use core::cell::RefCell;

use picolib_core::ErrorCode;
use picolib_hal::{I2cController, Operation, Response};

use crate::address::{AddressRange, Numeric, Transmitted};
use crate::i2c;

/// MCP23008 address range
#[derive(Debug, Clone, Copy)]
pub struct Mcp23008Addresses;

impl AddressRange for Mcp23008Addresses {
    const NUMERIC_MIN: u8 = 0b010_0000;
    const NUMERIC_MAX: u8 = 0b010_0111;
}

/// MCP23008 address, numeric form
pub type Address = Numeric<Mcp23008Addresses>;

/// MCP23008 address, transmitted form
pub type TransmittedAddress = Transmitted<Mcp23008Addresses>;

impl From<TransmittedAddress> for i2c::TransmittedAddress {
    fn from(address: TransmittedAddress) -> Self {
        i2c::TransmittedAddress::new_unchecked(address.as_unsigned_integer())
    }
}

/// MCP23008 register access
pub struct Mcp23008<'a, A, C> {
    device: i2c::Device<'a, A, C>,
}

impl<'a, A: FnMut(), C: I2cController> Mcp23008<'a, A, C> {
    pub fn new(
        aligner: A,
        controller: &'a RefCell<C>,
        address: TransmittedAddress,
        nonresponsive_device_error: ErrorCode,
    ) -> Self {
        Self {
            device: i2c::Device::new(
                aligner,
                controller,
                address.into(),
                nonresponsive_device_error,
            ),
        }
    }

    pub fn address(&self) -> TransmittedAddress {
        TransmittedAddress::new_unchecked(self.device.address().as_unsigned_integer())
    }

    /// Check if the device acknowledges its address
    pub fn responsive(&mut self) -> bool {
        self.device.ping(Operation::Write) == Response::Ack
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn read_register(&mut self, register: u8) -> u8 {
        self.device.read_register(register)
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn write_register(&mut self, register: u8, data: u8) {
        self.device.write_register(register, data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{I2cEvent, ScriptedI2c};

    #[test]
    fn test_address_range() {
        assert_eq!(Address::MIN.as_unsigned_integer(), 0x20);
        assert_eq!(Address::MAX.as_unsigned_integer(), 0x27);
        assert_eq!(TransmittedAddress::MIN.as_unsigned_integer(), 0x40);
        assert_eq!(TransmittedAddress::MAX.as_unsigned_integer(), 0x4E);
        assert_eq!(
            TransmittedAddress::from(Address::new(0x23)).as_unsigned_integer(),
            0x46
        );
    }

    #[test]
    #[should_panic(expected = "InvalidArgument")]
    fn test_address_out_of_range() {
        Address::new(0x28);
    }

    #[test]
    fn test_register_access() {
        let bus = RefCell::new(ScriptedI2c::with_device(0x42));
        bus.borrow_mut().reads.push_back(0x5A);

        let mut expander = Mcp23008::new(
            || {},
            &bus,
            Address::new(0x21).into(),
            ErrorCode::NonresponsiveDevice,
        );
        assert!(expander.responsive());
        expander.write_register(0x09, 0xFF);
        assert_eq!(expander.read_register(0x09), 0x5A);
        assert_eq!(expander.address(), TransmittedAddress::new(0x42));

        let bus = bus.borrow();
        let events = &bus.events;
        assert!(events.contains(&I2cEvent::Write(0xFF)));
        assert_eq!(events.last(), Some(&I2cEvent::Stop));
    }
}
