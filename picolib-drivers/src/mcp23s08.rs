//! MCP23S08 SPI port expander
//!
//! Every transaction starts with an opcode carrying the device address
//! (`0b01000A1A0`, the low bits set by its hardware address pins) and the
//! R/W bit, followed by the register address:
//!
//! ```text
//!  opcode             register   data
//! 0 1 0 0 0 A1 A0 R/W  rrrrrrrr  dddddddd
//! ```

use core::cell::RefCell;

use picolib_hal::{DeviceSelector, SpiController};

use crate::address::{AddressRange, Numeric, Transmitted};
use crate::spi;

/// MCP23S08 address range
#[derive(Debug, Clone, Copy)]
pub struct Mcp23s08Addresses;

impl AddressRange for Mcp23s08Addresses {
    const NUMERIC_MIN: u8 = 0b010_0000;
    const NUMERIC_MAX: u8 = 0b010_0011;
}

/// MCP23S08 address, numeric form
pub type Address = Numeric<Mcp23s08Addresses>;

/// MCP23S08 address, transmitted form (opcode with the R/W bit clear)
pub type TransmittedAddress = Transmitted<Mcp23s08Addresses>;

const READ: u8 = 0b1;

/// MCP23S08 register access
pub struct Mcp23s08<'a, A, C: SpiController, S> {
    device: spi::Device<'a, A, C, S>,
    address: TransmittedAddress,
}

impl<'a, A: FnMut(), C: SpiController, S: DeviceSelector> Mcp23s08<'a, A, C, S> {
    pub fn new(
        aligner: A,
        controller: &'a RefCell<C>,
        configuration: C::Configuration,
        selector: S,
        address: TransmittedAddress,
    ) -> Self {
        Self {
            device: spi::Device::new(aligner, controller, configuration, selector),
            address,
        }
    }

    pub fn initialize(&mut self) {
        self.device.initialize();
    }

    pub fn address(&self) -> TransmittedAddress {
        self.address
    }

    pub fn read_register(&mut self, register: u8) -> u8 {
        let mut selection = self.device.select();
        selection.transmit_block(&[self.address.as_unsigned_integer() | READ, register]);
        selection.receive()
    }

    pub fn write_register(&mut self, register: u8, data: u8) {
        self.device
            .transmit_block(&[self.address.as_unsigned_integer(), register, data]);
    }
}
