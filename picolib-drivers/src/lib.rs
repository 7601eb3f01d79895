//! Device façades and register-level drivers
//!
//! This crate binds the bus controllers of `picolib-hal` to concrete
//! devices:
//!
//! - Bus address value types with numeric and transmitted forms
//! - I2C and SPI device façades (multiplexer alignment, chip select,
//!   nonresponsive device traps)
//! - MCP23008 and MCP23S08 port expander addressing and register access
//! - W5500 Ethernet controller register map and SPI driver

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod address;
pub mod i2c;
pub mod mcp23008;
pub mod mcp23s08;
pub mod spi;
pub mod w5500;

#[cfg(test)]
pub(crate) mod testing;
