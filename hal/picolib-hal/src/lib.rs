//! picolib Hardware Abstraction Layer
//!
//! This crate defines the bus controller traits that device drivers are
//! written against. Chip-specific code implements them, either directly or
//! through the `embedded-hal` 1.0 adapters provided here.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  picolib-net (W5500 network stack)      │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  picolib-drivers (device façades)       │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  picolib-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ chip-specific │       │ embedded-hal  │
//! │  controllers  │       │   adapters    │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`i2c::I2cController`] - I2C bus primitives (start, address, stop)
//! - [`spi::SpiController`] - SPI full-duplex exchange
//! - [`spi::DeviceSelector`] - SPI chip select
//! - [`gpio::OutputPin`] - Digital output
//!
//! Controllers do not return errors. A transport failure is a fatal
//! `BusError` trap; a device that does not acknowledge is reported through
//! [`i2c::Response::Nack`].

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod gpio;
pub mod i2c;
pub mod spi;

// Re-export key traits at crate root for convenience
pub use gpio::OutputPin;
pub use i2c::{I2cController, Operation, Response};
pub use spi::{DeviceSelector, SpiController};
