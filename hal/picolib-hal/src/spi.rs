//! SPI bus abstractions
//!
//! Provides the SPI master and chip-select traits device drivers are
//! written against, plus an adapter for `embedded-hal` SPI buses.

use picolib_core::{fatal_error, ErrorCode};

/// SPI bus master
///
/// Every transfer is a full-duplex exchange; the receive and transmit
/// helpers discard the half they do not need.
pub trait SpiController {
    /// Clock and framing settings applied before talking to a device
    type Configuration;

    /// Bring the peripheral into a known state
    fn initialize(&mut self);

    /// Apply a device's clock and framing settings
    fn configure(&mut self, configuration: &Self::Configuration);

    /// Exchange a single byte
    fn exchange(&mut self, data: u8) -> u8;

    /// Exchange a block of bytes
    ///
    /// `tx` and `rx` must be the same length.
    fn exchange_block(&mut self, tx: &[u8], rx: &mut [u8]) {
        for (&outgoing, incoming) in tx.iter().zip(rx.iter_mut()) {
            *incoming = self.exchange(outgoing);
        }
    }

    /// Receive a byte (transmits 0x00)
    fn receive(&mut self) -> u8 {
        self.exchange(0x00)
    }

    /// Receive a block of bytes
    fn receive_block(&mut self, rx: &mut [u8]) {
        for byte in rx {
            *byte = self.receive();
        }
    }

    /// Transmit a byte, discarding what is received
    fn transmit(&mut self, data: u8) {
        self.exchange(data);
    }

    /// Transmit a block of bytes
    fn transmit_block(&mut self, tx: &[u8]) {
        for &byte in tx {
            self.transmit(byte);
        }
    }
}

/// SPI chip select
pub trait DeviceSelector {
    /// Assert the device's chip select
    fn select(&mut self);

    /// Release the device's chip select
    fn deselect(&mut self);
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity
    pub polarity: Polarity,
    /// Clock phase
    pub phase: Phase,
    /// Bit transmitted first
    pub bit_order: BitOrder,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            frequency: 1_000_000, // 1 MHz
            polarity: Polarity::IdleLow,
            phase: Phase::CaptureOnFirstTransition,
            bit_order: BitOrder::MsbFirst,
        }
    }
}

impl SpiConfig {
    /// MSB-first configuration for `mode` at `frequency`
    pub const fn new(frequency: u32, mode: Mode) -> Self {
        let (polarity, phase) = mode.polarity_and_phase();
        Self {
            frequency,
            polarity,
            phase,
            bit_order: BitOrder::MsbFirst,
        }
    }

    /// SPI mode matching the polarity and phase
    pub const fn mode(&self) -> Mode {
        match (self.polarity, self.phase) {
            (Polarity::IdleLow, Phase::CaptureOnFirstTransition) => Mode::Mode0,
            (Polarity::IdleLow, Phase::CaptureOnSecondTransition) => Mode::Mode1,
            (Polarity::IdleHigh, Phase::CaptureOnFirstTransition) => Mode::Mode2,
            (Polarity::IdleHigh, Phase::CaptureOnSecondTransition) => Mode::Mode3,
        }
    }
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI bit order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    const fn polarity_and_phase(self) -> (Polarity, Phase) {
        match self {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        mode.polarity_and_phase()
    }
}

/// [`SpiController`] over an `embedded-hal` SPI bus
///
/// `embedded-hal` leaves clock configuration to the platform, so
/// [`SpiController::configure`] only records the requested settings for the
/// platform to pick up through [`EmbeddedHalSpi::configuration`]. Bus
/// errors trap `BusError`.
pub struct EmbeddedHalSpi<B> {
    bus: B,
    configuration: SpiConfig,
}

impl<B: embedded_hal::spi::SpiBus<u8>> EmbeddedHalSpi<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            configuration: SpiConfig::default(),
        }
    }

    /// Most recently requested configuration
    pub fn configuration(&self) -> &SpiConfig {
        &self.configuration
    }

    pub fn release(self) -> B {
        self.bus
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn check<T, E>(result: Result<T, E>) -> T {
        match result {
            Ok(value) => value,
            Err(_) => fatal_error(ErrorCode::BusError),
        }
    }
}

impl<B: embedded_hal::spi::SpiBus<u8>> SpiController for EmbeddedHalSpi<B> {
    type Configuration = SpiConfig;

    fn initialize(&mut self) {
        Self::check(self.bus.flush());
    }

    fn configure(&mut self, configuration: &SpiConfig) {
        self.configuration = *configuration;
    }

    fn exchange(&mut self, data: u8) -> u8 {
        let mut buffer = [data];
        Self::check(self.bus.transfer_in_place(&mut buffer));
        Self::check(self.bus.flush());
        buffer[0]
    }

    fn exchange_block(&mut self, tx: &[u8], rx: &mut [u8]) {
        Self::check(self.bus.transfer(rx, tx));
        Self::check(self.bus.flush());
    }

    fn receive_block(&mut self, rx: &mut [u8]) {
        Self::check(self.bus.read(rx));
        Self::check(self.bus.flush());
    }

    fn transmit_block(&mut self, tx: &[u8]) {
        Self::check(self.bus.write(tx));
        Self::check(self.bus.flush());
    }
}
