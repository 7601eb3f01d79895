//! W5500 Ethernet controller
//!
//! The W5500 exposes its registers and socket buffers as blocks of a 16-bit
//! address space. [`Driver`] names every register of that map on top of two
//! primitives, block read and block write; [`SpiDriver`] implements the
//! primitives with the W5500 SPI frame:
//!
//! ```text
//! +----------------+----------------------------+-----------------+
//! | offset (16 bit)| BSB[4:0] RWB OM[1:0]       | data ...        |
//! +----------------+----------------------------+-----------------+
//! ```

pub mod driver;
pub mod registers;
pub mod spi;

pub use driver::Driver;
pub use spi::SpiDriver;

use picolib_core::{expect, ErrorCode};

/// Number of hardware sockets
pub const SOCKETS: usize = 8;

/// Hardware socket number, 0 through 7
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SocketId(u8);

impl SocketId {
    /// Every hardware socket, in order
    pub const ALL: [SocketId; SOCKETS] = [
        SocketId(0),
        SocketId(1),
        SocketId(2),
        SocketId(3),
        SocketId(4),
        SocketId(5),
        SocketId(6),
        SocketId(7),
    ];

    /// Traps `InvalidArgument` if `id` is not a socket number
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn new(id: u8) -> Self {
        expect(usize::from(id) < SOCKETS, ErrorCode::InvalidArgument);
        Self(id)
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Block of the W5500 address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Block {
    /// Common registers
    Common,
    /// A socket's registers
    Registers(SocketId),
    /// A socket's TX buffer
    TxBuffer(SocketId),
    /// A socket's RX buffer
    RxBuffer(SocketId),
}

impl Block {
    /// Block select bits (BSB) of the control phase
    pub const fn select_bits(self) -> u8 {
        match self {
            Block::Common => 0b00000,
            Block::Registers(socket) => (socket.0 << 2) | 0b01,
            Block::TxBuffer(socket) => (socket.0 << 2) | 0b10,
            Block::RxBuffer(socket) => (socket.0 << 2) | 0b11,
        }
    }
}
