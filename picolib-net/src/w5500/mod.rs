//! W5500 network stack
//!
//! ```text
//!                  +-------------------------------+
//!  TCP client ---->|                               |
//!  TCP acceptor -->|  Stack                        |
//!    `- servers    |  - socket pool (8 sockets)    |----> Driver ----> W5500
//!  UDP socket ---->|  - TCP / UDP port allocators  |
//!                  +-------------------------------+
//! ```
//!
//! The stack owns every hardware socket. Sockets borrow the stack and return
//! their hardware socket to the pool when closed or dropped. A server
//! connection accepted by an acceptor can outlive the acceptor; the stack
//! keeps such sockets allocated and marks them detached until the server
//! closes.

mod ports;
mod stack;
pub mod tcp;
pub mod udp;

#[cfg(test)]
pub(crate) mod testing;

pub use picolib_drivers::w5500::{Driver, SocketId, SOCKETS};
pub use ports::{HardwarePortAllocator, PortAllocator, TrackingPortAllocator, EPHEMERAL_PORTS};
pub use stack::{SocketStatus, Stack};

use crate::ip::{Ipv4Address, MacAddress};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// PHY operation mode (PHYCFGR OPMDC)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PhyMode {
    /// 10BASE-T half duplex, auto-negotiation disabled
    Base10HalfDuplex,
    /// 10BASE-T full duplex, auto-negotiation disabled
    Base10FullDuplex,
    /// 100BASE-TX half duplex, auto-negotiation disabled
    Base100HalfDuplex,
    /// 100BASE-TX full duplex, auto-negotiation disabled
    Base100FullDuplex,
    /// 100BASE-TX half duplex, auto-negotiation enabled
    Base100HalfDuplexAutoNegotiation,
    PowerDown,
    /// All capable, auto-negotiation enabled
    AllCapableAutoNegotiation,
}

impl PhyMode {
    pub const fn bits(self) -> u8 {
        match self {
            PhyMode::Base10HalfDuplex => 0b000,
            PhyMode::Base10FullDuplex => 0b001,
            PhyMode::Base100HalfDuplex => 0b010,
            PhyMode::Base100FullDuplex => 0b011,
            PhyMode::Base100HalfDuplexAutoNegotiation => 0b100,
            PhyMode::PowerDown => 0b110,
            PhyMode::AllCapableAutoNegotiation => 0b111,
        }
    }

    /// `None` for the reserved encoding
    pub const fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b000 => Some(PhyMode::Base10HalfDuplex),
            0b001 => Some(PhyMode::Base10FullDuplex),
            0b010 => Some(PhyMode::Base100HalfDuplex),
            0b011 => Some(PhyMode::Base100FullDuplex),
            0b100 => Some(PhyMode::Base100HalfDuplexAutoNegotiation),
            0b110 => Some(PhyMode::PowerDown),
            0b111 => Some(PhyMode::AllCapableAutoNegotiation),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    Down,
    Up,
}

/// Per-socket buffer size
///
/// The W5500 has 16 KiB of TX and 16 KiB of RX memory. The buffer size
/// determines how many sockets the memory is tiled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SocketBufferSize {
    KiB2 = 2,
    KiB4 = 4,
    KiB8 = 8,
    KiB16 = 16,
}

impl SocketBufferSize {
    pub const fn kibibytes(self) -> u8 {
        self as u8
    }

    pub const fn bytes(self) -> u16 {
        self.kibibytes() as u16 * 1024
    }

    /// Number of sockets the buffer memory supports
    pub const fn sockets(self) -> u8 {
        16 / self.kibibytes()
    }
}

/// Parameters for [`Stack::initialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Configuration {
    /// Must not be [`PhyMode::PowerDown`]
    pub phy_mode: PhyMode,
    /// Ignore ping requests
    pub ping_blocking: bool,
    /// Send an ARP request before every transmission
    pub arp_forcing: bool,
    /// Retransmission timeout in 100 µs units
    pub retransmission_retry_time: u16,
    pub retransmission_retry_count: u8,
    pub mac_address: MacAddress,
    pub ipv4_address: Ipv4Address,
    pub ipv4_gateway_address: Ipv4Address,
    pub ipv4_subnet_mask: Ipv4Address,
    /// Interrupt pin deassertion time between interrupts (INTLEVEL)
    pub interrupt_assert_wait_time: u16,
    pub socket_buffer_size: SocketBufferSize,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            phy_mode: PhyMode::AllCapableAutoNegotiation,
            ping_blocking: false,
            arp_forcing: false,
            retransmission_retry_time: 2000,
            retransmission_retry_count: 8,
            mac_address: MacAddress::default(),
            ipv4_address: Ipv4Address::UNSPECIFIED,
            ipv4_gateway_address: Ipv4Address::UNSPECIFIED,
            ipv4_subnet_mask: Ipv4Address::UNSPECIFIED,
            interrupt_assert_wait_time: 0,
            socket_buffer_size: SocketBufferSize::KiB2,
        }
    }
}

/// Socket interrupt flags (SN_IR / SN_IMR)
pub mod socket_interrupt {
    use picolib_drivers::w5500::registers::sn_ir;

    pub const DATA_TRANSMITTED: u8 = sn_ir::SENDOK;
    pub const TIMEOUT: u8 = sn_ir::TIMEOUT;
    pub const DATA_RECEIVED: u8 = sn_ir::RECV;
    pub const PEER_DISCONNECTED: u8 = sn_ir::DISCON;
    pub const CONNECTION_ESTABLISHED: u8 = sn_ir::CON;
    pub const ALL: u8 = sn_ir::ALL;
}

/// Common interrupt flags (IR / IMR)
pub mod interrupt {
    use picolib_drivers::w5500::registers::ir;

    pub const IP_ADDRESS_CONFLICT: u8 = ir::CONFLICT;
    pub const DESTINATION_UNREACHABLE: u8 = ir::UNREACH;
    pub const PPPOE_CONNECTION_CLOSED: u8 = ir::PPPOE;
    pub const MAGIC_PACKET: u8 = ir::MP;
    pub const ALL: u8 = ir::ALL;
}
