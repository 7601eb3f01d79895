//! W5500 register map
//!
//! Offsets are relative to the start of their block. Multi-byte registers
//! are big-endian.

// Common registers

/// Mode
pub const MR: u16 = 0x0000;
/// Gateway IP address
pub const GAR: u16 = 0x0001;
/// Subnet mask
pub const SUBR: u16 = 0x0005;
/// Source hardware (MAC) address
pub const SHAR: u16 = 0x0009;
/// Source IP address
pub const SIPR: u16 = 0x000F;
/// Interrupt low level timer
pub const INTLEVEL: u16 = 0x0013;
/// Interrupt
pub const IR: u16 = 0x0015;
/// Interrupt mask
pub const IMR: u16 = 0x0016;
/// Socket interrupt
pub const SIR: u16 = 0x0017;
/// Socket interrupt mask
pub const SIMR: u16 = 0x0018;
/// Retry time
pub const RTR: u16 = 0x0019;
/// Retry count
pub const RCR: u16 = 0x001B;
/// PHY configuration
pub const PHYCFGR: u16 = 0x002E;
/// Chip version
pub const VERSIONR: u16 = 0x0039;

/// Value of VERSIONR on a responsive device
pub const VERSION: u8 = 0x04;

// Socket registers

/// Socket mode
pub const SN_MR: u16 = 0x0000;
/// Socket command
pub const SN_CR: u16 = 0x0001;
/// Socket interrupt
pub const SN_IR: u16 = 0x0002;
/// Socket status
pub const SN_SR: u16 = 0x0003;
/// Socket source port
pub const SN_PORT: u16 = 0x0004;
/// Socket destination hardware address
pub const SN_DHAR: u16 = 0x0006;
/// Socket destination IP address
pub const SN_DIPR: u16 = 0x000C;
/// Socket destination port
pub const SN_DPORT: u16 = 0x0010;
/// Socket maximum segment size
pub const SN_MSSR: u16 = 0x0012;
/// Socket IP type of service
pub const SN_TOS: u16 = 0x0015;
/// Socket IP time to live
pub const SN_TTL: u16 = 0x0016;
/// Socket receive buffer size (KiB)
pub const SN_RXBUF_SIZE: u16 = 0x001E;
/// Socket transmit buffer size (KiB)
pub const SN_TXBUF_SIZE: u16 = 0x001F;
/// Socket TX free size
pub const SN_TX_FSR: u16 = 0x0020;
/// Socket TX read pointer
pub const SN_TX_RD: u16 = 0x0022;
/// Socket TX write pointer
pub const SN_TX_WR: u16 = 0x0024;
/// Socket RX received size
pub const SN_RX_RSR: u16 = 0x0026;
/// Socket RX read pointer
pub const SN_RX_RD: u16 = 0x0028;
/// Socket RX write pointer
pub const SN_RX_WR: u16 = 0x002A;
/// Socket interrupt mask
pub const SN_IMR: u16 = 0x002C;
/// Socket fragment offset in IP header
pub const SN_FRAG: u16 = 0x002D;
/// Socket keep alive timer (5 s units)
pub const SN_KPALVTR: u16 = 0x002F;

/// MR bits
pub mod mr {
    pub const RST: u8 = 1 << 7;
    pub const WOL: u8 = 1 << 5;
    /// Ping block
    pub const PB: u8 = 1 << 4;
    pub const PPPOE: u8 = 1 << 3;
    /// Force ARP
    pub const FARP: u8 = 1 << 1;
}

/// PHYCFGR bits
pub mod phycfgr {
    /// Reset (active low)
    pub const RST: u8 = 1 << 7;
    /// Configure the PHY from OPMDC rather than the pins
    pub const OPMD: u8 = 1 << 6;
    pub const OPMDC_SHIFT: u8 = 3;
    pub const OPMDC_MASK: u8 = 0b111 << OPMDC_SHIFT;
    /// Full duplex
    pub const DPX: u8 = 1 << 2;
    /// 100 Mbps
    pub const SPD: u8 = 1 << 1;
    /// Link up
    pub const LNK: u8 = 1 << 0;
}

/// SN_MR bits
pub mod sn_mr {
    /// UDP multicast
    pub const MULTI: u8 = 1 << 7;
    /// UDP broadcast blocking
    pub const BCASTB: u8 = 1 << 6;
    /// TCP no delayed ACK
    pub const ND: u8 = 1 << 5;
    /// UDP unicast blocking
    pub const UCASTB: u8 = 1 << 4;
    pub const PROTOCOL_MASK: u8 = 0x0F;
    pub const PROTOCOL_CLOSED: u8 = 0x00;
    pub const PROTOCOL_TCP: u8 = 0x01;
    pub const PROTOCOL_UDP: u8 = 0x02;
    pub const PROTOCOL_MACRAW: u8 = 0x04;
}

/// SN_CR commands
pub mod sn_cr {
    pub const OPEN: u8 = 0x01;
    pub const LISTEN: u8 = 0x02;
    pub const CONNECT: u8 = 0x04;
    pub const DISCON: u8 = 0x08;
    pub const CLOSE: u8 = 0x10;
    pub const SEND: u8 = 0x20;
    pub const SEND_MAC: u8 = 0x21;
    pub const SEND_KEEP: u8 = 0x22;
    pub const RECV: u8 = 0x40;
}

/// SN_IR bits
pub mod sn_ir {
    pub const SENDOK: u8 = 1 << 4;
    pub const TIMEOUT: u8 = 1 << 3;
    pub const RECV: u8 = 1 << 2;
    pub const DISCON: u8 = 1 << 1;
    pub const CON: u8 = 1 << 0;
    pub const ALL: u8 = 0x1F;
}

/// SN_SR values
pub mod sn_sr {
    pub const SOCK_CLOSED: u8 = 0x00;
    pub const SOCK_INIT: u8 = 0x13;
    pub const SOCK_LISTEN: u8 = 0x14;
    pub const SOCK_SYNSENT: u8 = 0x15;
    pub const SOCK_SYNRECV: u8 = 0x16;
    pub const SOCK_ESTABLISHED: u8 = 0x17;
    pub const SOCK_FIN_WAIT: u8 = 0x18;
    pub const SOCK_CLOSING: u8 = 0x1A;
    pub const SOCK_TIME_WAIT: u8 = 0x1B;
    pub const SOCK_CLOSE_WAIT: u8 = 0x1C;
    pub const SOCK_LAST_ACK: u8 = 0x1D;
    pub const SOCK_UDP: u8 = 0x22;
    pub const SOCK_MACRAW: u8 = 0x42;
}

/// Socket register values after reset
pub mod reset {
    pub const SN_MR: u8 = 0x00;
    pub const SN_PORT: u16 = 0x0000;
    pub const SN_DHAR: [u8; 6] = [0xFF; 6];
    pub const SN_DIPR: [u8; 4] = [0x00; 4];
    pub const SN_DPORT: u16 = 0x0000;
    pub const SN_MSSR: u16 = 0x0000;
    pub const SN_TOS: u8 = 0x00;
    pub const SN_TTL: u8 = 0x80;
    pub const SN_IMR: u8 = 0xFF;
    pub const SN_FRAG: u16 = 0x4000;
    pub const SN_KPALVTR: u8 = 0x00;
}

/// IR bits
pub mod ir {
    /// IP conflict
    pub const CONFLICT: u8 = 1 << 7;
    /// Destination unreachable
    pub const UNREACH: u8 = 1 << 6;
    /// PPPoE connection close
    pub const PPPOE: u8 = 1 << 5;
    /// Magic packet
    pub const MP: u8 = 1 << 4;
    pub const ALL: u8 = CONFLICT | UNREACH | PPPOE | MP;
}
