//! W5500 register-level driver
//!
//! Implementors provide block read and block write; every register accessor
//! is derived from them. Accessors are named after the datasheet register
//! (`read_sipr`, `write_sn_port`, ...). Multi-byte registers are
//! big-endian.

use super::registers::*;
use super::{Block, SocketId};

macro_rules! common_register {
    ($read:ident $(, $write:ident)?: u8 @ $offset:expr) => {
        fn $read(&mut self) -> u8 {
            self.read_byte(Block::Common, $offset)
        }
        $(
            fn $write(&mut self, value: u8) {
                self.write_byte(Block::Common, $offset, value);
            }
        )?
    };
    ($read:ident $(, $write:ident)?: u16 @ $offset:expr) => {
        fn $read(&mut self) -> u16 {
            self.read_word(Block::Common, $offset)
        }
        $(
            fn $write(&mut self, value: u16) {
                self.write_word(Block::Common, $offset, value);
            }
        )?
    };
    ($read:ident $(, $write:ident)?: [u8; $n:literal] @ $offset:expr) => {
        fn $read(&mut self) -> [u8; $n] {
            self.read_array(Block::Common, $offset)
        }
        $(
            fn $write(&mut self, value: [u8; $n]) {
                self.write(Block::Common, $offset, &value);
            }
        )?
    };
}

macro_rules! socket_register {
    ($read:ident $(, $write:ident)?: u8 @ $offset:expr) => {
        fn $read(&mut self, socket: SocketId) -> u8 {
            self.read_byte(Block::Registers(socket), $offset)
        }
        $(
            fn $write(&mut self, socket: SocketId, value: u8) {
                self.write_byte(Block::Registers(socket), $offset, value);
            }
        )?
    };
    ($read:ident $(, $write:ident)?: u16 @ $offset:expr) => {
        fn $read(&mut self, socket: SocketId) -> u16 {
            self.read_word(Block::Registers(socket), $offset)
        }
        $(
            fn $write(&mut self, socket: SocketId, value: u16) {
                self.write_word(Block::Registers(socket), $offset, value);
            }
        )?
    };
    ($read:ident $(, $write:ident)?: [u8; $n:literal] @ $offset:expr) => {
        fn $read(&mut self, socket: SocketId) -> [u8; $n] {
            self.read_array(Block::Registers(socket), $offset)
        }
        $(
            fn $write(&mut self, socket: SocketId, value: [u8; $n]) {
                self.write(Block::Registers(socket), $offset, &value);
            }
        )?
    };
}

/// W5500 register access
pub trait Driver {
    /// Read `data.len()` bytes starting at `offset` in `block`
    fn read(&mut self, block: Block, offset: u16, data: &mut [u8]);

    /// Write `data` starting at `offset` in `block`
    fn write(&mut self, block: Block, offset: u16, data: &[u8]);

    fn read_byte(&mut self, block: Block, offset: u16) -> u8 {
        let [value] = self.read_array(block, offset);
        value
    }

    fn write_byte(&mut self, block: Block, offset: u16, value: u8) {
        self.write(block, offset, &[value]);
    }

    fn read_word(&mut self, block: Block, offset: u16) -> u16 {
        u16::from_be_bytes(self.read_array(block, offset))
    }

    fn write_word(&mut self, block: Block, offset: u16, value: u16) {
        self.write(block, offset, &value.to_be_bytes());
    }

    fn read_array<const N: usize>(&mut self, block: Block, offset: u16) -> [u8; N] {
        let mut data = [0u8; N];
        self.read(block, offset, &mut data);
        data
    }

    /// Read a register the device updates on its own until two consecutive
    /// reads agree
    fn read_word_stable(&mut self, block: Block, offset: u16) -> u16 {
        let mut previous = self.read_word(block, offset);
        loop {
            let current = self.read_word(block, offset);
            if current == previous {
                return current;
            }
            previous = current;
        }
    }

    common_register!(read_mr, write_mr: u8 @ MR);
    common_register!(read_gar, write_gar: [u8; 4] @ GAR);
    common_register!(read_subr, write_subr: [u8; 4] @ SUBR);
    common_register!(read_shar, write_shar: [u8; 6] @ SHAR);
    common_register!(read_sipr, write_sipr: [u8; 4] @ SIPR);
    common_register!(read_intlevel, write_intlevel: u16 @ INTLEVEL);
    common_register!(read_ir, write_ir: u8 @ IR);
    common_register!(read_imr, write_imr: u8 @ IMR);
    common_register!(read_sir: u8 @ SIR);
    common_register!(read_simr, write_simr: u8 @ SIMR);
    common_register!(read_rtr, write_rtr: u16 @ RTR);
    common_register!(read_rcr, write_rcr: u8 @ RCR);
    common_register!(read_phycfgr, write_phycfgr: u8 @ PHYCFGR);
    common_register!(read_versionr: u8 @ VERSIONR);

    socket_register!(read_sn_mr, write_sn_mr: u8 @ SN_MR);
    socket_register!(read_sn_cr, write_sn_cr: u8 @ SN_CR);
    socket_register!(read_sn_ir, write_sn_ir: u8 @ SN_IR);
    socket_register!(read_sn_sr: u8 @ SN_SR);
    socket_register!(read_sn_port, write_sn_port: u16 @ SN_PORT);
    socket_register!(read_sn_dhar, write_sn_dhar: [u8; 6] @ SN_DHAR);
    socket_register!(read_sn_dipr, write_sn_dipr: [u8; 4] @ SN_DIPR);
    socket_register!(read_sn_dport, write_sn_dport: u16 @ SN_DPORT);
    socket_register!(read_sn_mssr, write_sn_mssr: u16 @ SN_MSSR);
    socket_register!(read_sn_tos, write_sn_tos: u8 @ SN_TOS);
    socket_register!(read_sn_ttl, write_sn_ttl: u8 @ SN_TTL);
    socket_register!(read_sn_rxbuf_size, write_sn_rxbuf_size: u8 @ SN_RXBUF_SIZE);
    socket_register!(read_sn_txbuf_size, write_sn_txbuf_size: u8 @ SN_TXBUF_SIZE);
    socket_register!(read_sn_tx_rd: u16 @ SN_TX_RD);
    socket_register!(read_sn_tx_wr, write_sn_tx_wr: u16 @ SN_TX_WR);
    socket_register!(read_sn_rx_rd, write_sn_rx_rd: u16 @ SN_RX_RD);
    socket_register!(read_sn_rx_wr: u16 @ SN_RX_WR);
    socket_register!(read_sn_imr, write_sn_imr: u8 @ SN_IMR);
    socket_register!(read_sn_frag, write_sn_frag: u16 @ SN_FRAG);
    socket_register!(read_sn_kpalvtr, write_sn_kpalvtr: u8 @ SN_KPALVTR);

    /// Free space in the socket's TX buffer
    fn read_sn_tx_fsr(&mut self, socket: SocketId) -> u16 {
        self.read_word_stable(Block::Registers(socket), SN_TX_FSR)
    }

    /// Received data in the socket's RX buffer
    fn read_sn_rx_rsr(&mut self, socket: SocketId) -> u16 {
        self.read_word_stable(Block::Registers(socket), SN_RX_RSR)
    }

    /// Read from the socket's RX buffer; the device wraps `offset`
    fn read_rx_buffer(&mut self, socket: SocketId, offset: u16, data: &mut [u8]) {
        self.read(Block::RxBuffer(socket), offset, data);
    }

    /// Write to the socket's TX buffer; the device wraps `offset`
    fn write_tx_buffer(&mut self, socket: SocketId, offset: u16, data: &[u8]) {
        self.write(Block::TxBuffer(socket), offset, data);
    }
}

impl<D: Driver + ?Sized> Driver for &mut D {
    fn read(&mut self, block: Block, offset: u16, data: &mut [u8]) {
        (**self).read(block, offset, data)
    }

    fn write(&mut self, block: Block, offset: u16, data: &[u8]) {
        (**self).write(block, offset, data)
    }
}
