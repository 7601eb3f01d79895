//! Simulated W5500 shared by the network stack tests
//!
//! Socket commands take effect as soon as they are written, so polling
//! loops in the stack complete on their first read. Tests drive the remote
//! side by setting socket status and filling RX buffers directly.

use core::net::SocketAddrV4;
use std::borrow::ToOwned;
use std::boxed::Box;
use std::panic::{self, UnwindSafe};
use std::string::String;
use std::sync::{Arc, Mutex};
use std::vec;
use std::vec::Vec;

use picolib_core::ErrorCode;
use picolib_drivers::w5500::registers::*;
use picolib_drivers::w5500::Block;

use super::{
    tcp, udp, Configuration, Driver, SocketBufferSize, SocketId, Stack, TrackingPortAllocator, SOCKETS,
};
use crate::ip::{Ipv4Address, MacAddress};

pub type TestStack = Stack<SimulatedW5500, TrackingPortAllocator, TrackingPortAllocator>;
pub type TestClient<'a> = tcp::Client<'a, SimulatedW5500, TrackingPortAllocator, TrackingPortAllocator>;
pub type TestAcceptor<'a> =
    tcp::Acceptor<'a, SimulatedW5500, TrackingPortAllocator, TrackingPortAllocator>;
pub type TestUdpSocket<'a> = udp::Socket<'a, SimulatedW5500, TrackingPortAllocator, TrackingPortAllocator>;

const BUFFER_MEMORY: usize = 16 * 1024;

pub struct SimulatedW5500 {
    common: [u8; 0x40],
    sockets: [[u8; 0x30]; SOCKETS],
    tx: Vec<Vec<u8>>,
    rx: Vec<Vec<u8>>,
    pub version: u8,
    pub link_up: bool,
    pub phy_resets: usize,
    /// Every socket command, in issue order
    pub commands: Vec<(SocketId, u8)>,
    /// Payload of every SEND command
    pub sent: Vec<(SocketId, Vec<u8>)>,
    /// Set SENDOK as soon as SEND is issued
    pub complete_transmissions: bool,
    pub tx_free_size_override: Option<u16>,
}

impl SimulatedW5500 {
    pub fn new() -> Self {
        let mut sockets = [[0u8; 0x30]; SOCKETS];
        for registers in sockets.iter_mut() {
            registers[usize::from(SN_TTL)] = reset::SN_TTL;
            registers[usize::from(SN_IMR)] = reset::SN_IMR;
            registers[usize::from(SN_RXBUF_SIZE)] = 2;
            registers[usize::from(SN_TXBUF_SIZE)] = 2;
        }

        Self {
            common: [0; 0x40],
            sockets,
            tx: vec![vec![0; BUFFER_MEMORY]; SOCKETS],
            rx: vec![vec![0; BUFFER_MEMORY]; SOCKETS],
            version: VERSION,
            link_up: false,
            phy_resets: 0,
            commands: Vec::new(),
            sent: Vec::new(),
            complete_transmissions: true,
            tx_free_size_override: None,
        }
    }

    pub fn socket_register(&self, socket: SocketId, offset: u16) -> u8 {
        self.sockets[socket.index()][usize::from(offset)]
    }

    fn word(&self, socket: SocketId, offset: u16) -> u16 {
        let offset = usize::from(offset);
        let registers = &self.sockets[socket.index()];
        u16::from_be_bytes([registers[offset], registers[offset + 1]])
    }

    fn set_word(&mut self, socket: SocketId, offset: u16, value: u16) {
        let offset = usize::from(offset);
        self.sockets[socket.index()][offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }

    fn buffer_size(&self, socket: SocketId, offset: u16) -> usize {
        usize::from(self.socket_register(socket, offset).max(1)) * 1024
    }

    pub fn set_status(&mut self, socket: SocketId, status: u8) {
        self.sockets[socket.index()][usize::from(SN_SR)] = status;
    }

    pub fn raise_interrupt(&mut self, mask: u8) {
        self.common[usize::from(IR)] |= mask;
    }

    pub fn raise_socket_interrupt(&mut self, socket: SocketId, mask: u8) {
        self.sockets[socket.index()][usize::from(SN_IR)] |= mask;
    }

    /// Append `data` to the socket's RX buffer as the remote would
    pub fn receive_segment(&mut self, socket: SocketId, data: &[u8]) {
        let size = self.buffer_size(socket, SN_RXBUF_SIZE);
        let write = self.word(socket, SN_RX_WR);
        for (i, &byte) in data.iter().enumerate() {
            let index = (usize::from(write) + i) % size;
            self.rx[socket.index()][index] = byte;
        }
        self.set_word(socket, SN_RX_WR, write.wrapping_add(data.len() as u16));
    }

    /// Append a UDP datagram with its packet info header
    pub fn receive_datagram(&mut self, socket: SocketId, sender: SocketAddrV4, data: &[u8]) {
        let mut datagram = Vec::new();
        datagram.extend_from_slice(&sender.ip().octets());
        datagram.extend_from_slice(&sender.port().to_be_bytes());
        datagram.extend_from_slice(&(data.len() as u16).to_be_bytes());
        datagram.extend_from_slice(data);
        self.receive_segment(socket, &datagram);
    }

    fn execute(&mut self, socket: SocketId, command: u8) {
        self.commands.push((socket, command));

        let status = self.socket_register(socket, SN_SR);
        match command {
            sn_cr::OPEN => {
                for pointer in [SN_TX_RD, SN_TX_WR, SN_RX_RD, SN_RX_WR] {
                    self.set_word(socket, pointer, 0);
                }
                let status = match self.socket_register(socket, SN_MR) & sn_mr::PROTOCOL_MASK {
                    sn_mr::PROTOCOL_TCP => sn_sr::SOCK_INIT,
                    sn_mr::PROTOCOL_UDP => sn_sr::SOCK_UDP,
                    sn_mr::PROTOCOL_MACRAW => sn_sr::SOCK_MACRAW,
                    _ => sn_sr::SOCK_CLOSED,
                };
                self.set_status(socket, status);
            }
            sn_cr::LISTEN if status == sn_sr::SOCK_INIT => self.set_status(socket, sn_sr::SOCK_LISTEN),
            sn_cr::CONNECT if status == sn_sr::SOCK_INIT => self.set_status(socket, sn_sr::SOCK_SYNSENT),
            sn_cr::DISCON | sn_cr::CLOSE => self.set_status(socket, sn_sr::SOCK_CLOSED),
            sn_cr::SEND => {
                let size = self.buffer_size(socket, SN_TXBUF_SIZE);
                let read = self.word(socket, SN_TX_RD);
                let write = self.word(socket, SN_TX_WR);
                let payload = (0..usize::from(write.wrapping_sub(read)))
                    .map(|i| self.tx[socket.index()][(usize::from(read) + i) % size])
                    .collect();
                self.sent.push((socket, payload));
                self.set_word(socket, SN_TX_RD, write);
                if self.complete_transmissions {
                    self.raise_socket_interrupt(socket, sn_ir::SENDOK);
                }
            }
            _ => {}
        }
    }
}

impl Driver for SimulatedW5500 {
    fn read(&mut self, block: Block, offset: u16, data: &mut [u8]) {
        match block {
            Block::Common => {
                for (i, byte) in data.iter_mut().enumerate() {
                    let address = usize::from(offset) + i;
                    *byte = match address as u16 {
                        VERSIONR => self.version,
                        PHYCFGR if self.link_up => self.common[address] | phycfgr::LNK,
                        _ => self.common.get(address).copied().unwrap_or(0),
                    };
                }
            }
            Block::Registers(socket) => {
                let size = self.buffer_size(socket, SN_TXBUF_SIZE) as u16;
                let in_flight = self.word(socket, SN_TX_WR).wrapping_sub(self.word(socket, SN_TX_RD));
                let free = self.tx_free_size_override.unwrap_or(size.wrapping_sub(in_flight));
                let received = self.word(socket, SN_RX_WR).wrapping_sub(self.word(socket, SN_RX_RD));
                self.set_word(socket, SN_TX_FSR, free);
                self.set_word(socket, SN_RX_RSR, received);

                let registers = &self.sockets[socket.index()];
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = registers.get(usize::from(offset) + i).copied().unwrap_or(0);
                }
            }
            Block::TxBuffer(socket) | Block::RxBuffer(socket) => {
                let (memory, size) = match block {
                    Block::TxBuffer(_) => (&self.tx, self.buffer_size(socket, SN_TXBUF_SIZE)),
                    _ => (&self.rx, self.buffer_size(socket, SN_RXBUF_SIZE)),
                };
                for (i, byte) in data.iter_mut().enumerate() {
                    *byte = memory[socket.index()][(usize::from(offset) + i) % size];
                }
            }
        }
    }

    fn write(&mut self, block: Block, offset: u16, data: &[u8]) {
        match block {
            Block::Common => {
                for (i, &byte) in data.iter().enumerate() {
                    let address = usize::from(offset) + i;
                    match address as u16 {
                        IR => self.common[address] &= !byte,
                        VERSIONR => {}
                        PHYCFGR => {
                            if byte & phycfgr::RST == 0 {
                                self.phy_resets += 1;
                            }
                            self.common[address] = byte & !phycfgr::LNK;
                        }
                        _ => self.common[address] = byte,
                    }
                }
            }
            Block::Registers(socket) => {
                for (i, &byte) in data.iter().enumerate() {
                    let address = offset + i as u16;
                    match address {
                        SN_CR => self.execute(socket, byte),
                        SN_IR => self.sockets[socket.index()][usize::from(address)] &= !byte,
                        SN_SR => {}
                        _ if [SN_TX_FSR, SN_TX_RD, SN_RX_RSR, SN_RX_WR]
                            .iter()
                            .any(|&register| address == register || address == register + 1) => {}
                        _ => self.sockets[socket.index()][usize::from(address)] = byte,
                    }
                }
            }
            Block::TxBuffer(socket) => {
                let size = self.buffer_size(socket, SN_TXBUF_SIZE);
                for (i, &byte) in data.iter().enumerate() {
                    self.tx[socket.index()][(usize::from(offset) + i) % size] = byte;
                }
            }
            Block::RxBuffer(socket) => {
                let size = self.buffer_size(socket, SN_RXBUF_SIZE);
                for (i, &byte) in data.iter().enumerate() {
                    self.rx[socket.index()][(usize::from(offset) + i) % size] = byte;
                }
            }
        }
    }
}

pub fn configuration(socket_buffer_size: SocketBufferSize) -> Configuration {
    Configuration {
        mac_address: MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
        ipv4_address: Ipv4Address::new(192, 168, 1, 2),
        ipv4_gateway_address: Ipv4Address::new(192, 168, 1, 1),
        ipv4_subnet_mask: Ipv4Address::new(255, 255, 255, 0),
        socket_buffer_size,
        ..Configuration::default()
    }
}

pub fn initialized_stack(socket_buffer_size: SocketBufferSize) -> TestStack {
    let stack = Stack::new(
        SimulatedW5500::new(),
        ErrorCode::NonresponsiveDevice,
        TrackingPortAllocator::new(),
        TrackingPortAllocator::new(),
    );
    stack.initialize(&configuration(socket_buffer_size));
    stack
}

/// Source file reported by the panic that `f` raises
///
/// Hook swaps are serialized so concurrent callers keep their own hook.
pub fn trap_location(f: impl FnOnce() + UnwindSafe) -> Option<String> {
    static HOOK: Mutex<()> = Mutex::new(());
    let _serialized = HOOK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let location = Arc::new(Mutex::new(None));
    let recorded = Arc::clone(&location);
    let thread = std::thread::current().id();
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if std::thread::current().id() == thread {
            if let Some(at) = info.location() {
                *recorded.lock().unwrap() = Some(at.file().to_owned());
            }
        }
    }));
    let result = panic::catch_unwind(f);
    panic::set_hook(previous);

    assert!(result.is_err(), "no trap");
    let file = location.lock().unwrap().take();
    file
}
