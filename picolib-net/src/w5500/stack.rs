//! Socket pool and device-wide configuration

use core::cell::{Ref, RefCell, RefMut};
use core::net::SocketAddr;

use heapless::Vec;
use picolib_core::{expect, fatal_error, ErrorCode};
use picolib_drivers::w5500::registers::{mr, phycfgr, reset, sn_cr, sn_ir, sn_mr, sn_sr};

use super::{
    tcp, udp, Configuration, Driver, LinkStatus, PhyMode, PortAllocator, SocketBufferSize,
    SocketId, SOCKETS,
};
use crate::ip::{ipv4_endpoint, Ipv4Address, MacAddress};

/// Hardware socket allocation status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SocketStatus {
    /// Beyond the number of sockets the buffer memory is tiled into
    NotAvailableForUse,
    Allocated,
    AvailableForAllocation,
}

#[derive(Debug)]
struct SocketPool {
    socket_buffer_size: SocketBufferSize,
    sockets: u8,
    available: u8,
    status: [SocketStatus; SOCKETS],
    /// Server connection whose acceptor has been closed
    detached: [bool; SOCKETS],
    /// Backing socket of an acceptor currently handed to a server connection
    accepted: [bool; SOCKETS],
}

/// W5500 network stack
///
/// Owns the driver, the hardware socket pool and the port allocators.
/// Sockets made by the stack borrow it, so every socket is gone before the
/// stack is.
pub struct Stack<D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> {
    driver: RefCell<D>,
    nonresponsive_device_error: ErrorCode,
    tcp_port_allocator: RefCell<TP>,
    udp_port_allocator: RefCell<UP>,
    pool: RefCell<SocketPool>,
}

impl<D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Stack<D, TP, UP> {
    pub fn new(
        driver: D,
        nonresponsive_device_error: ErrorCode,
        tcp_port_allocator: TP,
        udp_port_allocator: UP,
    ) -> Self {
        Self {
            driver: RefCell::new(driver),
            nonresponsive_device_error,
            tcp_port_allocator: RefCell::new(tcp_port_allocator),
            udp_port_allocator: RefCell::new(udp_port_allocator),
            pool: RefCell::new(SocketPool {
                socket_buffer_size: SocketBufferSize::KiB2,
                sockets: 0,
                available: 0,
                status: [SocketStatus::NotAvailableForUse; SOCKETS],
                detached: [false; SOCKETS],
                accepted: [false; SOCKETS],
            }),
        }
    }

    /// Direct register access
    ///
    /// Must not be held across calls into the stack or its sockets.
    pub fn driver(&self) -> RefMut<'_, D> {
        self.driver.borrow_mut()
    }

    pub fn nonresponsive_device_error(&self) -> ErrorCode {
        self.nonresponsive_device_error
    }

    pub fn tcp_port_allocator(&self) -> Ref<'_, TP> {
        self.tcp_port_allocator.borrow()
    }

    pub fn udp_port_allocator(&self) -> Ref<'_, UP> {
        self.udp_port_allocator.borrow()
    }

    pub fn w5500_is_responsive(&self) -> bool {
        self.driver().read_versionr() == picolib_drivers::w5500::registers::VERSION
    }

    /// Configure the device and tile the socket buffer memory
    ///
    /// Traps `LogicError` if any socket is allocated and the stored
    /// nonresponsive device error if the device does not answer.
    pub fn initialize(&self, configuration: &Configuration) {
        expect(
            configuration.phy_mode != PhyMode::PowerDown,
            ErrorCode::InvalidArgument,
        );
        expect(
            !self.pool.borrow().status.contains(&SocketStatus::Allocated),
            ErrorCode::LogicError,
        );
        self.expect_responsive(self.w5500_is_responsive());

        let mut driver = self.driver();

        let phy = phycfgr::OPMD | (configuration.phy_mode.bits() << phycfgr::OPMDC_SHIFT);
        driver.write_phycfgr(phy);
        driver.write_phycfgr(phy | phycfgr::RST);

        let mut mode = 0;
        if configuration.ping_blocking {
            mode |= mr::PB;
        }
        if configuration.arp_forcing {
            mode |= mr::FARP;
        }
        driver.write_mr(mode);

        driver.write_rtr(configuration.retransmission_retry_time);
        driver.write_rcr(configuration.retransmission_retry_count);
        driver.write_shar(configuration.mac_address.octets());
        driver.write_sipr(configuration.ipv4_address.octets());
        driver.write_gar(configuration.ipv4_gateway_address.octets());
        driver.write_subr(configuration.ipv4_subnet_mask.octets());
        driver.write_intlevel(configuration.interrupt_assert_wait_time);

        let buffer_size = configuration.socket_buffer_size;
        let sockets = buffer_size.sockets();

        let mut pool = self.pool.borrow_mut();
        for socket in SocketId::ALL {
            let (kibibytes, status) = if socket.as_u8() < sockets {
                (buffer_size.kibibytes(), SocketStatus::AvailableForAllocation)
            } else {
                (0, SocketStatus::NotAvailableForUse)
            };
            driver.write_sn_rxbuf_size(socket, kibibytes);
            driver.write_sn_txbuf_size(socket, kibibytes);
            pool.status[socket.index()] = status;
            pool.detached[socket.index()] = false;
            pool.accepted[socket.index()] = false;
        }
        pool.socket_buffer_size = buffer_size;
        pool.sockets = sockets;
        pool.available = sockets;

        info!(
            "W5500 initialized: {} sockets, {} KiB buffers",
            sockets,
            buffer_size.kibibytes()
        );
    }

    /// Configured PHY mode
    pub fn phy_mode(&self) -> PhyMode {
        let bits = (self.driver().read_phycfgr() & phycfgr::OPMDC_MASK) >> phycfgr::OPMDC_SHIFT;
        match PhyMode::from_bits(bits) {
            Some(mode) => mode,
            None => self.nonresponsive(),
        }
    }

    pub fn link_status(&self) -> LinkStatus {
        if self.driver().read_phycfgr() & phycfgr::LNK != 0 {
            LinkStatus::Up
        } else {
            LinkStatus::Down
        }
    }

    pub fn ping_blocking_enabled(&self) -> bool {
        self.driver().read_mr() & mr::PB != 0
    }

    pub fn arp_forcing_enabled(&self) -> bool {
        self.driver().read_mr() & mr::FARP != 0
    }

    pub fn retransmission_retry_time(&self) -> u16 {
        self.driver().read_rtr()
    }

    pub fn retransmission_retry_count(&self) -> u8 {
        self.driver().read_rcr()
    }

    pub fn mac_address(&self) -> MacAddress {
        MacAddress(self.driver().read_shar())
    }

    pub fn ipv4_address(&self) -> Ipv4Address {
        Ipv4Address(self.driver().read_sipr())
    }

    pub fn ipv4_gateway_address(&self) -> Ipv4Address {
        Ipv4Address(self.driver().read_gar())
    }

    pub fn ipv4_subnet_mask(&self) -> Ipv4Address {
        Ipv4Address(self.driver().read_subr())
    }

    pub fn interrupt_assert_wait_time(&self) -> u16 {
        self.driver().read_intlevel()
    }

    pub fn socket_buffer_size(&self) -> SocketBufferSize {
        self.pool.borrow().socket_buffer_size
    }

    /// Number of sockets the buffer memory was tiled into
    pub fn sockets(&self) -> u8 {
        self.pool.borrow().sockets
    }

    pub fn sockets_available_for_allocation(&self) -> u8 {
        self.pool.borrow().available
    }

    pub fn socket_status(&self, socket: SocketId) -> SocketStatus {
        self.pool.borrow().status[socket.index()]
    }

    /// Whether the socket belongs to a server connection that outlived its
    /// acceptor
    pub fn tcp_server_is_detached(&self, socket: SocketId) -> bool {
        self.pool.borrow().detached[socket.index()]
    }

    // Interrupts

    pub fn enable_interrupts(&self, mask: u8) {
        let mut driver = self.driver();
        let enabled = driver.read_imr();
        driver.write_imr(enabled | mask);
    }

    pub fn disable_interrupts(&self, mask: u8) {
        let mut driver = self.driver();
        let enabled = driver.read_imr();
        driver.write_imr(enabled & !mask);
    }

    /// Disable common and socket interrupts
    pub fn disable_all_interrupts(&self) {
        let mut driver = self.driver();
        driver.write_imr(0);
        driver.write_simr(0);
    }

    pub fn enabled_interrupts(&self) -> u8 {
        self.driver().read_imr()
    }

    pub fn interrupt_context(&self) -> u8 {
        self.driver().read_ir()
    }

    pub fn clear_interrupts(&self, mask: u8) {
        self.driver().write_ir(mask);
    }

    pub fn enable_socket_interrupts(&self) {
        self.driver().write_simr(0xFF);
    }

    pub fn disable_socket_interrupts(&self) {
        self.driver().write_simr(0x00);
    }

    pub fn socket_interrupts_enabled(&self) -> bool {
        self.driver().read_simr() != 0
    }

    /// Bit n is set if socket n has a pending interrupt
    pub fn socket_interrupt_context(&self) -> u8 {
        self.driver().read_sir()
    }

    // Socket pool

    /// Allocate the first `count` available sockets
    ///
    /// Traps `InsufficientSocketsAvailable` if fewer are available.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn allocate_sockets(&self, count: usize) -> Vec<SocketId, SOCKETS> {
        let mut pool = self.pool.borrow_mut();
        expect(
            count <= usize::from(pool.available),
            ErrorCode::InsufficientSocketsAvailable,
        );

        let mut sockets = Vec::new();
        for socket in SocketId::ALL {
            if sockets.len() == count {
                break;
            }
            if pool.status[socket.index()] == SocketStatus::AvailableForAllocation {
                pool.status[socket.index()] = SocketStatus::Allocated;
                expect(sockets.push(socket).is_ok(), ErrorCode::InsufficientCapacity);
            }
        }
        pool.available -= sockets.len() as u8;

        debug!("allocated {} sockets, {} left", sockets.len(), pool.available);
        sockets
    }

    /// Close an allocated socket, restore its registers and return it to the
    /// pool
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn deallocate_socket(&self, socket: SocketId) {
        expect(
            self.socket_status(socket) == SocketStatus::Allocated,
            ErrorCode::LogicError,
        );

        self.execute_command(socket, sn_cr::CLOSE);
        self.await_status(socket, sn_sr::SOCK_CLOSED);

        {
            let mut driver = self.driver();
            driver.write_sn_mr(socket, reset::SN_MR);
            driver.write_sn_port(socket, reset::SN_PORT);
            driver.write_sn_dhar(socket, reset::SN_DHAR);
            driver.write_sn_dipr(socket, reset::SN_DIPR);
            driver.write_sn_dport(socket, reset::SN_DPORT);
            driver.write_sn_mssr(socket, reset::SN_MSSR);
            driver.write_sn_tos(socket, reset::SN_TOS);
            driver.write_sn_ttl(socket, reset::SN_TTL);
            driver.write_sn_imr(socket, reset::SN_IMR);
            driver.write_sn_frag(socket, reset::SN_FRAG);
            driver.write_sn_kpalvtr(socket, reset::SN_KPALVTR);
            driver.write_sn_ir(socket, sn_ir::ALL);
        }

        let mut pool = self.pool.borrow_mut();
        pool.status[socket.index()] = SocketStatus::AvailableForAllocation;
        pool.detached[socket.index()] = false;
        pool.accepted[socket.index()] = false;
        pool.available += 1;

        debug!("socket {} deallocated", socket.as_u8());
    }

    /// Traps `NoSocketsAvailable` if the pool is empty
    #[cfg_attr(feature = "trap-location", track_caller)]
    fn allocate_socket(&self) -> SocketId {
        expect(
            self.sockets_available_for_allocation() > 0,
            ErrorCode::NoSocketsAvailable,
        );
        let sockets = self.allocate_sockets(1);
        sockets[0]
    }

    pub fn make_tcp_client(&self) -> tcp::Client<'_, D, TP, UP> {
        tcp::Client::new(self, self.allocate_socket())
    }

    pub fn make_tcp_acceptor(&self) -> tcp::Acceptor<'_, D, TP, UP> {
        let mut sockets = Vec::new();
        expect(
            sockets.push(self.allocate_socket()).is_ok(),
            ErrorCode::InsufficientCapacity,
        );
        tcp::Acceptor::new(self, sockets)
    }

    /// Acceptor backed by sockets taken with
    /// [`allocate_sockets`](Self::allocate_sockets)
    ///
    /// The acceptor owns the sockets from here on. Traps `LogicError` if
    /// `sockets` is empty, repeats a socket or names one that is not
    /// allocated.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn make_tcp_acceptor_with(
        &self,
        sockets: Vec<SocketId, SOCKETS>,
    ) -> tcp::Acceptor<'_, D, TP, UP> {
        expect(!sockets.is_empty(), ErrorCode::LogicError);
        for (index, &socket) in sockets.iter().enumerate() {
            expect(
                self.socket_status(socket) == SocketStatus::Allocated
                    && !sockets[..index].contains(&socket),
                ErrorCode::LogicError,
            );
        }
        tcp::Acceptor::new(self, sockets)
    }

    pub fn make_udp_socket(&self) -> udp::Socket<'_, D, TP, UP> {
        udp::Socket::new(self, self.allocate_socket())
    }

    // Plumbing shared by the socket types

    /// Issue a socket command and wait for the device to accept it
    pub(crate) fn execute_command(&self, socket: SocketId, command: u8) {
        let mut driver = self.driver();
        driver.write_sn_cr(socket, command);
        while driver.read_sn_cr(socket) != 0 {}
    }

    pub(crate) fn await_status(&self, socket: SocketId, status: u8) {
        let mut driver = self.driver();
        while driver.read_sn_sr(socket) != status {}
    }

    pub(crate) fn status(&self, socket: SocketId) -> u8 {
        self.driver().read_sn_sr(socket)
    }

    /// Select the socket's protocol, open it and wait for `status`
    pub(crate) fn open(&self, socket: SocketId, protocol: u8, status: u8) {
        {
            let mut driver = self.driver();
            let mode = driver.read_sn_mr(socket);
            driver.write_sn_mr(socket, (mode & !sn_mr::PROTOCOL_MASK) | protocol);
        }
        self.execute_command(socket, sn_cr::OPEN);
        self.await_status(socket, status);
    }

    pub(crate) fn set_mode_bits(&self, socket: SocketId, bits: u8, enabled: bool) {
        let mut driver = self.driver();
        let mode = driver.read_sn_mr(socket);
        let mode = if enabled { mode | bits } else { mode & !bits };
        driver.write_sn_mr(socket, mode);
    }

    /// TX buffer free space, range checked
    pub(crate) fn tx_free_size(&self, socket: SocketId) -> u16 {
        let free = self.driver().read_sn_tx_fsr(socket);
        self.expect_responsive(free <= self.socket_buffer_size().bytes());
        free
    }

    /// RX buffer fill level, range checked
    pub(crate) fn rx_received_size(&self, socket: SocketId) -> u16 {
        let received = self.driver().read_sn_rx_rsr(socket);
        self.expect_responsive(received <= self.socket_buffer_size().bytes());
        received
    }

    /// Port requested by a local endpoint
    ///
    /// The address must be unspecified or the stack's own, otherwise this
    /// traps `InvalidArgument`.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub(crate) fn requested_port(&self, endpoint: SocketAddr) -> u16 {
        let endpoint = ipv4_endpoint(endpoint);
        let address = Ipv4Address::from(*endpoint.ip());
        expect(
            address.is_unspecified() || address == self.ipv4_address(),
            ErrorCode::InvalidArgument,
        );
        endpoint.port()
    }

    pub(crate) fn allocate_tcp_port(&self, port: u16) -> u16 {
        let mut driver = self.driver();
        self.tcp_port_allocator
            .borrow_mut()
            .allocate(&mut *driver, port)
    }

    pub(crate) fn deallocate_tcp_port(&self, port: u16) {
        self.tcp_port_allocator.borrow_mut().deallocate(port);
    }

    pub(crate) fn allocate_udp_port(&self, port: u16) -> u16 {
        let mut driver = self.driver();
        self.udp_port_allocator
            .borrow_mut()
            .allocate(&mut *driver, port)
    }

    pub(crate) fn deallocate_udp_port(&self, port: u16) {
        self.udp_port_allocator.borrow_mut().deallocate(port);
    }

    pub(crate) fn is_accepted(&self, socket: SocketId) -> bool {
        self.pool.borrow().accepted[socket.index()]
    }

    pub(crate) fn set_accepted(&self, socket: SocketId, accepted: bool) {
        self.pool.borrow_mut().accepted[socket.index()] = accepted;
    }

    /// Hand an accepted socket over to its server connection
    pub(crate) fn detach(&self, socket: SocketId) {
        let mut pool = self.pool.borrow_mut();
        expect(
            pool.status[socket.index()] == SocketStatus::Allocated,
            ErrorCode::LogicError,
        );
        pool.detached[socket.index()] = true;
        debug!("socket {} detached", socket.as_u8());
    }

    /// Whether a detached server connection is bound to `port`
    pub(crate) fn detached_server_on_port(&self, port: u16) -> bool {
        let detached = self.pool.borrow().detached;
        let mut driver = self.driver();
        SocketId::ALL
            .iter()
            .any(|&socket| detached[socket.index()] && driver.read_sn_port(socket) == port)
    }

    pub(crate) fn expect_responsive(&self, condition: bool) {
        if !condition {
            self.nonresponsive();
        }
    }

    fn nonresponsive(&self) -> ! {
        error!("W5500 is nonresponsive");
        fatal_error(self.nonresponsive_device_error)
    }
}
