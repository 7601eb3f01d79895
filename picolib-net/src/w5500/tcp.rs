//! TCP sockets
//!
//! A [`Client`] connects out. An [`Acceptor`] listens on one or more
//! hardware sockets sharing a port and hands established connections out as
//! [`Server`]s. Both data planes share the same non-blocking transmit and
//! receive semantics.
//!
//! A server returns its socket to the acceptor's backlog when it closes. If
//! the acceptor closed first, the socket was detached and the server gives
//! it back to the stack instead.

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use heapless::Vec;
use picolib_core::{expect, fatal_error, ErrorCode};
use picolib_drivers::w5500::registers::{sn_cr, sn_ir, sn_mr, sn_sr};

use super::{Driver, PortAllocator, SocketId, Stack, SOCKETS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientState {
    Uninitialized,
    Initialized,
    Bound,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcceptorState {
    Uninitialized,
    Initialized,
    Bound,
    Listening,
}

/// Data plane of an open TCP socket
struct Connection<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> {
    stack: &'a Stack<D, TP, UP>,
    socket: SocketId,
    is_transmitting: bool,
}

impl<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Connection<'a, D, TP, UP> {
    fn new(stack: &'a Stack<D, TP, UP>, socket: SocketId) -> Self {
        Self {
            stack,
            socket,
            is_transmitting: false,
        }
    }

    fn local_endpoint(&self) -> SocketAddrV4 {
        let port = self.stack.driver().read_sn_port(self.socket);
        SocketAddrV4::new(self.stack.ipv4_address().into(), port)
    }

    fn remote_endpoint(&self) -> SocketAddrV4 {
        let mut driver = self.stack.driver();
        SocketAddrV4::new(
            Ipv4Addr::from(driver.read_sn_dipr(self.socket)),
            driver.read_sn_dport(self.socket),
        )
    }

    fn is_connected(&self) -> bool {
        self.stack.status(self.socket) == sn_sr::SOCK_ESTABLISHED
    }

    fn outstanding(&self) -> u16 {
        self.stack.socket_buffer_size().bytes() - self.stack.tx_free_size(self.socket)
    }

    fn transmit(&mut self, data: &[u8]) -> Result<usize, ErrorCode> {
        if data.is_empty() {
            return Ok(0);
        }

        if !self.is_connected() {
            return Err(ErrorCode::NotConnected);
        }

        if self.is_transmitting {
            let mut driver = self.stack.driver();
            if driver.read_sn_ir(self.socket) & sn_ir::SENDOK == 0 {
                return Err(ErrorCode::WouldBlock);
            }
            driver.write_sn_ir(self.socket, sn_ir::SENDOK);
            self.is_transmitting = false;
        }

        let free = usize::from(self.stack.tx_free_size(self.socket));
        if free == 0 {
            return Err(ErrorCode::WouldBlock);
        }

        let length = data.len().min(free);
        {
            let mut driver = self.stack.driver();
            let write = driver.read_sn_tx_wr(self.socket);
            driver.write_tx_buffer(self.socket, write, &data[..length]);
            driver.write_sn_tx_wr(self.socket, write.wrapping_add(length as u16));
        }
        self.stack.execute_command(self.socket, sn_cr::SEND);
        self.is_transmitting = true;

        Ok(length)
    }

    fn receive(&mut self, data: &mut [u8]) -> Result<usize, ErrorCode> {
        let peer_finished = match self.stack.status(self.socket) {
            sn_sr::SOCK_CLOSED => return Err(ErrorCode::NotConnected),
            sn_sr::SOCK_ESTABLISHED => false,
            sn_sr::SOCK_CLOSE_WAIT => true,
            _ => return Err(ErrorCode::WouldBlock),
        };

        let received = usize::from(self.stack.rx_received_size(self.socket));
        if received == 0 {
            return Err(if peer_finished {
                ErrorCode::NotConnected
            } else {
                ErrorCode::WouldBlock
            });
        }

        let length = data.len().min(received);
        {
            let mut driver = self.stack.driver();
            let read = driver.read_sn_rx_rd(self.socket);
            driver.read_rx_buffer(self.socket, read, &mut data[..length]);
            driver.write_sn_rx_rd(self.socket, read.wrapping_add(length as u16));
        }
        self.stack.execute_command(self.socket, sn_cr::RECV);

        Ok(length)
    }

    fn transmit_keepalive(&self) -> Result<(), ErrorCode> {
        if !self.is_connected() {
            return Err(ErrorCode::NotConnected);
        }

        self.stack.execute_command(self.socket, sn_cr::SEND_KEEP);
        Ok(())
    }

    fn shutdown(&self) {
        if self.stack.status(self.socket) != sn_sr::SOCK_CLOSED {
            self.stack.execute_command(self.socket, sn_cr::DISCON);
        }
    }

    fn enabled_interrupts(&self) -> u8 {
        self.stack.driver().read_sn_imr(self.socket)
    }

    fn interrupt_context(&self) -> u8 {
        self.stack.driver().read_sn_ir(self.socket)
    }

    fn clear_interrupts(&self, mask: u8) {
        self.stack.driver().write_sn_ir(self.socket, mask);
    }
}

/// Socket options shared by clients and acceptors
///
/// Options are written to every socket in `sockets()`; readbacks come from
/// the first.
macro_rules! socket_options {
    ($initialized:path) => {
        /// Disable delayed ACK
        #[cfg_attr(feature = "trap-location", track_caller)]
        pub fn configure_no_delayed_ack(&mut self, no_delayed_ack: bool) {
            self.expect_state($initialized);
            for &socket in self.sockets() {
                self.stack().set_mode_bits(socket, sn_mr::ND, no_delayed_ack);
            }
        }

        pub fn no_delayed_ack_configuration(&self) -> bool {
            self.stack().driver().read_sn_mr(self.sockets()[0]) & sn_mr::ND != 0
        }

        #[cfg_attr(feature = "trap-location", track_caller)]
        pub fn configure_maximum_segment_size(&mut self, maximum_segment_size: u16) {
            self.expect_state($initialized);
            for &socket in self.sockets() {
                self.stack().driver().write_sn_mssr(socket, maximum_segment_size);
            }
        }

        pub fn maximum_segment_size_configuration(&self) -> u16 {
            self.stack().driver().read_sn_mssr(self.sockets()[0])
        }

        #[cfg_attr(feature = "trap-location", track_caller)]
        pub fn configure_time_to_live(&mut self, time_to_live: u8) {
            self.expect_state($initialized);
            for &socket in self.sockets() {
                self.stack().driver().write_sn_ttl(socket, time_to_live);
            }
        }

        pub fn time_to_live_configuration(&self) -> u8 {
            self.stack().driver().read_sn_ttl(self.sockets()[0])
        }

        /// Keepalive period in 5 s units, 0 disables automatic keepalive
        #[cfg_attr(feature = "trap-location", track_caller)]
        pub fn configure_keepalive_period(&mut self, keepalive_period: u8) {
            self.expect_state($initialized);
            for &socket in self.sockets() {
                self.stack().driver().write_sn_kpalvtr(socket, keepalive_period);
            }
        }

        pub fn keepalive_period_configuration(&self) -> u8 {
            self.stack().driver().read_sn_kpalvtr(self.sockets()[0])
        }

        /// Select the socket interrupts routed to the interrupt pin
        #[cfg_attr(feature = "trap-location", track_caller)]
        pub fn configure_interrupts(&mut self, mask: u8) {
            self.expect_state($initialized);
            for &socket in self.sockets() {
                self.stack().driver().write_sn_imr(socket, mask);
            }
        }

        pub fn enabled_interrupts(&self) -> u8 {
            self.stack().driver().read_sn_imr(self.sockets()[0])
        }
    };
}

/// TCP client
pub struct Client<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> {
    connection: Connection<'a, D, TP, UP>,
    state: ClientState,
    port: u16,
}

impl<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Client<'a, D, TP, UP> {
    pub(super) fn new(stack: &'a Stack<D, TP, UP>, socket: SocketId) -> Self {
        Self {
            connection: Connection::new(stack, socket),
            state: ClientState::Initialized,
            port: 0,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn socket_id(&self) -> SocketId {
        self.connection.socket
    }

    fn stack(&self) -> &'a Stack<D, TP, UP> {
        self.connection.stack
    }

    fn sockets(&self) -> &[SocketId] {
        core::slice::from_ref(&self.connection.socket)
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn expect_state(&self, state: ClientState) {
        expect(self.state == state, ErrorCode::LogicError);
    }

    socket_options!(ClientState::Initialized);

    /// Bind to a local endpoint
    ///
    /// The address must be unspecified or the stack's own; port 0 requests
    /// an ephemeral port.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn bind(&mut self, endpoint: SocketAddr) {
        self.expect_state(ClientState::Initialized);

        let stack = self.stack();
        let socket = self.connection.socket;
        let port = stack.allocate_tcp_port(stack.requested_port(endpoint));
        stack.driver().write_sn_port(socket, port);
        stack.open(socket, sn_mr::PROTOCOL_TCP, sn_sr::SOCK_INIT);

        self.port = port;
        self.state = ClientState::Bound;
        debug!("socket {}: TCP client bound to port {}", socket.as_u8(), port);
    }

    /// Connect to a remote endpoint
    ///
    /// The first call starts the connection and returns `WouldBlock`.
    /// Later calls poll it: `Ok` once established, `OperationTimeout` if
    /// the device gave up, `WouldBlock` otherwise.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn connect(&mut self, endpoint: SocketAddrV4) -> Result<(), ErrorCode> {
        let stack = self.stack();
        let socket = self.connection.socket;

        match self.state {
            ClientState::Bound => {
                expect(
                    !endpoint.ip().is_unspecified() && endpoint.port() != 0,
                    ErrorCode::InvalidArgument,
                );
                {
                    let mut driver = stack.driver();
                    driver.write_sn_dipr(socket, endpoint.ip().octets());
                    driver.write_sn_dport(socket, endpoint.port());
                }
                stack.execute_command(socket, sn_cr::CONNECT);

                self.state = ClientState::Connecting;
                debug!("socket {}: TCP client connecting", socket.as_u8());
                Err(ErrorCode::WouldBlock)
            }
            ClientState::Connecting => match stack.status(socket) {
                sn_sr::SOCK_ESTABLISHED => {
                    self.state = ClientState::Connected;
                    debug!("socket {}: TCP client connected", socket.as_u8());
                    Ok(())
                }
                sn_sr::SOCK_CLOSED => Err(ErrorCode::OperationTimeout),
                _ => Err(ErrorCode::WouldBlock),
            },
            _ => fatal_error(ErrorCode::LogicError),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected && self.connection.is_connected()
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn local_endpoint(&self) -> SocketAddrV4 {
        expect(self.state != ClientState::Uninitialized, ErrorCode::LogicError);
        self.connection.local_endpoint()
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn remote_endpoint(&self) -> SocketAddrV4 {
        expect(self.state != ClientState::Uninitialized, ErrorCode::LogicError);
        self.connection.remote_endpoint()
    }

    /// Bytes written but not yet acknowledged by the peer
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn outstanding(&self) -> u16 {
        self.expect_state(ClientState::Connected);
        self.connection.outstanding()
    }

    /// Queue as much of `data` as fits in the TX buffer
    ///
    /// Returns the number of bytes queued.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn transmit(&mut self, data: &[u8]) -> Result<usize, ErrorCode> {
        self.expect_state(ClientState::Connected);
        self.connection.transmit(data)
    }

    /// Copy received data into `data`
    ///
    /// Returns the number of bytes copied. `NotConnected` once the peer has
    /// closed and every byte has been read.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn receive(&mut self, data: &mut [u8]) -> Result<usize, ErrorCode> {
        self.expect_state(ClientState::Connected);
        self.connection.receive(data)
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn transmit_keepalive(&self) -> Result<(), ErrorCode> {
        self.expect_state(ClientState::Connected);
        self.connection.transmit_keepalive()
    }

    /// Start a graceful disconnect
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn shutdown(&self) {
        self.expect_state(ClientState::Connected);
        self.connection.shutdown();
    }

    pub fn interrupt_context(&self) -> u8 {
        self.connection.interrupt_context()
    }

    pub fn clear_interrupts(&self, mask: u8) {
        self.connection.clear_interrupts(mask);
    }

    /// Release the port and the hardware socket
    pub fn close(&mut self) {
        let stack = self.stack();
        let socket = self.connection.socket;

        match self.state {
            ClientState::Uninitialized => return,
            ClientState::Initialized => {}
            _ => stack.deallocate_tcp_port(self.port),
        }
        stack.deallocate_socket(socket);

        self.state = ClientState::Uninitialized;
        debug!("socket {}: TCP client closed", socket.as_u8());
    }
}

impl<D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Drop for Client<'_, D, TP, UP> {
    fn drop(&mut self) {
        self.close();
    }
}

/// TCP listener
///
/// Every backing socket listens on the same port; the number of backing
/// sockets is the backlog.
pub struct Acceptor<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> {
    stack: &'a Stack<D, TP, UP>,
    sockets: Vec<SocketId, SOCKETS>,
    state: AcceptorState,
    port: u16,
    cursor: usize,
}

impl<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Acceptor<'a, D, TP, UP> {
    pub(super) fn new(stack: &'a Stack<D, TP, UP>, sockets: Vec<SocketId, SOCKETS>) -> Self {
        Self {
            stack,
            sockets,
            state: AcceptorState::Initialized,
            port: 0,
            cursor: 0,
        }
    }

    pub fn state(&self) -> AcceptorState {
        self.state
    }

    /// Backing sockets, in accept order
    pub fn socket_ids(&self) -> &[SocketId] {
        &self.sockets
    }

    fn stack(&self) -> &'a Stack<D, TP, UP> {
        self.stack
    }

    fn sockets(&self) -> &[SocketId] {
        &self.sockets
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn expect_state(&self, state: AcceptorState) {
        expect(self.state == state, ErrorCode::LogicError);
    }

    socket_options!(AcceptorState::Initialized);

    /// Bind every backing socket to a local endpoint
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn bind(&mut self, endpoint: SocketAddr) {
        self.expect_state(AcceptorState::Initialized);

        let stack = self.stack;
        let port = stack.allocate_tcp_port(stack.requested_port(endpoint));
        for &socket in &self.sockets {
            stack.driver().write_sn_port(socket, port);
            stack.open(socket, sn_mr::PROTOCOL_TCP, sn_sr::SOCK_INIT);
        }

        self.port = port;
        self.state = AcceptorState::Bound;
        debug!("TCP acceptor bound to port {}", port);
    }

    /// Start listening with room for `backlog` connections
    ///
    /// Grows the backing set from the stack's pool if the backlog exceeds
    /// it; traps `InsufficientSocketsAvailable` if the pool cannot cover it.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn listen(&mut self, backlog: usize) {
        self.expect_state(AcceptorState::Bound);

        let stack = self.stack;
        if backlog > self.sockets.len() {
            let template = self.sockets[0];
            for socket in stack.allocate_sockets(backlog - self.sockets.len()) {
                {
                    let mut driver = stack.driver();
                    let mode = driver.read_sn_mr(template);
                    let maximum_segment_size = driver.read_sn_mssr(template);
                    let time_to_live = driver.read_sn_ttl(template);
                    let keepalive_period = driver.read_sn_kpalvtr(template);
                    let interrupts = driver.read_sn_imr(template);

                    driver.write_sn_mr(socket, mode);
                    driver.write_sn_mssr(socket, maximum_segment_size);
                    driver.write_sn_ttl(socket, time_to_live);
                    driver.write_sn_kpalvtr(socket, keepalive_period);
                    driver.write_sn_imr(socket, interrupts);
                    driver.write_sn_port(socket, self.port);
                }
                stack.open(socket, sn_mr::PROTOCOL_TCP, sn_sr::SOCK_INIT);
                expect(self.sockets.push(socket).is_ok(), ErrorCode::InsufficientCapacity);
            }
        }

        for &socket in &self.sockets {
            stack.execute_command(socket, sn_cr::LISTEN);
        }

        self.state = AcceptorState::Listening;
        info!(
            "TCP acceptor listening on port {} with {} sockets",
            self.port,
            self.sockets.len()
        );
    }

    pub fn is_listening(&self) -> bool {
        self.state == AcceptorState::Listening
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn local_endpoint(&self) -> SocketAddrV4 {
        expect(self.state != AcceptorState::Uninitialized, ErrorCode::LogicError);
        let port = self.stack.driver().read_sn_port(self.sockets[0]);
        SocketAddrV4::new(self.stack.ipv4_address().into(), port)
    }

    /// Hand out the next backing socket with a connection
    ///
    /// Sockets are scanned round-robin; `WouldBlock` if none is ready.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn accept(&mut self) -> Result<Server<'a, D, TP, UP>, ErrorCode> {
        self.expect_state(AcceptorState::Listening);

        for _ in 0..self.sockets.len() {
            let socket = self.sockets[self.cursor];
            self.cursor = (self.cursor + 1) % self.sockets.len();

            if self.stack.is_accepted(socket) {
                continue;
            }

            if matches!(
                self.stack.status(socket),
                sn_sr::SOCK_CLOSED | sn_sr::SOCK_ESTABLISHED | sn_sr::SOCK_CLOSE_WAIT
            ) {
                self.stack.set_accepted(socket, true);
                debug!("socket {}: TCP connection accepted", socket.as_u8());
                return Ok(Server::new(self.stack, socket));
            }
        }

        Err(ErrorCode::WouldBlock)
    }

    /// Release the backing sockets and the port
    ///
    /// Sockets held by servers are detached and stay allocated until those
    /// servers close; the port is then released by the last of them.
    pub fn close(&mut self) {
        if self.state == AcceptorState::Uninitialized {
            return;
        }

        let mut detached = false;
        for &socket in &self.sockets {
            if self.stack.is_accepted(socket) {
                self.stack.detach(socket);
                detached = true;
            } else {
                self.stack.deallocate_socket(socket);
            }
        }

        if self.state != AcceptorState::Initialized && !detached {
            self.stack.deallocate_tcp_port(self.port);
        }

        self.sockets.clear();
        self.cursor = 0;
        self.state = AcceptorState::Uninitialized;
        debug!("TCP acceptor closed");
    }
}

impl<D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Drop for Acceptor<'_, D, TP, UP> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Connection accepted by an [`Acceptor`]
pub struct Server<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> {
    connection: Connection<'a, D, TP, UP>,
    is_open: bool,
}

impl<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Server<'a, D, TP, UP> {
    fn new(stack: &'a Stack<D, TP, UP>, socket: SocketId) -> Self {
        Self {
            connection: Connection::new(stack, socket),
            is_open: true,
        }
    }

    pub fn socket_id(&self) -> SocketId {
        self.connection.socket
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Whether the acceptor that created this connection has closed
    pub fn is_detached(&self) -> bool {
        self.connection.stack.tcp_server_is_detached(self.connection.socket)
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn expect_open(&self) {
        expect(self.is_open, ErrorCode::LogicError);
    }

    pub fn is_connected(&self) -> bool {
        self.is_open && self.connection.is_connected()
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn local_endpoint(&self) -> SocketAddrV4 {
        self.expect_open();
        self.connection.local_endpoint()
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn remote_endpoint(&self) -> SocketAddrV4 {
        self.expect_open();
        self.connection.remote_endpoint()
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn outstanding(&self) -> u16 {
        self.expect_open();
        self.connection.outstanding()
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn transmit(&mut self, data: &[u8]) -> Result<usize, ErrorCode> {
        self.expect_open();
        self.connection.transmit(data)
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn receive(&mut self, data: &mut [u8]) -> Result<usize, ErrorCode> {
        self.expect_open();
        self.connection.receive(data)
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn transmit_keepalive(&self) -> Result<(), ErrorCode> {
        self.expect_open();
        self.connection.transmit_keepalive()
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn shutdown(&self) {
        self.expect_open();
        self.connection.shutdown();
    }

    pub fn enabled_interrupts(&self) -> u8 {
        self.connection.enabled_interrupts()
    }

    pub fn interrupt_context(&self) -> u8 {
        self.connection.interrupt_context()
    }

    pub fn clear_interrupts(&self, mask: u8) {
        self.connection.clear_interrupts(mask);
    }

    /// Give the socket back
    ///
    /// An attached socket rejoins its acceptor's backlog. A detached socket
    /// is deallocated, and the port is released if no other detached server
    /// holds it.
    pub fn close(&mut self) {
        if !self.is_open {
            return;
        }

        let stack = self.connection.stack;
        let socket = self.connection.socket;

        if stack.tcp_server_is_detached(socket) {
            let port = stack.driver().read_sn_port(socket);
            stack.deallocate_socket(socket);
            if !stack.detached_server_on_port(port) {
                stack.deallocate_tcp_port(port);
            }
            debug!("socket {}: detached TCP server closed", socket.as_u8());
        } else {
            stack.execute_command(socket, sn_cr::CLOSE);
            stack.await_status(socket, sn_sr::SOCK_CLOSED);
            stack.driver().write_sn_ir(socket, sn_ir::ALL);
            stack.open(socket, sn_mr::PROTOCOL_TCP, sn_sr::SOCK_INIT);
            stack.execute_command(socket, sn_cr::LISTEN);
            stack.set_accepted(socket, false);
            debug!("socket {}: TCP server returned to backlog", socket.as_u8());
        }

        self.connection.is_transmitting = false;
        self.is_open = false;
    }
}

impl<D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Drop for Server<'_, D, TP, UP> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::w5500::testing::{initialized_stack, TestAcceptor, TestClient, TestStack};
    use crate::w5500::{SocketBufferSize, SocketStatus};
    use picolib_drivers::w5500::registers::SN_RX_RD;
    use std::vec;

    fn remote() -> SocketAddrV4 {
        SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 100), 5000)
    }

    fn any_port(port: u16) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], port))
    }

    fn connected_client(stack: &TestStack) -> TestClient<'_> {
        let mut client = stack.make_tcp_client();
        client.bind(any_port(0));
        assert_eq!(client.connect(remote()), Err(ErrorCode::WouldBlock));
        stack.driver().set_status(client.socket_id(), sn_sr::SOCK_ESTABLISHED);
        assert_eq!(client.connect(remote()), Ok(()));
        client
    }

    #[test]
    fn test_connect_happy_path() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = stack.make_tcp_client();
        client.bind(any_port(0));
        assert_eq!(client.state(), ClientState::Bound);

        assert_eq!(client.connect(remote()), Err(ErrorCode::WouldBlock));
        assert_eq!(client.state(), ClientState::Connecting);
        assert_eq!(client.remote_endpoint(), remote());

        stack.driver().set_status(client.socket_id(), sn_sr::SOCK_ESTABLISHED);
        assert_eq!(client.connect(remote()), Ok(()));
        assert_eq!(client.state(), ClientState::Connected);
        assert!(client.is_connected());
    }

    #[test]
    fn test_connect_in_progress_and_timeout() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = stack.make_tcp_client();
        client.bind(any_port(0));

        assert_eq!(client.connect(remote()), Err(ErrorCode::WouldBlock));
        assert_eq!(client.connect(remote()), Err(ErrorCode::WouldBlock));

        stack.driver().set_status(client.socket_id(), sn_sr::SOCK_CLOSED);
        assert_eq!(client.connect(remote()), Err(ErrorCode::OperationTimeout));
    }

    #[test]
    #[should_panic(expected = "LogicError")]
    fn test_connect_before_bind() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = stack.make_tcp_client();
        let _ = client.connect(remote());
    }

    #[test]
    fn test_bind_opens_tcp_socket_on_ephemeral_port() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = stack.make_tcp_client();
        client.bind(any_port(0));

        let socket = client.socket_id();
        assert_eq!(stack.status(socket), sn_sr::SOCK_INIT);
        assert_eq!(
            client.local_endpoint(),
            SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 2), 49152)
        );
        assert!(stack.tcp_port_allocator().is_in_use(49152));
        assert_eq!(
            stack.driver().read_sn_mr(socket) & sn_mr::PROTOCOL_MASK,
            sn_mr::PROTOCOL_TCP
        );
    }

    #[test]
    fn test_bind_to_own_address() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = stack.make_tcp_client();
        client.bind(SocketAddr::from(([192, 168, 1, 2], 8080)));

        assert_eq!(client.local_endpoint().port(), 8080);
    }

    #[test]
    #[should_panic(expected = "InvalidArgument")]
    fn test_bind_to_foreign_address() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = stack.make_tcp_client();
        client.bind(SocketAddr::from(([10, 0, 0, 1], 8080)));
    }

    #[test]
    fn test_configuration() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = stack.make_tcp_client();

        client.configure_no_delayed_ack(true);
        client.configure_maximum_segment_size(1460);
        client.configure_time_to_live(64);
        client.configure_keepalive_period(2);
        client.configure_interrupts(sn_ir::RECV | sn_ir::DISCON);

        assert!(client.no_delayed_ack_configuration());
        assert_eq!(client.maximum_segment_size_configuration(), 1460);
        assert_eq!(client.time_to_live_configuration(), 64);
        assert_eq!(client.keepalive_period_configuration(), 2);
        assert_eq!(client.enabled_interrupts(), sn_ir::RECV | sn_ir::DISCON);

        client.bind(any_port(0));
        assert!(client.no_delayed_ack_configuration());
    }

    #[test]
    #[should_panic(expected = "LogicError")]
    fn test_configuration_after_bind() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = stack.make_tcp_client();
        client.bind(any_port(0));
        client.configure_time_to_live(64);
    }

    #[test]
    fn test_transmit_empty_is_a_no_op() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = connected_client(&stack);
        let commands = stack.driver().commands.len();

        assert_eq!(client.transmit(&[]), Ok(0));
        assert_eq!(stack.driver().commands.len(), commands);
    }

    #[test]
    fn test_transmit() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = connected_client(&stack);
        let socket = client.socket_id();

        assert_eq!(client.transmit(b"hello"), Ok(5));
        assert_eq!(stack.driver().sent, vec![(socket, b"hello".to_vec())]);
        assert_eq!(stack.driver().read_sn_tx_wr(socket), 5);

        assert_eq!(client.transmit(b"world"), Ok(5));
        assert_eq!(stack.driver().sent[1], (socket, b"world".to_vec()));
    }

    #[test]
    fn test_transmit_waits_for_previous_transmission() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = connected_client(&stack);
        stack.driver().complete_transmissions = false;

        assert_eq!(client.transmit(b"first"), Ok(5));
        assert_eq!(client.transmit(b"second"), Err(ErrorCode::WouldBlock));

        stack.driver().raise_socket_interrupt(client.socket_id(), sn_ir::SENDOK);
        assert_eq!(client.transmit(b"second"), Ok(6));
        assert_eq!(client.interrupt_context() & sn_ir::SENDOK, 0);
    }

    #[test]
    fn test_transmit_is_limited_by_free_space() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = connected_client(&stack);

        stack.driver().tx_free_size_override = Some(0);
        assert_eq!(client.transmit(b"data"), Err(ErrorCode::WouldBlock));

        stack.driver().tx_free_size_override = Some(3);
        assert_eq!(client.transmit(b"data"), Ok(3));
        assert_eq!(stack.driver().sent[0].1, b"dat".to_vec());
    }

    #[test]
    fn test_transmit_after_connection_loss() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = connected_client(&stack);
        stack.driver().set_status(client.socket_id(), sn_sr::SOCK_CLOSED);

        assert_eq!(client.transmit(b"data"), Err(ErrorCode::NotConnected));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_outstanding() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let client = connected_client(&stack);
        assert_eq!(client.outstanding(), 0);

        stack.driver().tx_free_size_override = Some(2000);
        assert_eq!(client.outstanding(), 48);
    }

    #[test]
    #[should_panic(expected = "NonresponsiveDevice")]
    fn test_outstanding_with_free_size_out_of_range() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let client = connected_client(&stack);
        stack.driver().tx_free_size_override = Some(2049);
        client.outstanding();
    }

    #[test]
    fn test_receive() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = connected_client(&stack);
        let socket = client.socket_id();
        let mut data = [0u8; 4];

        assert_eq!(client.receive(&mut data), Err(ErrorCode::WouldBlock));

        stack.driver().receive_segment(socket, b"abcdef");
        assert_eq!(client.receive(&mut data), Ok(4));
        assert_eq!(&data, b"abcd");
        assert_eq!(stack.driver().commands.last(), Some(&(socket, sn_cr::RECV)));

        assert_eq!(client.receive(&mut data), Ok(2));
        assert_eq!(&data[..2], b"ef");
        assert_eq!(stack.driver().socket_register(socket, SN_RX_RD + 1), 6);
    }

    #[test]
    fn test_receive_after_peer_closed() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = connected_client(&stack);
        let socket = client.socket_id();
        let mut data = [0u8; 8];

        stack.driver().receive_segment(socket, b"bye");
        stack.driver().set_status(socket, sn_sr::SOCK_CLOSE_WAIT);
        assert_eq!(client.receive(&mut data), Ok(3));
        assert_eq!(client.receive(&mut data), Err(ErrorCode::NotConnected));

        stack.driver().set_status(socket, sn_sr::SOCK_FIN_WAIT);
        assert_eq!(client.receive(&mut data), Err(ErrorCode::WouldBlock));

        stack.driver().set_status(socket, sn_sr::SOCK_CLOSED);
        assert_eq!(client.receive(&mut data), Err(ErrorCode::NotConnected));
    }

    #[test]
    fn test_keepalive() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let client = connected_client(&stack);
        let socket = client.socket_id();

        assert_eq!(client.transmit_keepalive(), Ok(()));
        assert_eq!(stack.driver().commands.last(), Some(&(socket, sn_cr::SEND_KEEP)));

        stack.driver().set_status(socket, sn_sr::SOCK_CLOSE_WAIT);
        assert_eq!(client.transmit_keepalive(), Err(ErrorCode::NotConnected));
    }

    #[test]
    fn test_shutdown() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let client = connected_client(&stack);
        let socket = client.socket_id();

        client.shutdown();
        assert_eq!(stack.driver().commands.last(), Some(&(socket, sn_cr::DISCON)));

        let commands = stack.driver().commands.len();
        client.shutdown();
        assert_eq!(stack.driver().commands.len(), commands);
    }

    #[test]
    fn test_close_releases_port_and_socket() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut client = connected_client(&stack);
        let socket = client.socket_id();

        client.close();
        assert_eq!(client.state(), ClientState::Uninitialized);
        assert_eq!(stack.socket_status(socket), SocketStatus::AvailableForAllocation);
        assert!(stack.tcp_port_allocator().ports_in_use().is_empty());

        client.close();
        assert_eq!(stack.sockets_available_for_allocation(), 8);
    }

    #[test]
    fn test_drop_closes() {
        let stack = initialized_stack(SocketBufferSize::KiB4);
        {
            let mut client = stack.make_tcp_client();
            client.bind(any_port(0));
            assert_eq!(stack.sockets_available_for_allocation(), 3);
        }
        assert_eq!(stack.sockets_available_for_allocation(), 4);
        assert!(stack.tcp_port_allocator().ports_in_use().is_empty());
    }

    fn listening_acceptor(stack: &TestStack, backlog: usize) -> TestAcceptor<'_> {
        let mut acceptor = stack.make_tcp_acceptor();
        acceptor.bind(any_port(80));
        acceptor.listen(backlog);
        acceptor
    }

    #[test]
    fn test_listen_grows_backing_set() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut acceptor = stack.make_tcp_acceptor();
        acceptor.configure_time_to_live(32);
        acceptor.bind(any_port(80));
        acceptor.listen(3);

        assert!(acceptor.is_listening());
        assert_eq!(acceptor.socket_ids().len(), 3);
        assert_eq!(stack.sockets_available_for_allocation(), 5);
        for &socket in acceptor.socket_ids() {
            assert_eq!(stack.status(socket), sn_sr::SOCK_LISTEN);
            let mut driver = stack.driver();
            assert_eq!(driver.read_sn_port(socket), 80);
            assert_eq!(driver.read_sn_ttl(socket), 32);
        }
        assert_eq!(acceptor.local_endpoint().port(), 80);
    }

    #[test]
    fn test_acceptor_over_preallocated_sockets() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let initial = stack.allocate_sockets(2);
        let mut acceptor = stack.make_tcp_acceptor_with(initial.clone());
        assert_eq!(acceptor.socket_ids(), initial.as_slice());

        acceptor.configure_time_to_live(32);
        acceptor.configure_maximum_segment_size(536);
        acceptor.bind(any_port(80));
        for &socket in acceptor.socket_ids() {
            assert_eq!(stack.status(socket), sn_sr::SOCK_INIT);
        }

        acceptor.listen(3);
        assert_eq!(acceptor.socket_ids().len(), 3);
        assert_eq!(&acceptor.socket_ids()[..2], initial.as_slice());
        assert_eq!(stack.sockets_available_for_allocation(), 5);
        for &socket in acceptor.socket_ids() {
            assert_eq!(stack.status(socket), sn_sr::SOCK_LISTEN);
            let mut driver = stack.driver();
            assert_eq!(driver.read_sn_port(socket), 80);
            assert_eq!(driver.read_sn_ttl(socket), 32);
            assert_eq!(driver.read_sn_mssr(socket), 536);
        }

        let [a, b, c] = [
            acceptor.socket_ids()[0],
            acceptor.socket_ids()[1],
            acceptor.socket_ids()[2],
        ];
        stack.driver().set_status(b, sn_sr::SOCK_ESTABLISHED);
        let mut server = acceptor.accept().unwrap();
        assert_eq!(server.socket_id(), b);

        drop(acceptor);

        assert!(server.is_detached());
        assert_eq!(stack.socket_status(b), SocketStatus::Allocated);
        assert_eq!(stack.socket_status(a), SocketStatus::AvailableForAllocation);
        assert_eq!(stack.socket_status(c), SocketStatus::AvailableForAllocation);
        assert!(stack.tcp_port_allocator().is_in_use(80));
        assert_eq!(server.transmit(b"ping"), Ok(4));

        server.close();
        assert!(!stack.tcp_port_allocator().is_in_use(80));
        assert_eq!(stack.sockets_available_for_allocation(), 8);
    }

    #[test]
    #[should_panic(expected = "LogicError")]
    fn test_acceptor_over_no_sockets() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let _acceptor = stack.make_tcp_acceptor_with(Vec::new());
    }

    #[test]
    #[should_panic(expected = "LogicError")]
    fn test_acceptor_over_unallocated_socket() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut sockets = stack.allocate_sockets(1);
        sockets.push(SocketId::new(5)).unwrap();
        let _acceptor = stack.make_tcp_acceptor_with(sockets);
    }

    #[test]
    #[should_panic(expected = "LogicError")]
    fn test_acceptor_over_repeated_socket() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut sockets = stack.allocate_sockets(1);
        let first = sockets[0];
        sockets.push(first).unwrap();
        let _acceptor = stack.make_tcp_acceptor_with(sockets);
    }

    #[test]
    #[should_panic(expected = "InsufficientSocketsAvailable")]
    fn test_listen_beyond_pool() {
        let stack = initialized_stack(SocketBufferSize::KiB8);
        listening_acceptor(&stack, 3);
    }

    #[test]
    fn test_accept_round_robin() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut acceptor = listening_acceptor(&stack, 2);
        let [a, b] = [acceptor.socket_ids()[0], acceptor.socket_ids()[1]];

        assert!(matches!(acceptor.accept(), Err(ErrorCode::WouldBlock)));

        stack.driver().set_status(b, sn_sr::SOCK_ESTABLISHED);
        let server = acceptor.accept().unwrap();
        assert_eq!(server.socket_id(), b);
        assert!(server.is_connected());
        assert!(matches!(acceptor.accept(), Err(ErrorCode::WouldBlock)));

        stack.driver().set_status(a, sn_sr::SOCK_ESTABLISHED);
        let server = acceptor.accept().unwrap();
        assert_eq!(server.socket_id(), a);
    }

    #[test]
    #[should_panic(expected = "LogicError")]
    fn test_accept_before_listen() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut acceptor = stack.make_tcp_acceptor();
        let _ = acceptor.accept();
    }

    #[test]
    fn test_server_data_plane() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut acceptor = listening_acceptor(&stack, 1);
        let socket = acceptor.socket_ids()[0];
        stack.driver().set_status(socket, sn_sr::SOCK_ESTABLISHED);

        let mut server = acceptor.accept().unwrap();
        stack.driver().receive_segment(socket, b"ping");
        let mut data = [0u8; 4];
        assert_eq!(server.receive(&mut data), Ok(4));
        assert_eq!(server.transmit(b"pong"), Ok(4));
        assert_eq!(stack.driver().sent[0], (socket, b"pong".to_vec()));
        assert_eq!(server.local_endpoint().port(), 80);
        assert!(!server.is_detached());
    }

    #[test]
    fn test_closed_server_rejoins_backlog() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut acceptor = listening_acceptor(&stack, 1);
        let socket = acceptor.socket_ids()[0];
        stack.driver().set_status(socket, sn_sr::SOCK_ESTABLISHED);

        let mut server = acceptor.accept().unwrap();
        server.close();

        assert!(!server.is_open());
        assert_eq!(stack.status(socket), sn_sr::SOCK_LISTEN);
        assert_eq!(stack.socket_status(socket), SocketStatus::Allocated);
        assert!(matches!(acceptor.accept(), Err(ErrorCode::WouldBlock)));

        stack.driver().set_status(socket, sn_sr::SOCK_ESTABLISHED);
        assert_eq!(acceptor.accept().unwrap().socket_id(), socket);
    }

    #[test]
    fn test_server_outlives_acceptor() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut acceptor = listening_acceptor(&stack, 2);
        let [a, b] = [acceptor.socket_ids()[0], acceptor.socket_ids()[1]];

        stack.driver().set_status(a, sn_sr::SOCK_ESTABLISHED);
        let mut server = acceptor.accept().unwrap();
        assert_eq!(server.socket_id(), a);

        drop(acceptor);

        assert!(stack.tcp_server_is_detached(a));
        assert!(server.is_detached());
        assert_eq!(stack.socket_status(a), SocketStatus::Allocated);
        assert!(!stack.tcp_server_is_detached(b));
        assert_eq!(stack.socket_status(b), SocketStatus::AvailableForAllocation);
        assert!(stack.tcp_port_allocator().is_in_use(80));

        assert_eq!(server.transmit(b"still here"), Ok(10));

        server.close();

        assert!(!stack.tcp_server_is_detached(a));
        assert_eq!(stack.socket_status(a), SocketStatus::AvailableForAllocation);
        assert!(!stack.tcp_port_allocator().is_in_use(80));
        assert_eq!(stack.sockets_available_for_allocation(), 8);
    }

    #[test]
    fn test_last_detached_server_releases_port() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut acceptor = listening_acceptor(&stack, 2);
        for &socket in acceptor.socket_ids() {
            stack.driver().set_status(socket, sn_sr::SOCK_ESTABLISHED);
        }
        let first = acceptor.accept().unwrap();
        let second = acceptor.accept().unwrap();
        drop(acceptor);

        drop(first);
        assert!(stack.tcp_port_allocator().is_in_use(80));
        drop(second);
        assert!(!stack.tcp_port_allocator().is_in_use(80));
    }

    #[test]
    fn test_acceptor_close_without_connections() {
        let stack = initialized_stack(SocketBufferSize::KiB2);
        let mut acceptor = listening_acceptor(&stack, 3);

        acceptor.close();
        assert_eq!(acceptor.state(), AcceptorState::Uninitialized);
        assert_eq!(stack.sockets_available_for_allocation(), 8);
        assert!(stack.tcp_port_allocator().ports_in_use().is_empty());
    }
}
