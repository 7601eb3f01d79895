//! UDP sockets

use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use picolib_core::{expect, ErrorCode};
use picolib_drivers::w5500::registers::{sn_cr, sn_ir, sn_mr, sn_sr};

use super::{Driver, PortAllocator, SocketId, Stack};

/// Size of the packet info header the W5500 prepends to each datagram
const HEADER_SIZE: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Uninitialized,
    Initialized,
    Bound,
}

/// UDP socket
pub struct Socket<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> {
    stack: &'a Stack<D, TP, UP>,
    socket: SocketId,
    state: State,
    port: u16,
    is_transmitting: bool,
}

impl<'a, D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Socket<'a, D, TP, UP> {
    pub(super) fn new(stack: &'a Stack<D, TP, UP>, socket: SocketId) -> Self {
        Self {
            stack,
            socket,
            state: State::Initialized,
            port: 0,
            is_transmitting: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn socket_id(&self) -> SocketId {
        self.socket
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn expect_state(&self, state: State) {
        expect(self.state == state, ErrorCode::LogicError);
    }

    /// Drop broadcast datagrams
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn configure_broadcast_blocking(&mut self, blocking: bool) {
        self.expect_state(State::Initialized);
        self.stack.set_mode_bits(self.socket, sn_mr::BCASTB, blocking);
    }

    pub fn broadcast_blocking_configuration(&self) -> bool {
        self.stack.driver().read_sn_mr(self.socket) & sn_mr::BCASTB != 0
    }

    /// Drop unicast datagrams
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn configure_unicast_blocking(&mut self, blocking: bool) {
        self.expect_state(State::Initialized);
        self.stack.set_mode_bits(self.socket, sn_mr::UCASTB, blocking);
    }

    pub fn unicast_blocking_configuration(&self) -> bool {
        self.stack.driver().read_sn_mr(self.socket) & sn_mr::UCASTB != 0
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn configure_time_to_live(&mut self, time_to_live: u8) {
        self.expect_state(State::Initialized);
        self.stack.driver().write_sn_ttl(self.socket, time_to_live);
    }

    pub fn time_to_live_configuration(&self) -> u8 {
        self.stack.driver().read_sn_ttl(self.socket)
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn configure_interrupts(&mut self, mask: u8) {
        self.expect_state(State::Initialized);
        self.stack.driver().write_sn_imr(self.socket, mask);
    }

    pub fn enabled_interrupts(&self) -> u8 {
        self.stack.driver().read_sn_imr(self.socket)
    }

    pub fn interrupt_context(&self) -> u8 {
        self.stack.driver().read_sn_ir(self.socket)
    }

    pub fn clear_interrupts(&self, mask: u8) {
        self.stack.driver().write_sn_ir(self.socket, mask);
    }

    /// Bind to a local endpoint
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn bind(&mut self, endpoint: SocketAddr) {
        self.expect_state(State::Initialized);

        let port = self
            .stack
            .allocate_udp_port(self.stack.requested_port(endpoint));
        self.stack.driver().write_sn_port(self.socket, port);
        self.stack
            .open(self.socket, sn_mr::PROTOCOL_UDP, sn_sr::SOCK_UDP);

        self.port = port;
        self.state = State::Bound;
        debug!("socket {}: UDP bound to port {}", self.socket.as_u8(), port);
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn local_endpoint(&self) -> SocketAddrV4 {
        expect(self.state != State::Uninitialized, ErrorCode::LogicError);
        let port = self.stack.driver().read_sn_port(self.socket);
        SocketAddrV4::new(self.stack.ipv4_address().into(), port)
    }

    /// Send `data` as one datagram
    ///
    /// `ExcessiveMessageSize` if the datagram cannot fit in the socket
    /// buffer. `WouldBlock` while the previous datagram is in flight or the
    /// buffer lacks room.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn transmit(&mut self, endpoint: SocketAddrV4, data: &[u8]) -> Result<(), ErrorCode> {
        self.expect_state(State::Bound);

        if data.len() > usize::from(self.stack.socket_buffer_size().bytes()) {
            return Err(ErrorCode::ExcessiveMessageSize);
        }

        if self.is_transmitting {
            let mut driver = self.stack.driver();
            if driver.read_sn_ir(self.socket) & (sn_ir::SENDOK | sn_ir::TIMEOUT) == 0 {
                return Err(ErrorCode::WouldBlock);
            }
            driver.write_sn_ir(self.socket, sn_ir::SENDOK | sn_ir::TIMEOUT);
            self.is_transmitting = false;
        }

        if data.len() > usize::from(self.stack.tx_free_size(self.socket)) {
            return Err(ErrorCode::WouldBlock);
        }

        {
            let mut driver = self.stack.driver();
            driver.write_sn_dipr(self.socket, endpoint.ip().octets());
            driver.write_sn_dport(self.socket, endpoint.port());

            let write = driver.read_sn_tx_wr(self.socket);
            driver.write_tx_buffer(self.socket, write, data);
            driver.write_sn_tx_wr(self.socket, write.wrapping_add(data.len() as u16));
        }
        self.stack.execute_command(self.socket, sn_cr::SEND);
        self.is_transmitting = true;

        Ok(())
    }

    /// Receive one datagram into `data`
    ///
    /// Returns the sender and the number of bytes copied. The part of a
    /// datagram that does not fit in `data` is discarded.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn receive(&mut self, data: &mut [u8]) -> Result<(SocketAddrV4, usize), ErrorCode> {
        self.expect_state(State::Bound);

        let received = usize::from(self.stack.rx_received_size(self.socket));
        if received == 0 {
            return Err(ErrorCode::WouldBlock);
        }
        self.stack.expect_responsive(received >= HEADER_SIZE);

        let mut header = [0u8; HEADER_SIZE];
        let read = {
            let mut driver = self.stack.driver();
            let read = driver.read_sn_rx_rd(self.socket);
            driver.read_rx_buffer(self.socket, read, &mut header);
            read
        };

        let [a, b, c, d, port_high, port_low, size_high, size_low] = header;
        let sender = SocketAddrV4::new(
            Ipv4Addr::new(a, b, c, d),
            u16::from_be_bytes([port_high, port_low]),
        );
        let size = usize::from(u16::from_be_bytes([size_high, size_low]));
        self.stack.expect_responsive(HEADER_SIZE + size <= received);

        let length = data.len().min(size);
        {
            let mut driver = self.stack.driver();
            driver.read_rx_buffer(
                self.socket,
                read.wrapping_add(HEADER_SIZE as u16),
                &mut data[..length],
            );
            driver.write_sn_rx_rd(self.socket, read.wrapping_add((HEADER_SIZE + size) as u16));
        }
        self.stack.execute_command(self.socket, sn_cr::RECV);

        Ok((sender, length))
    }

    /// Release the port and the hardware socket
    pub fn close(&mut self) {
        match self.state {
            State::Uninitialized => return,
            State::Initialized => {}
            State::Bound => self.stack.deallocate_udp_port(self.port),
        }
        self.stack.deallocate_socket(self.socket);

        self.is_transmitting = false;
        self.state = State::Uninitialized;
        debug!("socket {}: UDP closed", self.socket.as_u8());
    }
}

impl<D: Driver, TP: PortAllocator<D>, UP: PortAllocator<D>> Drop for Socket<'_, D, TP, UP> {
    fn drop(&mut self) {
        self.close();
    }
}
