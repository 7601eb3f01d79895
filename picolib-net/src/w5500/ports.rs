//! Port allocation
//!
//! A socket takes its local port from the stack's port allocator when it
//! binds and returns it when it closes. Requesting [`ANY_PORT`] asks the
//! allocator for an ephemeral port.

use core::ops::RangeInclusive;

use heapless::Vec;
use picolib_core::{expect, fatal_error, ErrorCode};
use picolib_drivers::w5500::registers::{sn_mr, sn_sr};

use super::{Driver, SocketId, SOCKETS};
use crate::ip::ANY_PORT;

/// IANA dynamic port range
pub const EPHEMERAL_PORTS: RangeInclusive<u16> = 49152..=65535;

/// Local port allocator
pub trait PortAllocator<D: Driver> {
    /// Take `port`, or an ephemeral port if `port` is [`ANY_PORT`]
    ///
    /// Traps `EndpointInUse` if the port is held by another socket.
    fn allocate(&mut self, driver: &mut D, port: u16) -> u16;

    /// Return a port taken with [`allocate`](Self::allocate)
    fn deallocate(&mut self, port: u16);
}

/// Cycles through the ephemeral range
#[derive(Debug, Clone)]
struct EphemeralCursor {
    next: u16,
}

impl EphemeralCursor {
    const fn new() -> Self {
        Self {
            next: *EPHEMERAL_PORTS.start(),
        }
    }

    /// First port from the cursor onwards that is not in use
    fn find(&mut self, mut in_use: impl FnMut(u16) -> bool) -> u16 {
        let candidates = usize::from(EPHEMERAL_PORTS.end() - EPHEMERAL_PORTS.start()) + 1;
        for _ in 0..candidates {
            let port = self.next;
            self.next = if port == *EPHEMERAL_PORTS.end() {
                *EPHEMERAL_PORTS.start()
            } else {
                port + 1
            };

            if !in_use(port) {
                return port;
            }
        }

        fatal_error(ErrorCode::EndpointInUse)
    }
}

/// Allocator that records the ports it has handed out
#[derive(Debug, Clone)]
pub struct TrackingPortAllocator {
    in_use: Vec<u16, SOCKETS>,
    ephemeral: EphemeralCursor,
}

impl TrackingPortAllocator {
    pub const fn new() -> Self {
        Self {
            in_use: Vec::new(),
            ephemeral: EphemeralCursor::new(),
        }
    }

    pub fn is_in_use(&self, port: u16) -> bool {
        self.in_use.contains(&port)
    }

    pub fn ports_in_use(&self) -> &[u16] {
        &self.in_use
    }
}

impl Default for TrackingPortAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Driver> PortAllocator<D> for TrackingPortAllocator {
    fn allocate(&mut self, _driver: &mut D, port: u16) -> u16 {
        let port = if port == ANY_PORT {
            let in_use = &self.in_use;
            self.ephemeral.find(|port| in_use.contains(&port))
        } else {
            expect(!self.is_in_use(port), ErrorCode::EndpointInUse);
            port
        };

        if self.in_use.push(port).is_err() {
            fatal_error(ErrorCode::InsufficientCapacity);
        }

        trace!("port {} allocated", port);
        port
    }

    fn deallocate(&mut self, port: u16) {
        match self.in_use.iter().position(|&held| held == port) {
            Some(index) => {
                self.in_use.swap_remove(index);
                trace!("port {} deallocated", port);
            }
            None => fatal_error(ErrorCode::LogicError),
        }
    }
}

/// Allocator that derives port usage from the device's socket registers
///
/// A port is in use if an open socket of the allocator's protocol is bound
/// to it. Nothing is recorded, so deallocation is a no-op.
#[derive(Debug, Clone)]
pub struct HardwarePortAllocator {
    protocol: u8,
    ephemeral: EphemeralCursor,
}

impl HardwarePortAllocator {
    pub const fn tcp() -> Self {
        Self {
            protocol: sn_mr::PROTOCOL_TCP,
            ephemeral: EphemeralCursor::new(),
        }
    }

    pub const fn udp() -> Self {
        Self {
            protocol: sn_mr::PROTOCOL_UDP,
            ephemeral: EphemeralCursor::new(),
        }
    }

    pub fn is_in_use<D: Driver>(&self, driver: &mut D, port: u16) -> bool {
        Self::is_held(self.protocol, driver, port)
    }

    fn is_held<D: Driver>(protocol: u8, driver: &mut D, port: u16) -> bool {
        SocketId::ALL.iter().any(|&socket| {
            driver.read_sn_sr(socket) != sn_sr::SOCK_CLOSED
                && driver.read_sn_mr(socket) & sn_mr::PROTOCOL_MASK == protocol
                && driver.read_sn_port(socket) == port
        })
    }
}

impl<D: Driver> PortAllocator<D> for HardwarePortAllocator {
    fn allocate(&mut self, driver: &mut D, port: u16) -> u16 {
        if port == ANY_PORT {
            let protocol = self.protocol;
            return self
                .ephemeral
                .find(|candidate| Self::is_held(protocol, driver, candidate));
        }

        expect(!self.is_in_use(driver, port), ErrorCode::EndpointInUse);
        port
    }

    fn deallocate(&mut self, _port: u16) {}
}
