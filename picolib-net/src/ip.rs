//! Link and network layer addresses
//!
//! Endpoints are `core::net::SocketAddrV4`. The address types here are the
//! plain-data forms used in configuration.

use core::fmt;
use core::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use picolib_core::{fatal_error, ErrorCode};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Port value that requests an ephemeral port
pub const ANY_PORT: u16 = 0;

/// Unspecified address, ephemeral port
pub const ANY_ENDPOINT: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, ANY_PORT));

/// Ethernet MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub const fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }

    pub const fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 != 0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// IPv4 address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Ipv4Address(pub [u8; 4]);

impl Ipv4Address {
    pub const UNSPECIFIED: Self = Self([0; 4]);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Self([a, b, c, d])
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0
    }

    pub const fn is_unspecified(&self) -> bool {
        u32::from_be_bytes(self.0) == 0
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(address: Ipv4Addr) -> Self {
        Self(address.octets())
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(address: Ipv4Address) -> Self {
        Ipv4Addr::from(address.0)
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Ipv4Addr::from(*self), f)
    }
}

/// Narrow an endpoint to IPv4
///
/// The unspecified IPv6 address is accepted as "any". Every other IPv6
/// endpoint traps `InvalidArgument`.
#[cfg_attr(feature = "trap-location", track_caller)]
pub fn ipv4_endpoint(endpoint: SocketAddr) -> SocketAddrV4 {
    match endpoint {
        SocketAddr::V4(endpoint) => endpoint,
        SocketAddr::V6(endpoint) if endpoint.ip().is_unspecified() => {
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, endpoint.port())
        }
        SocketAddr::V6(_) => fatal_error(ErrorCode::InvalidArgument),
    }
}
