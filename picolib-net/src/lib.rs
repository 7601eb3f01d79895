//! Networking on top of the W5500 Ethernet controller
//!
//! The [`w5500::Stack`] owns the controller's hardware sockets and hands
//! them out to TCP clients, TCP acceptors and UDP sockets. Every socket
//! operation is non-blocking: when the hardware is not ready the call
//! returns [`ErrorCode::WouldBlock`](picolib_core::ErrorCode::WouldBlock)
//! and the caller polls again.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod ip;
pub mod w5500;
