//! Error taxonomy and the fatal error trap
//!
//! Every error the library can report is a variant of [`ErrorCode`]. Whether a
//! given code is fatal or recoverable depends on where it is raised: the same
//! `WouldBlock` that a socket returns is never trapped, while a precondition
//! violation such as `WouldOverflow` always is.

use core::fmt;

/// Errors recognized by the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorCode {
    /// Argument outside the domain of the operation
    InvalidArgument,
    /// Index outside the valid range of a container
    OutOfRange,
    /// Container cannot hold the requested number of elements
    InsufficientCapacity,
    /// Write to a full buffer
    WouldOverflow,
    /// Read from an empty buffer
    WouldUnderflow,
    /// Operation cannot complete without blocking
    WouldBlock,
    /// Operation timed out
    OperationTimeout,
    /// Socket is not connected
    NotConnected,
    /// Message does not fit in the transport
    ExcessiveMessageSize,
    /// Stream is no longer nominal
    IoStreamDegraded,
    /// Malformed format string or argument count mismatch
    InvalidFormat,
    /// Operation invalid in the current state
    LogicError,
    /// No sockets left to allocate
    NoSocketsAvailable,
    /// Fewer sockets left than requested
    InsufficientSocketsAvailable,
    /// State handler returned a result the runtime did not expect
    UnexpectedEventHandlingResult,
    /// Device did not respond or responded out of its documented range
    NonresponsiveDevice,
    /// Bus controller reported a transport failure
    BusError,
    /// Requested port is held by another socket
    EndpointInUse,
}

impl ErrorCode {
    /// Variant name, used by formatters and trap messages
    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::OutOfRange => "OutOfRange",
            ErrorCode::InsufficientCapacity => "InsufficientCapacity",
            ErrorCode::WouldOverflow => "WouldOverflow",
            ErrorCode::WouldUnderflow => "WouldUnderflow",
            ErrorCode::WouldBlock => "WouldBlock",
            ErrorCode::OperationTimeout => "OperationTimeout",
            ErrorCode::NotConnected => "NotConnected",
            ErrorCode::ExcessiveMessageSize => "ExcessiveMessageSize",
            ErrorCode::IoStreamDegraded => "IoStreamDegraded",
            ErrorCode::InvalidFormat => "InvalidFormat",
            ErrorCode::LogicError => "LogicError",
            ErrorCode::NoSocketsAvailable => "NoSocketsAvailable",
            ErrorCode::InsufficientSocketsAvailable => "InsufficientSocketsAvailable",
            ErrorCode::UnexpectedEventHandlingResult => "UnexpectedEventHandlingResult",
            ErrorCode::NonresponsiveDevice => "NonresponsiveDevice",
            ErrorCode::BusError => "BusError",
            ErrorCode::EndpointInUse => "EndpointInUse",
        }
    }

    /// Check if this error is a transient condition the caller should retry
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorCode::WouldBlock)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Trap a fatal error
///
/// Hands the error to the platform panic handler. On target this is
/// `panic-probe` (or whatever the firmware links); on the host it unwinds
/// into the test harness.
#[cold]
#[cfg_attr(feature = "trap-location", track_caller)]
pub fn fatal_error(error: ErrorCode) -> ! {
    panic!("fatal error: {}", error.name())
}

/// Check a precondition, trapping `error` if it does not hold
#[inline]
#[cfg_attr(feature = "trap-location", track_caller)]
pub fn expect(condition: bool, error: ErrorCode) {
    if !condition {
        fatal_error(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::ToString;

    #[test]
    fn test_display_uses_variant_name() {
        assert_eq!(ErrorCode::WouldBlock.to_string(), "WouldBlock");
        assert_eq!(
            ErrorCode::InsufficientSocketsAvailable.to_string(),
            "InsufficientSocketsAvailable"
        );
    }

    #[test]
    fn test_transient_errors() {
        assert!(ErrorCode::WouldBlock.is_transient());
        assert!(!ErrorCode::NotConnected.is_transient());
        assert!(!ErrorCode::OperationTimeout.is_transient());
    }

    #[test]
    fn test_expect_holds() {
        expect(true, ErrorCode::LogicError);
    }

    #[test]
    #[should_panic(expected = "LogicError")]
    fn test_expect_traps() {
        expect(false, ErrorCode::LogicError);
    }
}
