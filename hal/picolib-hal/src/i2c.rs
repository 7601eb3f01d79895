//! I2C bus abstractions
//!
//! Provides the bus-level primitives of an I2C master. Device drivers build
//! transactions out of them (start, address, data, stop) so that a single
//! controller can serve devices with very different framing.

/// Transfer direction, the R/W bit of the address frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// Master reads from the device (R/W = 1)
    Read,
    /// Master writes to the device (R/W = 0)
    Write,
}

impl Operation {
    /// Value of the R/W bit
    pub const fn bit(self) -> u8 {
        match self {
            Operation::Read => 1,
            Operation::Write => 0,
        }
    }
}

/// Acknowledgement of a transmitted byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Acknowledged (SDA pulled low)
    Ack,
    /// Not acknowledged
    Nack,
}

/// I2C bus master
///
/// Addresses are passed in transmitted form: the 7-bit address already
/// shifted into bits 7..1, with bit 0 clear.
pub trait I2cController {
    /// Bring the peripheral into a known state
    fn initialize(&mut self);

    /// Check if the peripheral detected a bus error
    fn bus_error_present(&self) -> bool;

    /// Transmit a START condition
    fn start(&mut self);

    /// Transmit a repeated START condition
    fn repeated_start(&mut self);

    /// Transmit a STOP condition
    fn stop(&mut self);

    /// Transmit an address frame
    fn address(&mut self, address: u8, operation: Operation) -> Response;

    /// Read a byte, answering with `response`
    fn read(&mut self, response: Response) -> u8;

    /// Read a block of bytes
    ///
    /// Every byte but the last is acknowledged; the last is answered with
    /// `response`.
    fn read_block(&mut self, data: &mut [u8], response: Response) {
        if let Some((last, rest)) = data.split_last_mut() {
            for byte in rest {
                *byte = self.read(Response::Ack);
            }
            *last = self.read(response);
        }
    }

    /// Write a byte
    fn write(&mut self, data: u8) -> Response;

    /// Write a block of bytes, stopping at the first NACK
    fn write_block(&mut self, data: &[u8]) -> Response {
        for &byte in data {
            if self.write(byte) != Response::Ack {
                return Response::Nack;
            }
        }
        Response::Ack
    }
}

impl<T: I2cController + ?Sized> I2cController for &mut T {
    fn initialize(&mut self) {
        (**self).initialize()
    }

    fn bus_error_present(&self) -> bool {
        (**self).bus_error_present()
    }

    fn start(&mut self) {
        (**self).start()
    }

    fn repeated_start(&mut self) {
        (**self).repeated_start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn address(&mut self, address: u8, operation: Operation) -> Response {
        (**self).address(address, operation)
    }

    fn read(&mut self, response: Response) -> u8 {
        (**self).read(response)
    }

    fn read_block(&mut self, data: &mut [u8], response: Response) {
        (**self).read_block(data, response)
    }

    fn write(&mut self, data: u8) -> Response {
        (**self).write(data)
    }

    fn write_block(&mut self, data: &[u8]) -> Response {
        (**self).write_block(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    /// Answers reads from a counter and NACKs writes of 0xFF
    #[derive(Default)]
    struct Counter {
        next: u8,
        acks: Vec<Response>,
        written: Vec<u8>,
    }

    impl I2cController for Counter {
        fn initialize(&mut self) {}

        fn bus_error_present(&self) -> bool {
            false
        }

        fn start(&mut self) {}

        fn repeated_start(&mut self) {}

        fn stop(&mut self) {}

        fn address(&mut self, _address: u8, _operation: Operation) -> Response {
            Response::Ack
        }

        fn read(&mut self, response: Response) -> u8 {
            self.acks.push(response);
            self.next += 1;
            self.next
        }

        fn write(&mut self, data: u8) -> Response {
            self.written.push(data);
            if data == 0xFF {
                Response::Nack
            } else {
                Response::Ack
            }
        }
    }

    #[test]
    fn test_operation_bit() {
        assert_eq!(Operation::Read.bit(), 1);
        assert_eq!(Operation::Write.bit(), 0);
    }

    #[test]
    fn test_read_block_nacks_last_byte() {
        let mut controller = Counter::default();
        let mut data = [0u8; 3];
        controller.read_block(&mut data, Response::Nack);
        assert_eq!(data, [1, 2, 3]);
        assert_eq!(
            controller.acks,
            [Response::Ack, Response::Ack, Response::Nack]
        );
    }

    #[test]
    fn test_read_block_empty() {
        let mut controller = Counter::default();
        controller.read_block(&mut [], Response::Nack);
        assert!(controller.acks.is_empty());
    }

    #[test]
    fn test_write_block_stops_at_nack() {
        let mut controller = Counter::default();
        assert_eq!(controller.write_block(&[1, 0xFF, 2]), Response::Nack);
        assert_eq!(controller.written, [1, 0xFF]);

        assert_eq!(controller.write_block(&[3, 4]), Response::Ack);
    }
}
