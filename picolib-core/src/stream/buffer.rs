//! Output sinks
//!
//! [`OutputBuffer`] is the device-facing half of an output stream: anything
//! bytes can be pushed into. Only [`OutputBuffer::put_byte`] is required, the
//! rest default to iterating it.

use crate::error::ErrorCode;

/// Byte sink written to by an [`OutputStream`](super::OutputStream)
pub trait OutputBuffer {
    /// Write a single byte
    fn put_byte(&mut self, byte: u8) -> Result<(), ErrorCode>;

    /// Write a block of bytes
    fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), ErrorCode> {
        bytes.iter().try_for_each(|&byte| self.put_byte(byte))
    }

    /// Write a character, UTF-8 encoded
    fn put_char(&mut self, character: char) -> Result<(), ErrorCode> {
        let mut encoded = [0u8; 4];
        self.put_bytes(character.encode_utf8(&mut encoded).as_bytes())
    }

    /// Write a string
    fn put_str(&mut self, string: &str) -> Result<(), ErrorCode> {
        self.put_bytes(string.as_bytes())
    }

    /// Write a signed byte
    fn put_signed(&mut self, value: i8) -> Result<(), ErrorCode> {
        self.put_byte(value.to_ne_bytes()[0])
    }

    /// Write a block of signed bytes
    fn put_signed_bytes(&mut self, values: &[i8]) -> Result<(), ErrorCode> {
        values.iter().try_for_each(|&value| self.put_signed(value))
    }

    /// Write any buffered data to the device
    fn flush(&mut self) -> Result<(), ErrorCode> {
        Ok(())
    }
}

impl<B: OutputBuffer + ?Sized> OutputBuffer for &mut B {
    fn put_byte(&mut self, byte: u8) -> Result<(), ErrorCode> {
        (**self).put_byte(byte)
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), ErrorCode> {
        (**self).put_bytes(bytes)
    }

    fn put_char(&mut self, character: char) -> Result<(), ErrorCode> {
        (**self).put_char(character)
    }

    fn put_str(&mut self, string: &str) -> Result<(), ErrorCode> {
        (**self).put_str(string)
    }

    fn put_signed(&mut self, value: i8) -> Result<(), ErrorCode> {
        (**self).put_signed(value)
    }

    fn put_signed_bytes(&mut self, values: &[i8]) -> Result<(), ErrorCode> {
        (**self).put_signed_bytes(values)
    }

    fn flush(&mut self) -> Result<(), ErrorCode> {
        (**self).flush()
    }
}

impl<const N: usize> OutputBuffer for heapless::Vec<u8, N> {
    fn put_byte(&mut self, byte: u8) -> Result<(), ErrorCode> {
        self.push(byte).map_err(|_| ErrorCode::InsufficientCapacity)
    }

    fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), ErrorCode> {
        self.extend_from_slice(bytes)
            .map_err(|_| ErrorCode::InsufficientCapacity)
    }
}

impl<const N: usize> OutputBuffer for heapless::String<N> {
    /// Only ASCII bytes can be written byte-wise without breaking UTF-8
    fn put_byte(&mut self, byte: u8) -> Result<(), ErrorCode> {
        if !byte.is_ascii() {
            return Err(ErrorCode::InvalidArgument);
        }
        self.push(char::from(byte))
            .map_err(|_| ErrorCode::InsufficientCapacity)
    }

    fn put_char(&mut self, character: char) -> Result<(), ErrorCode> {
        self.push(character)
            .map_err(|_| ErrorCode::InsufficientCapacity)
    }

    fn put_str(&mut self, string: &str) -> Result<(), ErrorCode> {
        self.push_str(string)
            .map_err(|_| ErrorCode::InsufficientCapacity)
    }
}
