//! Per-type formatters
//!
//! A [`Printable`] value validates the text between the braces of its
//! placeholder with [`Printable::parse`] and then writes itself with
//! [`Printable::print`]. The built-in formatters accept only the empty
//! specification `{}`.

use core::fmt::{self, Write};

use crate::error::ErrorCode;

use super::buffer::OutputBuffer;

/// Value that can be substituted into a format string
pub trait Printable {
    /// Check if `spec` is a format specification this value understands
    fn parse(&self, spec: &str) -> bool {
        spec.is_empty()
    }

    /// Write the value, returning the number of bytes written
    fn print(&self, spec: &str, buffer: &mut dyn OutputBuffer) -> Result<usize, ErrorCode>;
}

impl<T: Printable + ?Sized> Printable for &T {
    fn parse(&self, spec: &str) -> bool {
        (**self).parse(spec)
    }

    fn print(&self, spec: &str, buffer: &mut dyn OutputBuffer) -> Result<usize, ErrorCode> {
        (**self).print(spec, buffer)
    }
}

/// Bridges `core::fmt` into an [`OutputBuffer`], counting bytes and keeping
/// the sink error that `fmt::Error` cannot carry
struct Adapter<'a> {
    buffer: &'a mut dyn OutputBuffer,
    written: usize,
    error: Option<ErrorCode>,
}

impl Write for Adapter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        match self.buffer.put_str(s) {
            Ok(()) => {
                self.written += s.len();
                Ok(())
            }
            Err(error) => {
                self.error = Some(error);
                Err(fmt::Error)
            }
        }
    }
}

fn print_args(buffer: &mut dyn OutputBuffer, args: fmt::Arguments<'_>) -> Result<usize, ErrorCode> {
    let mut adapter = Adapter {
        buffer,
        written: 0,
        error: None,
    };
    match adapter.write_fmt(args) {
        Ok(()) => Ok(adapter.written),
        Err(fmt::Error) => Err(adapter.error.unwrap_or(ErrorCode::InvalidFormat)),
    }
}

impl Printable for str {
    fn print(&self, _spec: &str, buffer: &mut dyn OutputBuffer) -> Result<usize, ErrorCode> {
        buffer.put_str(self)?;
        Ok(self.len())
    }
}

impl Printable for char {
    fn print(&self, _spec: &str, buffer: &mut dyn OutputBuffer) -> Result<usize, ErrorCode> {
        buffer.put_char(*self)?;
        Ok(self.len_utf8())
    }
}

impl Printable for ErrorCode {
    fn print(&self, _spec: &str, buffer: &mut dyn OutputBuffer) -> Result<usize, ErrorCode> {
        let name = self.name();
        buffer.put_str(name)?;
        Ok(name.len())
    }
}

macro_rules! impl_printable_via_display {
    ($($t:ty),* $(,)?) => {
        $(
            impl Printable for $t {
                fn print(&self, _spec: &str, buffer: &mut dyn OutputBuffer) -> Result<usize, ErrorCode> {
                    print_args(buffer, format_args!("{}", self))
                }
            }
        )*
    };
}

impl_printable_via_display!(bool, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

/// Prints an unsigned integer as `0x` followed by every nibble of its width
///
/// ```
/// # use picolib_core::stream::Hexadecimal;
/// // 0x002A
/// let value = Hexadecimal(42u16);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Hexadecimal<T>(pub T);

impl<T: fmt::UpperHex> Printable for Hexadecimal<T> {
    fn print(&self, _spec: &str, buffer: &mut dyn OutputBuffer) -> Result<usize, ErrorCode> {
        let nibbles = core::mem::size_of::<T>() * 2;
        print_args(buffer, format_args!("0x{:0width$X}", self.0, width = nibbles))
    }
}
