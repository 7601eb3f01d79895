//! Output stream

use crate::error::{expect, ErrorCode};

use super::buffer::OutputBuffer;
use super::format::Printable;

const END_OF_FILE_REACHED: u8 = 1 << 0;
const IO_ERROR_PRESENT: u8 = 1 << 1;
const FATAL_ERROR_PRESENT: u8 = 1 << 2;

/// Formatted output over an [`OutputBuffer`]
///
/// Every operation requires the stream to be nominal and traps
/// `IoStreamDegraded` otherwise. A sink error sets the fatal error flag,
/// which can never be cleared, and is returned to the caller.
#[derive(Debug)]
pub struct OutputStream<B> {
    buffer: B,
    state: u8,
}

impl<B: OutputBuffer> OutputStream<B> {
    pub const fn new(buffer: B) -> Self {
        Self { buffer, state: 0 }
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut B {
        &mut self.buffer
    }

    pub fn into_buffer(self) -> B {
        self.buffer
    }

    /// Check if no error flag is set
    pub fn is_nominal(&self) -> bool {
        self.state == 0
    }

    pub fn end_of_file_reached(&self) -> bool {
        self.state & END_OF_FILE_REACHED != 0
    }

    pub fn io_error_present(&self) -> bool {
        self.state & IO_ERROR_PRESENT != 0
    }

    pub fn fatal_error_present(&self) -> bool {
        self.state & FATAL_ERROR_PRESENT != 0
    }

    pub fn report_end_of_file_reached(&mut self) {
        self.state |= END_OF_FILE_REACHED;
    }

    pub fn clear_end_of_file_reached_report(&mut self) {
        self.state &= !END_OF_FILE_REACHED;
    }

    pub fn report_io_error(&mut self) {
        self.state |= IO_ERROR_PRESENT;
    }

    pub fn clear_io_error_report(&mut self) {
        self.state &= !IO_ERROR_PRESENT;
    }

    pub fn report_fatal_error(&mut self) {
        self.state |= FATAL_ERROR_PRESENT;
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    fn forward<T>(
        &mut self,
        operation: impl FnOnce(&mut B) -> Result<T, ErrorCode>,
    ) -> Result<T, ErrorCode> {
        expect(self.is_nominal(), ErrorCode::IoStreamDegraded);

        let result = operation(&mut self.buffer);
        if result.is_err() {
            self.report_fatal_error();
        }
        result
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn put_byte(&mut self, byte: u8) -> Result<(), ErrorCode> {
        self.forward(|buffer| buffer.put_byte(byte))
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), ErrorCode> {
        self.forward(|buffer| buffer.put_bytes(bytes))
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn put_char(&mut self, character: char) -> Result<(), ErrorCode> {
        self.forward(|buffer| buffer.put_char(character))
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn put_str(&mut self, string: &str) -> Result<(), ErrorCode> {
        self.forward(|buffer| buffer.put_str(string))
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn put_signed(&mut self, value: i8) -> Result<(), ErrorCode> {
        self.forward(|buffer| buffer.put_signed(value))
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn put_signed_bytes(&mut self, values: &[i8]) -> Result<(), ErrorCode> {
        self.forward(|buffer| buffer.put_signed_bytes(values))
    }

    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn flush(&mut self) -> Result<(), ErrorCode> {
        self.forward(|buffer| buffer.flush())
    }

    /// Write a single value with its default format
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn put_value(&mut self, value: &dyn Printable) -> Result<usize, ErrorCode> {
        self.print("{}", &[value])
    }

    /// Write `format`, substituting `args` for its `{}` placeholders
    ///
    /// `{{` and `}}` write literal braces. The format is validated against
    /// `args` before anything is written: a malformed format, a placeholder
    /// specification an argument rejects, or a placeholder count that does
    /// not match `args.len()` traps `InvalidFormat`.
    ///
    /// Returns the number of bytes written.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn print(&mut self, format: &str, args: &[&dyn Printable]) -> Result<usize, ErrorCode> {
        expect(self.is_nominal(), ErrorCode::IoStreamDegraded);
        expect(format_matches(format, args), ErrorCode::InvalidFormat);

        self.forward(|buffer| {
            let mut remaining = args.iter();
            let mut written = 0;
            for segment in Segments::new(format) {
                match segment {
                    Segment::Literal(text) => {
                        buffer.put_str(text)?;
                        written += text.len();
                    }
                    Segment::Placeholder(spec) => {
                        if let Some(arg) = remaining.next() {
                            written += arg.print(spec, buffer)?;
                        }
                    }
                    Segment::Invalid => {}
                }
            }
            Ok(written)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Placeholder(&'a str),
    Invalid,
}

struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Segments<'a> {
    fn new(format: &'a str) -> Self {
        Self { rest: format }
    }

    fn advance(&mut self, n: usize) -> &'a str {
        let (head, tail) = self.rest.split_at(n);
        self.rest = tail;
        head
    }
}

impl<'a> Iterator for Segments<'a> {
    type Item = Segment<'a>;

    fn next(&mut self) -> Option<Segment<'a>> {
        let rest = self.rest;
        let bytes = rest.as_bytes();
        let segment = match bytes {
            [] => return None,
            [b'{', b'{', ..] => {
                self.advance(2);
                Segment::Literal("{")
            }
            [b'}', b'}', ..] => {
                self.advance(2);
                Segment::Literal("}")
            }
            [b'{', ..] => match rest[1..].find(is_brace).map(|offset| offset + 1) {
                Some(close) if bytes[close] == b'}' => {
                    self.advance(close + 1);
                    Segment::Placeholder(&rest[1..close])
                }
                _ => {
                    self.rest = "";
                    Segment::Invalid
                }
            },
            [b'}', ..] => {
                self.rest = "";
                Segment::Invalid
            }
            _ => {
                let end = rest.find(is_brace).unwrap_or(rest.len());
                Segment::Literal(self.advance(end))
            }
        };
        Some(segment)
    }
}

fn is_brace(c: char) -> bool {
    c == '{' || c == '}'
}

fn format_matches(format: &str, args: &[&dyn Printable]) -> bool {
    let mut remaining = args.iter();
    for segment in Segments::new(format) {
        match segment {
            Segment::Literal(_) => {}
            Segment::Placeholder(spec) => match remaining.next() {
                Some(arg) if arg.parse(spec) => {}
                _ => return false,
            },
            Segment::Invalid => return false,
        }
    }
    remaining.next().is_none()
}

/// Print to an [`OutputStream`] with the arguments listed inline
///
/// ```
/// # use picolib_core::{print_to, stream::OutputStream};
/// let mut stream = OutputStream::new(heapless::String::<16>::new());
/// print_to!(stream, "{} + {} = {}", 1, 2, 3).unwrap();
/// assert_eq!(stream.buffer().as_str(), "1 + 2 = 3");
/// ```
#[macro_export]
macro_rules! print_to {
    ($stream:expr, $format:expr $(, $arg:expr)* $(,)?) => {
        $stream.print($format, &[$(&$arg as &dyn $crate::stream::Printable),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Hexadecimal;
    use heapless::String;

    /// Accepts a fixed number of bytes, then fails
    struct Failing {
        remaining: usize,
        flushes: usize,
    }

    impl OutputBuffer for Failing {
        fn put_byte(&mut self, _byte: u8) -> Result<(), ErrorCode> {
            if self.remaining == 0 {
                return Err(ErrorCode::BusError);
            }
            self.remaining -= 1;
            Ok(())
        }

        fn flush(&mut self) -> Result<(), ErrorCode> {
            self.flushes += 1;
            Ok(())
        }
    }

    fn stream() -> OutputStream<String<64>> {
        OutputStream::new(String::new())
    }

    #[test]
    fn test_print_substitutes_in_order() {
        let mut stream = stream();
        let written = stream
            .print("{} is {} ({})", &[&"answer", &42u8, &Hexadecimal(42u8)])
            .unwrap();
        assert_eq!(stream.buffer().as_str(), "answer is 42 (0x2A)");
        assert_eq!(written, "answer is 42 (0x2A)".len());
    }

    #[test]
    fn test_print_escaped_braces() {
        let mut stream = stream();
        print_to!(stream, "{{}} {{{}}}", 'x').unwrap();
        assert_eq!(stream.buffer().as_str(), "{} {x}");
    }

    #[test]
    fn test_print_without_placeholders() {
        let mut stream = stream();
        assert_eq!(stream.print("plain", &[]), Ok(5));
        assert_eq!(stream.buffer().as_str(), "plain");
    }

    #[test]
    fn test_put_operations() {
        let mut stream = stream();
        stream.put_char('a').unwrap();
        stream.put_str("bc").unwrap();
        stream.put_bytes(b"d").unwrap();
        stream.put_value(&ErrorCode::LogicError).unwrap();
        stream.flush().unwrap();
        assert_eq!(stream.buffer().as_str(), "abcdLogicError");
    }

    #[test]
    #[should_panic(expected = "InvalidFormat")]
    fn test_print_too_few_arguments() {
        let _ = stream().print("{} {}", &[&1u8]);
    }

    #[test]
    #[should_panic(expected = "InvalidFormat")]
    fn test_print_too_many_arguments() {
        let _ = stream().print("{}", &[&1u8, &2u8]);
    }

    #[test]
    #[should_panic(expected = "InvalidFormat")]
    fn test_print_unmatched_open_brace() {
        let _ = stream().print("value: {", &[]);
    }

    #[test]
    #[should_panic(expected = "InvalidFormat")]
    fn test_print_unmatched_close_brace() {
        let _ = stream().print("value: }", &[]);
    }

    #[test]
    #[should_panic(expected = "InvalidFormat")]
    fn test_print_unsupported_spec() {
        let _ = stream().print("{:x}", &[&1u8]);
    }

    #[test]
    fn test_sink_error_degrades_stream() {
        let mut stream = OutputStream::new(Failing {
            remaining: 2,
            flushes: 0,
        });
        assert_eq!(stream.put_str("abc"), Err(ErrorCode::BusError));
        assert!(stream.fatal_error_present());
        assert!(!stream.is_nominal());
    }

    #[test]
    #[should_panic(expected = "IoStreamDegraded")]
    fn test_degraded_stream_traps() {
        let mut stream = OutputStream::new(Failing {
            remaining: 0,
            flushes: 0,
        });
        let _ = stream.put_byte(0);
        let _ = stream.flush();
    }

    #[test]
    fn test_io_error_report_can_be_cleared() {
        let mut stream = OutputStream::new(Failing {
            remaining: 8,
            flushes: 0,
        });
        stream.report_io_error();
        assert!(stream.io_error_present());
        assert!(!stream.is_nominal());

        stream.clear_io_error_report();
        assert!(stream.is_nominal());
        stream.flush().unwrap();
        assert_eq!(stream.buffer().flushes, 1);
    }

    #[test]
    fn test_end_of_file_report() {
        let mut stream = stream();
        stream.report_end_of_file_reached();
        assert!(stream.end_of_file_reached());
        stream.clear_end_of_file_reached_report();
        assert!(stream.is_nominal());
    }

    #[test]
    #[should_panic(expected = "IoStreamDegraded")]
    fn test_reported_io_error_blocks_output() {
        let mut stream = stream();
        stream.report_io_error();
        let _ = stream.put_char('x');
    }
}
