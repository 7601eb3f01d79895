//! Output streams
//!
//! ```text
//! print_to!(stream, "{}", value)
//!        |
//!        v
//! +--------------+  Printable  +--------------+
//! | OutputStream | ----------> | OutputBuffer |  heapless::Vec, String, UART...
//! |  (flags)     |             |   (sink)     |
//! +--------------+             +--------------+
//! ```

pub mod buffer;
pub mod format;
pub mod output;

pub use buffer::OutputBuffer;
pub use format::{Hexadecimal, Printable};
pub use output::OutputStream;
