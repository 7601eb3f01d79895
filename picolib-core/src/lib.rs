//! Board-agnostic building blocks for microcontroller firmware
//!
//! This crate contains the platform-independent pieces that embedded
//! applications are assembled from. Nothing here allocates:
//!
//! - Error taxonomy and the fatal error trap
//! - Interrupt controller abstraction and critical sections
//! - Fixed-capacity vector and interrupt-aware circular buffers
//! - Output streams with `{}` formatted printing
//! - Hierarchical state machine runtime
//!
//! # Error model
//!
//! Precondition violations are program bugs and trap through
//! [`error::fatal_error`], which never returns. Conditions a caller can
//! recover from are returned as `Result<T, ErrorCode>`.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod container;
pub mod error;
pub mod hsm;
pub mod stream;
pub mod traits;

pub use error::{expect, fatal_error, ErrorCode};
