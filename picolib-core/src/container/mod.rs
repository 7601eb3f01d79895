//! Fixed capacity containers
//!
//! Containers that never allocate. Capacity is a const generic parameter and
//! running out of it is a fatal error unless the operation says otherwise.

pub mod circular_buffer;
pub mod vector;

pub use circular_buffer::{
    CircularBuffer, InterruptReadInterruptWrite, InterruptReadMainWrite, InterruptUseCase,
    MainReadInterruptWrite, MainReadMainWrite, UseCase,
};
pub use vector::FixedCapacityVector;
