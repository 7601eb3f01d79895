//! Circular buffers
//!
//! A power-of-two ring buffer with single-producer/single-consumer semantics.
//! The use case tag selects who sits at each end:
//!
//! | Use case | Reader | Writer | API |
//! |---|---|---|---|
//! | [`MainReadMainWrite`] | main thread | main thread | `&mut self` |
//! | [`MainReadInterruptWrite`] | main thread | interrupt | `&self` |
//! | [`InterruptReadMainWrite`] | interrupt | main thread | `&self` |
//! | [`InterruptReadInterruptWrite`] | interrupt | interrupt | `&self` |
//!
//! Operations meant to be called from an interrupt handler carry the
//! `_from_interrupt` suffix. Interrupts that use a buffer must not preempt
//! each other. Whenever the main thread touches the shared size counter of a
//! buffer that an interrupt also uses, it does so inside a critical section
//! obtained from the buffer's [`InterruptController`]; interrupt-side
//! operations run unsynchronized.
//!
//! Indices wrap with `index & (N - 1)`, so `N` must be a power of two. This
//! is checked at compile time.
//!
//! Elements of buffers that an interrupt participates in must be `Copy`: the
//! interrupt side never runs destructors, and `front`/`back` return copies
//! because the other end may move the buffer on at any time.

#![allow(unsafe_code)]

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::mem::MaybeUninit;
use core::ptr;

use crate::error::{expect, ErrorCode};
use crate::traits::interrupt::{CriticalSection, InterruptController, NoInterruptController};

mod private {
    pub trait Sealed {}
}

/// Circular buffer use case
pub trait UseCase: private::Sealed {}

/// Use case where at least one end is an interrupt handler
pub trait InterruptUseCase: UseCase {}

/// Main thread reads, main thread writes
#[derive(Debug, Clone, Copy)]
pub struct MainReadMainWrite;

/// Main thread reads, an interrupt writes
#[derive(Debug, Clone, Copy)]
pub struct MainReadInterruptWrite;

/// An interrupt reads, main thread writes
#[derive(Debug, Clone, Copy)]
pub struct InterruptReadMainWrite;

/// An interrupt reads, another interrupt writes
#[derive(Debug, Clone, Copy)]
pub struct InterruptReadInterruptWrite;

impl private::Sealed for MainReadMainWrite {}
impl private::Sealed for MainReadInterruptWrite {}
impl private::Sealed for InterruptReadMainWrite {}
impl private::Sealed for InterruptReadInterruptWrite {}

impl UseCase for MainReadMainWrite {}
impl UseCase for MainReadInterruptWrite {}
impl UseCase for InterruptReadMainWrite {}
impl UseCase for InterruptReadInterruptWrite {}

impl InterruptUseCase for MainReadInterruptWrite {}
impl InterruptUseCase for InterruptReadMainWrite {}
impl InterruptUseCase for InterruptReadInterruptWrite {}

/// Fixed capacity ring buffer
pub struct CircularBuffer<T, const N: usize, U: UseCase, C = NoInterruptController> {
    controller: C,
    storage: UnsafeCell<[MaybeUninit<T>; N]>,
    read: UnsafeCell<usize>,
    write: UnsafeCell<usize>,
    size: UnsafeCell<usize>,
    _use_case: PhantomData<U>,
}

// SAFETY: the reader and the writer each own their index, elements are only
// touched by the end that owns their slot, and the shared size counter is
// accessed from the main thread only inside critical sections.
unsafe impl<T: Send, const N: usize, U: InterruptUseCase, C: Sync> Sync
    for CircularBuffer<T, N, U, C>
{
}

impl<T, const N: usize, U: UseCase, C> CircularBuffer<T, N, U, C> {
    const MASK: usize = {
        assert!(N.is_power_of_two(), "circular buffer capacity must be a power of two");
        N - 1
    };

    const fn with_controller(controller: C) -> Self {
        let _mask = Self::MASK;

        Self {
            controller,
            storage: UnsafeCell::new([const { MaybeUninit::uninit() }; N]),
            read: UnsafeCell::new(0),
            write: UnsafeCell::new(0),
            size: UnsafeCell::new(0),
            _use_case: PhantomData,
        }
    }

    /// Maximum number of elements
    #[inline]
    pub const fn max_size() -> usize {
        N
    }

    /// The interrupt controller used for critical sections
    pub fn controller(&self) -> &C {
        &self.controller
    }

    #[inline]
    fn load(cell: &UnsafeCell<usize>) -> usize {
        // SAFETY: the pointer is valid; volatile keeps accesses that another
        // context observes from being cached or elided
        unsafe { ptr::read_volatile(cell.get()) }
    }

    #[inline]
    fn store(cell: &UnsafeCell<usize>, value: usize) {
        // SAFETY: see `load`
        unsafe { ptr::write_volatile(cell.get(), value) }
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut T {
        let base = self.storage.get().cast::<MaybeUninit<T>>();
        // SAFETY: the masked index is within the storage array
        unsafe { base.add(index & Self::MASK).cast::<T>() }
    }

    #[inline]
    fn size_unsynchronized(&self) -> usize {
        Self::load(&self.size)
    }

    #[inline]
    fn increment_size(&self) {
        Self::store(&self.size, Self::load(&self.size) + 1);
    }

    #[inline]
    fn decrement_size(&self) {
        Self::store(&self.size, Self::load(&self.size) - 1);
    }

    /// Construct an element at the write index and advance it
    ///
    /// # Safety
    ///
    /// Must be called by the writer while the buffer is not full. The size
    /// counter is left for the caller to update.
    #[inline]
    unsafe fn write_element(&self, value: T) {
        let write = Self::load(&self.write);
        ptr::write_volatile(self.slot(write), value);
        Self::store(&self.write, (write + 1) & Self::MASK);
    }

    /// Move the element at the read index out and advance it
    ///
    /// # Safety
    ///
    /// Must be called by the reader while the buffer is not empty. The size
    /// counter is left for the caller to update.
    #[inline]
    unsafe fn read_element(&self) -> T {
        let read = Self::load(&self.read);
        let value = ptr::read_volatile(self.slot(read));
        Self::store(&self.read, (read + 1) & Self::MASK);
        value
    }

    /// Copy of the element at the read index
    ///
    /// # Safety
    ///
    /// The buffer must not be empty.
    #[inline]
    unsafe fn peek_front(&self) -> T
    where
        T: Copy,
    {
        ptr::read_volatile(self.slot(Self::load(&self.read)))
    }

    /// Copy of the most recently written element
    ///
    /// # Safety
    ///
    /// The buffer must not be empty.
    #[inline]
    unsafe fn peek_back(&self) -> T
    where
        T: Copy,
    {
        let write = Self::load(&self.write);
        ptr::read_volatile(self.slot(write.wrapping_sub(1)))
    }

    /// Drop every element and reset the indices
    ///
    /// # Safety
    ///
    /// Neither end may be active.
    unsafe fn drain(&self) {
        while self.size_unsynchronized() > 0 {
            drop(self.read_element());
            self.decrement_size();
        }
        Self::store(&self.read, 0);
        Self::store(&self.write, 0);
    }
}

impl<T, const N: usize, U: UseCase, C> Drop for CircularBuffer<T, N, U, C> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` excludes both ends
        unsafe { self.drain() };
    }
}

// ---------------------------------------------------------------------------
// Main thread reads, main thread writes
// ---------------------------------------------------------------------------

impl<T, const N: usize> CircularBuffer<T, N, MainReadMainWrite> {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self::with_controller(NoInterruptController)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.size_unsynchronized()
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Oldest element
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn front(&self) -> &T {
        expect(!self.is_empty(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty, and the slot at the read index is initialized
        unsafe { &*self.slot(Self::load(&self.read)) }
    }

    /// Oldest element, mutably
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn front_mut(&mut self) -> &mut T {
        expect(!self.is_empty(), ErrorCode::WouldUnderflow);
        // SAFETY: as for `front`
        unsafe { &mut *self.slot(Self::load(&self.read)) }
    }

    /// Newest element
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn back(&self) -> &T {
        expect(!self.is_empty(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty, so the slot before the write index is initialized
        unsafe { &*self.slot(Self::load(&self.write).wrapping_sub(1)) }
    }

    /// Newest element, mutably
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn back_mut(&mut self) -> &mut T {
        expect(!self.is_empty(), ErrorCode::WouldUnderflow);
        // SAFETY: as for `back`
        unsafe { &mut *self.slot(Self::load(&self.write).wrapping_sub(1)) }
    }

    /// Append `value`
    ///
    /// Traps `WouldOverflow` if the buffer is full.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn push(&mut self, value: T) {
        expect(!self.is_full(), ErrorCode::WouldOverflow);
        // SAFETY: not full
        unsafe { self.push_unchecked(value) };
    }

    /// Append `value` without checking for space
    ///
    /// # Safety
    ///
    /// The buffer must not be full.
    pub unsafe fn push_unchecked(&mut self, value: T) {
        self.write_element(value);
        self.increment_size();
    }

    /// Append an element constructed in place by `f`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn emplace(&mut self, f: impl FnOnce() -> T) -> &mut T {
        expect(!self.is_full(), ErrorCode::WouldOverflow);
        // SAFETY: not full
        unsafe { self.push_unchecked(f()) };
        self.back_mut()
    }

    /// Remove and return the oldest element
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn pop(&mut self) -> T {
        expect(!self.is_empty(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty
        unsafe { self.pop_unchecked() }
    }

    /// Remove and return the oldest element without checking for emptiness
    ///
    /// # Safety
    ///
    /// The buffer must not be empty.
    pub unsafe fn pop_unchecked(&mut self) -> T {
        let value = self.read_element();
        self.decrement_size();
        value
    }

    /// Drop every element
    pub fn clear(&mut self) {
        // SAFETY: `&mut self` excludes both ends
        unsafe { self.drain() };
    }
}

impl<T, const N: usize> Default for CircularBuffer<T, N, MainReadMainWrite> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Main thread reads, interrupt writes
// ---------------------------------------------------------------------------

impl<T, const N: usize, C: InterruptController> CircularBuffer<T, N, MainReadInterruptWrite, C> {
    /// Create an empty buffer
    pub const fn new(controller: C) -> Self {
        Self::with_controller(controller)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        CriticalSection::with(&self.controller, || self.size_unsynchronized())
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Copy of the oldest element
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn front(&self) -> T
    where
        T: Copy,
    {
        expect(!self.is_empty(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty; the writer never touches occupied slots
        unsafe { self.peek_front() }
    }

    /// Copy of the newest element
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn back(&self) -> T
    where
        T: Copy,
    {
        let _cs = CriticalSection::new(&self.controller);
        expect(self.size_unsynchronized() > 0, ErrorCode::WouldUnderflow);
        // SAFETY: not empty, and the writer cannot move while interrupts are
        // disabled
        unsafe { self.peek_back() }
    }

    /// Remove and return the oldest element
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn pop(&self) -> T {
        expect(!self.is_empty(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty
        unsafe { self.pop_unchecked() }
    }

    /// Remove and return the oldest element without checking for emptiness
    ///
    /// # Safety
    ///
    /// The buffer must not be empty and only the main thread may read.
    pub unsafe fn pop_unchecked(&self) -> T {
        let value = self.read_element();
        CriticalSection::with(&self.controller, || self.decrement_size());
        value
    }

    /// Drop every element
    pub fn clear(&self) {
        while !self.is_empty() {
            drop(self.pop());
        }
    }

    /// Number of elements, from the writing interrupt
    pub fn len_from_interrupt(&self) -> usize {
        self.size_unsynchronized()
    }

    /// Check if the buffer is empty, from the writing interrupt
    pub fn is_empty_from_interrupt(&self) -> bool {
        self.len_from_interrupt() == 0
    }

    /// Check if the buffer is full, from the writing interrupt
    pub fn is_full_from_interrupt(&self) -> bool {
        self.len_from_interrupt() == N
    }

    /// Append `value` from the writing interrupt
    ///
    /// Traps `WouldOverflow` if the buffer is full.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn push_from_interrupt(&self, value: T) {
        expect(!self.is_full_from_interrupt(), ErrorCode::WouldOverflow);
        // SAFETY: not full
        unsafe { self.push_from_interrupt_unchecked(value) };
    }

    /// Append an element constructed by `f` from the writing interrupt
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn emplace_from_interrupt(&self, f: impl FnOnce() -> T) {
        expect(!self.is_full_from_interrupt(), ErrorCode::WouldOverflow);
        // SAFETY: not full
        unsafe { self.push_from_interrupt_unchecked(f()) };
    }

    /// Append `value` from the writing interrupt without checking for space
    ///
    /// # Safety
    ///
    /// The buffer must not be full and the caller must be the writer.
    pub unsafe fn push_from_interrupt_unchecked(&self, value: T) {
        self.write_element(value);
        self.increment_size();
    }
}

// ---------------------------------------------------------------------------
// Interrupt reads, main thread writes
// ---------------------------------------------------------------------------

impl<T: Copy, const N: usize, C: InterruptController>
    CircularBuffer<T, N, InterruptReadMainWrite, C>
{
    /// Create an empty buffer
    pub const fn new(controller: C) -> Self {
        Self::with_controller(controller)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        CriticalSection::with(&self.controller, || self.size_unsynchronized())
    }

    /// Check if the buffer is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer is full
    pub fn is_full(&self) -> bool {
        self.len() == N
    }

    /// Append `value`
    ///
    /// Traps `WouldOverflow` if the buffer is full.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn push(&self, value: T) {
        expect(!self.is_full(), ErrorCode::WouldOverflow);
        // SAFETY: not full
        unsafe { self.push_unchecked(value) };
    }

    /// Append an element constructed by `f`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn emplace(&self, f: impl FnOnce() -> T) {
        expect(!self.is_full(), ErrorCode::WouldOverflow);
        // SAFETY: not full
        unsafe { self.push_unchecked(f()) };
    }

    /// Append `value` without checking for space
    ///
    /// # Safety
    ///
    /// The buffer must not be full and only the main thread may write.
    pub unsafe fn push_unchecked(&self, value: T) {
        self.write_element(value);
        CriticalSection::with(&self.controller, || self.increment_size());
    }

    /// Discard every element
    pub fn clear(&self) {
        CriticalSection::with(&self.controller, || {
            Self::store(&self.read, 0);
            Self::store(&self.write, 0);
            Self::store(&self.size, 0);
        });
    }

    /// Number of elements, from the reading interrupt
    pub fn len_from_interrupt(&self) -> usize {
        self.size_unsynchronized()
    }

    /// Check if the buffer is empty, from the reading interrupt
    pub fn is_empty_from_interrupt(&self) -> bool {
        self.len_from_interrupt() == 0
    }

    /// Check if the buffer is full, from the reading interrupt
    pub fn is_full_from_interrupt(&self) -> bool {
        self.len_from_interrupt() == N
    }

    /// Copy of the oldest element, from the reading interrupt
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn front_from_interrupt(&self) -> T {
        expect(!self.is_empty_from_interrupt(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty
        unsafe { self.peek_front() }
    }

    /// Copy of the newest element, from the reading interrupt
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn back_from_interrupt(&self) -> T {
        expect(!self.is_empty_from_interrupt(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty, and the main thread cannot preempt the interrupt
        unsafe { self.peek_back() }
    }

    /// Remove and return the oldest element, from the reading interrupt
    ///
    /// Traps `WouldUnderflow` if the buffer is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn pop_from_interrupt(&self) -> T {
        expect(!self.is_empty_from_interrupt(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty
        unsafe { self.pop_from_interrupt_unchecked() }
    }

    /// Remove and return the oldest element without checking for emptiness
    ///
    /// # Safety
    ///
    /// The buffer must not be empty and the caller must be the reader.
    pub unsafe fn pop_from_interrupt_unchecked(&self) -> T {
        let value = self.read_element();
        self.decrement_size();
        value
    }
}

// ---------------------------------------------------------------------------
// Interrupt reads, interrupt writes
// ---------------------------------------------------------------------------

impl<T: Copy, const N: usize> CircularBuffer<T, N, InterruptReadInterruptWrite> {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self::with_controller(NoInterruptController)
    }

    /// Number of elements
    pub fn len_from_interrupt(&self) -> usize {
        self.size_unsynchronized()
    }

    /// Check if the buffer is empty
    pub fn is_empty_from_interrupt(&self) -> bool {
        self.len_from_interrupt() == 0
    }

    /// Check if the buffer is full
    pub fn is_full_from_interrupt(&self) -> bool {
        self.len_from_interrupt() == N
    }

    /// Copy of the oldest element
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn front_from_interrupt(&self) -> T {
        expect(!self.is_empty_from_interrupt(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty
        unsafe { self.peek_front() }
    }

    /// Copy of the newest element
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn back_from_interrupt(&self) -> T {
        expect(!self.is_empty_from_interrupt(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty
        unsafe { self.peek_back() }
    }

    /// Append `value`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn push_from_interrupt(&self, value: T) {
        expect(!self.is_full_from_interrupt(), ErrorCode::WouldOverflow);
        // SAFETY: not full
        unsafe { self.push_from_interrupt_unchecked(value) };
    }

    /// Append an element constructed by `f`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn emplace_from_interrupt(&self, f: impl FnOnce() -> T) {
        expect(!self.is_full_from_interrupt(), ErrorCode::WouldOverflow);
        // SAFETY: not full
        unsafe { self.push_from_interrupt_unchecked(f()) };
    }

    /// Append `value` without checking for space
    ///
    /// # Safety
    ///
    /// The buffer must not be full and the caller must be the writer.
    pub unsafe fn push_from_interrupt_unchecked(&self, value: T) {
        self.write_element(value);
        self.increment_size();
    }

    /// Remove and return the oldest element
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn pop_from_interrupt(&self) -> T {
        expect(!self.is_empty_from_interrupt(), ErrorCode::WouldUnderflow);
        // SAFETY: not empty
        unsafe { self.pop_from_interrupt_unchecked() }
    }

    /// Remove and return the oldest element without checking for emptiness
    ///
    /// # Safety
    ///
    /// The buffer must not be empty and the caller must be the reader.
    pub unsafe fn pop_from_interrupt_unchecked(&self) -> T {
        let value = self.read_element();
        self.decrement_size();
        value
    }

    /// Discard every element
    pub fn clear_from_interrupt(&self) {
        Self::store(&self.read, 0);
        Self::store(&self.write, 0);
        Self::store(&self.size, 0);
    }
}

impl<T: Copy, const N: usize> Default for CircularBuffer<T, N, InterruptReadInterruptWrite> {
    fn default() -> Self {
        Self::new()
    }
}
