//! Fixed capacity vector
//!
//! Contiguous in-place storage for up to `N` elements. Elements exist in
//! slots `[0, len)`; the remaining slots are uninitialized. Insertion and
//! erasure move the tail in place, so no element is ever copied twice and
//! non-trivial element types (ones with a `Drop` impl) are supported.
//!
//! Capacity violations are program bugs and trap `InsufficientCapacity`.

#![allow(unsafe_code)]

use core::fmt;
use core::hash::{Hash, Hasher};
use core::mem::MaybeUninit;
use core::ops::{Deref, DerefMut, Range};
use core::ptr;
use core::slice;

use crate::error::{expect, ErrorCode};

/// Fixed capacity vector
pub struct FixedCapacityVector<T, const N: usize> {
    storage: [MaybeUninit<T>; N],
    len: usize,
}

impl<T, const N: usize> FixedCapacityVector<T, N> {
    /// Create an empty vector
    pub const fn new() -> Self {
        Self {
            storage: [const { MaybeUninit::uninit() }; N],
            len: 0,
        }
    }

    /// Create a vector holding `n` clones of `value`
    pub fn from_value(n: usize, value: T) -> Self
    where
        T: Clone,
    {
        let mut vector = Self::new();
        vector.resize(n, value);
        vector
    }

    /// Create a vector holding clones of the elements of `values`
    pub fn from_slice(values: &[T]) -> Self
    where
        T: Clone,
    {
        let mut vector = Self::new();
        vector.insert_slice(0, values);
        vector
    }

    /// Number of elements
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Check if the vector holds no elements
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check if the vector is at capacity
    #[inline]
    pub const fn is_full(&self) -> bool {
        self.len == N
    }

    /// Maximum number of elements
    #[inline]
    pub const fn max_size() -> usize {
        N
    }

    /// Storage capacity (always `N`)
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// View the elements as a slice
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: slots [0, len) are initialized
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    /// View the elements as a mutable slice
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: slots [0, len) are initialized
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }

    /// Pointer to the first slot
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.storage.as_ptr().cast()
    }

    /// Mutable pointer to the first slot
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.storage.as_mut_ptr().cast()
    }

    /// Bounds-checked element access
    ///
    /// Traps `OutOfRange` if `index >= len()`.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn at(&self, index: usize) -> &T {
        expect(index < self.len, ErrorCode::OutOfRange);
        &self.as_slice()[index]
    }

    /// Bounds-checked mutable element access
    ///
    /// Traps `OutOfRange` if `index >= len()`.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn at_mut(&mut self, index: usize) -> &mut T {
        expect(index < self.len, ErrorCode::OutOfRange);
        &mut self.as_mut_slice()[index]
    }

    /// First element
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn front(&self) -> &T {
        self.at(0)
    }

    /// First element, mutably
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn front_mut(&mut self) -> &mut T {
        self.at_mut(0)
    }

    /// Last element
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn back(&self) -> &T {
        expect(!self.is_empty(), ErrorCode::OutOfRange);
        self.at(self.len - 1)
    }

    /// Last element, mutably
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn back_mut(&mut self) -> &mut T {
        expect(!self.is_empty(), ErrorCode::OutOfRange);
        let index = self.len - 1;
        self.at_mut(index)
    }

    /// Drop every element
    pub fn clear(&mut self) {
        let elements: *mut [T] = self.as_mut_slice();
        // Forget the elements first so a panicking destructor cannot cause a
        // double drop
        self.len = 0;
        // SAFETY: the elements were initialized and are no longer reachable
        unsafe { ptr::drop_in_place(elements) };
    }

    /// Trap unless `additional` more elements fit
    #[cfg_attr(feature = "trap-location", track_caller)]
    fn expect_capacity_for(&self, additional: usize) {
        let fits = match self.len.checked_add(additional) {
            Some(len) => len <= N,
            None => false,
        };
        expect(fits, ErrorCode::InsufficientCapacity);
    }

    /// Open a gap of `count` uninitialized slots at `index`
    ///
    /// The vector's length is left at `index`; the caller fills the gap and
    /// then sets the length to `old_len + count`.
    fn open_gap(&mut self, index: usize, count: usize) -> usize {
        let old_len = self.len;
        let base = self.as_mut_ptr();
        // SAFETY: capacity was checked; the tail moves into uninitialized
        // slots and its old slots become logically uninitialized
        unsafe { ptr::copy(base.add(index), base.add(index + count), old_len - index) };
        self.len = index;
        old_len
    }

    /// Insert `value` at `index`, shifting the tail towards the back
    ///
    /// Returns the index of the inserted element.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn insert(&mut self, index: usize, value: T) -> usize {
        self.insert_with(index, || value)
    }

    /// Insert an element constructed in place by `f` at `index`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn insert_with(&mut self, index: usize, f: impl FnOnce() -> T) -> usize {
        expect(index <= self.len, ErrorCode::OutOfRange);
        self.expect_capacity_for(1);

        let old_len = self.open_gap(index, 1);
        // SAFETY: the gap slot is uninitialized
        unsafe { self.as_mut_ptr().add(index).write(f()) };
        self.len = old_len + 1;

        index
    }

    /// Insert `n` clones of `value` at `index`
    ///
    /// Returns the index of the first inserted element.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn insert_n(&mut self, index: usize, n: usize, value: T) -> usize
    where
        T: Clone,
    {
        expect(index <= self.len, ErrorCode::OutOfRange);
        self.expect_capacity_for(n);

        if n == 0 {
            return index;
        }

        let old_len = self.open_gap(index, n);
        let base = self.as_mut_ptr();
        for offset in 0..n - 1 {
            // SAFETY: gap slots are uninitialized
            unsafe { base.add(index + offset).write(value.clone()) };
        }
        // SAFETY: last gap slot
        unsafe { base.add(index + n - 1).write(value) };
        self.len = old_len + n;

        index
    }

    /// Insert clones of `values` at `index`
    ///
    /// Returns the index of the first inserted element.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn insert_slice(&mut self, index: usize, values: &[T]) -> usize
    where
        T: Clone,
    {
        expect(index <= self.len, ErrorCode::OutOfRange);
        self.expect_capacity_for(values.len());

        let old_len = self.open_gap(index, values.len());
        let base = self.as_mut_ptr();
        for (offset, value) in values.iter().enumerate() {
            // SAFETY: gap slots are uninitialized
            unsafe { base.add(index + offset).write(value.clone()) };
        }
        self.len = old_len + values.len();

        index
    }

    /// Insert the elements yielded by `values` at `index`
    ///
    /// Returns the index of the first inserted element.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn insert_iter<I: IntoIterator<Item = T>>(&mut self, index: usize, values: I) -> usize {
        expect(index <= self.len, ErrorCode::OutOfRange);

        let old_len = self.len;
        for value in values {
            self.push(value);
        }
        let inserted = self.len - old_len;
        self.as_mut_slice()[index..].rotate_right(inserted);

        index
    }

    /// Remove and return the element at `index`, shifting the tail forward
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn erase(&mut self, index: usize) -> T {
        expect(index < self.len, ErrorCode::OutOfRange);

        let base = self.as_mut_ptr();
        // SAFETY: index is in range; the tail moves over the vacated slot
        unsafe {
            let value = base.add(index).read();
            ptr::copy(base.add(index + 1), base.add(index), self.len - index - 1);
            self.len -= 1;
            value
        }
    }

    /// Drop the elements in `range`, shifting the tail forward
    ///
    /// Returns the index of the element that followed the erased range.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn erase_range(&mut self, range: Range<usize>) -> usize {
        expect(
            range.start <= range.end && range.end <= self.len,
            ErrorCode::OutOfRange,
        );

        let count = range.end - range.start;
        if count == 0 {
            return range.start;
        }

        let old_len = self.len;
        let base = self.as_mut_ptr();
        self.len = range.start;
        // SAFETY: the erased slots are initialized and no longer reachable;
        // the tail moves over them
        unsafe {
            ptr::drop_in_place(slice::from_raw_parts_mut(base.add(range.start), count));
            ptr::copy(base.add(range.end), base.add(range.start), old_len - range.end);
        }
        self.len = old_len - count;

        range.start
    }

    /// Append `value`
    ///
    /// Traps `InsufficientCapacity` if the vector is full.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn push(&mut self, value: T) {
        self.expect_capacity_for(1);
        // SAFETY: capacity checked above
        unsafe { self.push_unchecked(value) };
    }

    /// Append an element constructed in place by `f`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn push_with(&mut self, f: impl FnOnce() -> T) -> &mut T {
        self.expect_capacity_for(1);
        let index = self.len;
        // SAFETY: capacity checked above
        unsafe { self.push_unchecked(f()) };
        &mut self.as_mut_slice()[index]
    }

    /// Append `value` without checking capacity
    ///
    /// # Safety
    ///
    /// The vector must not be full.
    pub unsafe fn push_unchecked(&mut self, value: T) {
        debug_assert!(self.len < N);
        self.storage.get_unchecked_mut(self.len).write(value);
        self.len += 1;
    }

    /// Remove and return the last element
    ///
    /// Traps `WouldUnderflow` if the vector is empty.
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn pop(&mut self) -> T {
        expect(!self.is_empty(), ErrorCode::WouldUnderflow);
        // SAFETY: the vector is not empty
        unsafe { self.pop_unchecked() }
    }

    /// Remove and return the last element without checking for emptiness
    ///
    /// # Safety
    ///
    /// The vector must not be empty.
    pub unsafe fn pop_unchecked(&mut self) -> T {
        debug_assert!(self.len > 0);
        self.len -= 1;
        self.storage.get_unchecked(self.len).assume_init_read()
    }

    /// Resize to `new_len`, filling new slots with clones of `value`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn resize(&mut self, new_len: usize, value: T)
    where
        T: Clone,
    {
        if new_len > self.len {
            let len = self.len;
            self.insert_n(len, new_len - len, value);
        } else {
            let len = self.len;
            self.erase_range(new_len..len);
        }
    }

    /// Resize to `new_len`, filling new slots with `T::default()`
    #[cfg_attr(feature = "trap-location", track_caller)]
    pub fn resize_default(&mut self, new_len: usize)
    where
        T: Default,
    {
        expect(new_len <= N, ErrorCode::InsufficientCapacity);
        if new_len > self.len {
            while self.len < new_len {
                // SAFETY: new_len <= N
                unsafe { self.push_unchecked(T::default()) };
            }
        } else {
            let len = self.len;
            self.erase_range(new_len..len);
        }
    }
}

impl<T, const N: usize> Default for FixedCapacityVector<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for FixedCapacityVector<T, N> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T: Clone, const N: usize> Clone for FixedCapacityVector<T, N> {
    fn clone(&self) -> Self {
        Self::from_slice(self.as_slice())
    }

    fn clone_from(&mut self, source: &Self) {
        self.clear();
        self.insert_slice(0, source.as_slice());
    }
}

impl<T, const N: usize> Deref for FixedCapacityVector<T, N> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T, const N: usize> DerefMut for FixedCapacityVector<T, N> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T, const N: usize> FromIterator<T> for FixedCapacityVector<T, N> {
    #[cfg_attr(feature = "trap-location", track_caller)]
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut vector = Self::new();
        for value in iter {
            vector.push(value);
        }
        vector
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a FixedCapacityVector<T, N> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, const N: usize> IntoIterator for &'a mut FixedCapacityVector<T, N> {
    type Item = &'a mut T;
    type IntoIter = slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T: PartialEq, const N: usize> PartialEq for FixedCapacityVector<T, N> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.as_slice() == other.as_slice()
    }
}

impl<T: Eq, const N: usize> Eq for FixedCapacityVector<T, N> {}

impl<T: PartialOrd, const N: usize> PartialOrd for FixedCapacityVector<T, N> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        self.as_slice().partial_cmp(other.as_slice())
    }
}

impl<T: Ord, const N: usize> Ord for FixedCapacityVector<T, N> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.as_slice().cmp(other.as_slice())
    }
}

impl<T: Hash, const N: usize> Hash for FixedCapacityVector<T, N> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_slice().hash(state);
    }
}

impl<T: fmt::Debug, const N: usize> fmt::Debug for FixedCapacityVector<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

#[cfg(feature = "defmt")]
impl<T: defmt::Format, const N: usize> defmt::Format for FixedCapacityVector<T, N> {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{=[?]}", self.as_slice())
    }
}

impl<T, const N: usize> TryFrom<&[T]> for FixedCapacityVector<T, N>
where
    T: Clone,
{
    type Error = ErrorCode;

    fn try_from(values: &[T]) -> Result<Self, Self::Error> {
        if values.len() > N {
            return Err(ErrorCode::InsufficientCapacity);
        }
        Ok(Self::from_slice(values))
    }
}
