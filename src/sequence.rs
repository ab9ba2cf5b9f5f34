// Growable, indexable, ordered store used for pin lists, tag chains and child devices.
//
// Backed by a Vec, but the logical capacity follows a fixed growth policy:
// grow to max(required, capacity * 1.5), and an empty buffer grows to at least 10.

use std::ops::Range;

use crate::error::{DeviceError, Result};

/// Capacity of a container built without an explicit one
pub const DEFAULT_CAPACITY: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct Sequence<T> {
    items: Vec<T>,
    capacity: usize,
}

impl<T> Sequence<T> {
    /// Create an empty container with the default capacity
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(DEFAULT_CAPACITY),
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Create an empty container with an explicit capacity.
    ///
    /// Fails with `InvalidCapacity` for negative values and with
    /// `AllocationFailed` if the buffer cannot be reserved.
    pub fn with_capacity(capacity: isize) -> Result<Self> {
        let capacity =
            usize::try_from(capacity).map_err(|_| DeviceError::InvalidCapacity(capacity))?;
        let mut items = Vec::new();
        items.try_reserve_exact(capacity)?;
        Ok(Self { items, capacity })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Logical capacity (always >= `len()`)
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Result<&T> {
        let size = self.items.len();
        self.items
            .get(index)
            .ok_or(DeviceError::OutOfRange { index, size })
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        let size = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(DeviceError::OutOfRange { index, size })
    }

    /// Append an element, growing the buffer if it is full
    pub fn push(&mut self, element: T) -> Result<()> {
        self.ensure_capacity(self.items.len() + 1)?;
        self.items.push(element);
        Ok(())
    }

    /// Grow ahead of time so the next `additional` appends fit
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.ensure_capacity(self.items.len() + additional)
    }

    /// Append without growing; a full buffer hands the element back
    pub fn push_within_capacity(&mut self, element: T) -> std::result::Result<(), T> {
        if self.items.len() >= self.capacity {
            return Err(element);
        }
        self.items.push(element);
        Ok(())
    }

    fn ensure_capacity(&mut self, min_capacity: usize) -> Result<()> {
        let min_capacity = if self.capacity == 0 {
            min_capacity.max(DEFAULT_CAPACITY)
        } else {
            min_capacity
        };
        if min_capacity > self.capacity {
            self.grow(min_capacity)?;
        }
        Ok(())
    }

    fn grow(&mut self, min_capacity: usize) -> Result<()> {
        let new_capacity = (self.capacity + (self.capacity >> 1)).max(min_capacity);
        self.items
            .try_reserve_exact(new_capacity - self.items.len())?;
        self.capacity = new_capacity;
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Drop every element; capacity is kept
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

impl<T: PartialEq> Sequence<T> {
    pub fn contains(&self, element: &T) -> bool {
        self.index_of(element).is_some()
    }

    /// Smallest index holding `element`
    pub fn index_of(&self, element: &T) -> Option<usize> {
        self.index_of_in(element, 0..self.items.len())
    }

    /// Largest index holding `element`
    pub fn last_index_of(&self, element: &T) -> Option<usize> {
        self.last_index_of_in(element, 0..self.items.len())
    }

    /// First match within `range`; the end is clamped to `len()`
    pub fn index_of_in(&self, element: &T, range: Range<usize>) -> Option<usize> {
        let stop = range.end.min(self.items.len());
        (range.start..stop).find(|&i| self.items[i] == *element)
    }

    /// Last match within `range`; the end is clamped to `len()`
    pub fn last_index_of_in(&self, element: &T, range: Range<usize>) -> Option<usize> {
        let stop = range.end.min(self.items.len());
        (range.start..stop).rev().find(|&i| self.items[i] == *element)
    }
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Adopt an existing buffer; size and capacity both equal its length
impl<T> From<Vec<T>> for Sequence<T> {
    fn from(items: Vec<T>) -> Self {
        let capacity = items.len();
        Self { items, capacity }
    }
}

impl<T: Clone> From<&[T]> for Sequence<T> {
    fn from(items: &[T]) -> Self {
        Self::from(items.to_vec())
    }
}

impl<'a, T> IntoIterator for &'a Sequence<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> IntoIterator for Sequence<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
