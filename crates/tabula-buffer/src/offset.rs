//! Builder-side handles to already written data.

use std::marker::PhantomData;

/// Marker: a finished table.
#[derive(Debug)]
pub enum TableRef {}

/// Marker: a string.
#[derive(Debug)]
pub enum StrRef {}

/// Marker: a vector of any element type.
#[derive(Debug)]
pub enum VectorRef {}

/// Position of written data, as a distance from the end of the arena.
///
/// Only meaningful for the builder session that produced it. The type
/// parameter records what was written there.
pub struct Offset<T> {
    value: u32,
    _marker: PhantomData<T>,
}

impl<T> Offset<T> {
    pub const fn new(value: u32) -> Self {
        Self {
            value,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn value(self) -> u32 {
        self.value
    }
}

impl<T> Clone for Offset<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Offset<T> {}

impl<T> PartialEq for Offset<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Eq for Offset<T> {}

impl<T> std::fmt::Debug for Offset<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Offset({})", self.value)
    }
}
