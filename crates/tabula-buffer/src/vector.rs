//! Zero-copy vector views.

use std::marker::PhantomData;

use tabula_core::Scalar;
use tabula_core::layout::{SIZE_UOFFSET, read_u32_le};

use crate::table::Table;

/// A value that can be read in place from a buffer position.
pub trait Follow<'a>: Sized {
    /// Bytes one element occupies inside a vector.
    const SIZE: usize;

    fn follow(buf: &'a [u8], loc: usize) -> Self;
}

macro_rules! impl_follow_scalar {
    ($($ty:ty),*) => {
        $(
            impl<'a> Follow<'a> for $ty {
                const SIZE: usize = <$ty as Scalar>::SIZE;

                #[inline]
                fn follow(buf: &'a [u8], loc: usize) -> Self {
                    <$ty as Scalar>::read_le(&buf[loc..])
                }
            }
        )*
    };
}

impl_follow_scalar!(bool, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

impl<'a> Follow<'a> for &'a str {
    const SIZE: usize = SIZE_UOFFSET;

    fn follow(buf: &'a [u8], loc: usize) -> Self {
        read_str(buf, deref(buf, loc))
    }
}

impl<'a> Follow<'a> for Table<'a> {
    const SIZE: usize = SIZE_UOFFSET;

    fn follow(buf: &'a [u8], loc: usize) -> Self {
        Table::new(buf, deref(buf, loc))
    }
}

/// Target of the uoffset stored at `loc`.
#[inline]
pub(crate) fn deref(buf: &[u8], loc: usize) -> usize {
    loc + read_u32_le(buf, loc) as usize
}

/// Payload of the length-prefixed run at `loc`.
#[inline]
pub(crate) fn read_bytes(buf: &[u8], loc: usize) -> &[u8] {
    let len = read_u32_le(buf, loc) as usize;
    &buf[loc + SIZE_UOFFSET..loc + SIZE_UOFFSET + len]
}

/// String at `loc`. Invalid UTF-8 (only possible in unverified buffers)
/// reads as empty.
#[inline]
pub(crate) fn read_str(buf: &[u8], loc: usize) -> &str {
    std::str::from_utf8(read_bytes(buf, loc)).unwrap_or("")
}

/// Length-prefixed run of `T` elements, borrowed from the buffer.
pub struct Vector<'a, T> {
    buf: &'a [u8],
    /// Position of the element count.
    loc: usize,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for Vector<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Vector<'_, T> {}

impl<T> std::fmt::Debug for Vector<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vector")
            .field("loc", &self.loc)
            .field("len", &self.len)
            .finish()
    }
}

impl<'a, T: Follow<'a>> Vector<'a, T> {
    /// View the vector whose count is stored at `loc`.
    pub fn new(buf: &'a [u8], loc: usize) -> Self {
        Self {
            buf,
            loc,
            len: read_u32_le(buf, loc) as usize,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Element `idx`. Panics when out of range.
    pub fn get(&self, idx: usize) -> T {
        assert!(
            idx < self.len,
            "vector index {idx} out of range (len {})",
            self.len
        );
        T::follow(self.buf, self.loc + SIZE_UOFFSET + idx * T::SIZE)
    }

    /// Raw element bytes.
    pub fn bytes(&self) -> &'a [u8] {
        let start = self.loc + SIZE_UOFFSET;
        &self.buf[start..start + self.len * T::SIZE]
    }

    pub fn iter(self) -> impl ExactSizeIterator<Item = T> + 'a
    where
        T: 'a,
    {
        (0..self.len).map(move |idx| self.get(idx))
    }
}
