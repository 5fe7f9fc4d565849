//! Table reader.
//!
//! Fields are resolved through the table's vtable straight out of the
//! buffer. Nothing is validated here: a buffer from an untrusted source must
//! pass the [verifier](crate::verifier) first. On an unverified buffer a bad
//! offset panics on slice indexing; it never reads outside the slice.

use tabula_core::layout::{SIZE_SIZE_PREFIX, read_i32_le, read_u32_le};
use tabula_core::{Scalar, ScalarType, ScalarValue};

use crate::vector::{Follow, Vector, deref, read_bytes, read_str};
use crate::vtable::VTable;

/// A table inside a finished buffer.
#[derive(Clone, Copy, Debug)]
pub struct Table<'a> {
    buf: &'a [u8],
    loc: usize,
}

/// The root table of a buffer.
pub fn root_table(buf: &[u8]) -> Table<'_> {
    Table::new(buf, deref(buf, 0))
}

/// The root table of a buffer that starts with a size prefix.
pub fn size_prefixed_root_table(buf: &[u8]) -> Table<'_> {
    Table::new(buf, deref(buf, SIZE_SIZE_PREFIX))
}

impl<'a> Table<'a> {
    pub fn new(buf: &'a [u8], loc: usize) -> Self {
        Self { buf, loc }
    }

    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    /// Position of the table (its soffset) in the buffer.
    pub fn loc(&self) -> usize {
        self.loc
    }

    pub fn vtable(&self) -> VTable<'a> {
        let soffset = read_i32_le(self.buf, self.loc) as i64;
        VTable::new(self.buf, (self.loc as i64 - soffset) as usize)
    }

    /// In-table offset of field `id`; `None` when the field is absent or the
    /// vtable predates it.
    pub fn offset_of(&self, id: u16) -> Option<u16> {
        match self.vtable().get(id) {
            0 => None,
            offset => Some(offset),
        }
    }

    fn field_loc(&self, id: u16) -> Option<usize> {
        self.offset_of(id).map(|offset| self.loc + offset as usize)
    }

    /// Scalar field, or `default` when absent.
    pub fn get<T: Scalar>(&self, id: u16, default: T) -> T {
        self.get_opt(id).unwrap_or(default)
    }

    /// Scalar field, `None` when absent.
    pub fn get_opt<T: Scalar>(&self, id: u16) -> Option<T> {
        self.field_loc(id).map(|loc| T::read_le(&self.buf[loc..]))
    }

    /// Scalar field whose type is only known at runtime.
    pub fn get_value(&self, id: u16, ty: ScalarType, default: ScalarValue) -> ScalarValue {
        match self.field_loc(id) {
            Some(loc) => ty.read(&self.buf[loc..loc + ty.size()]),
            None => default,
        }
    }

    pub fn get_str(&self, id: u16) -> Option<&'a str> {
        self.field_loc(id).map(|loc| read_str(self.buf, deref(self.buf, loc)))
    }

    /// Raw payload of a string or byte-vector field.
    pub fn get_bytes(&self, id: u16) -> Option<&'a [u8]> {
        self.field_loc(id)
            .map(|loc| read_bytes(self.buf, deref(self.buf, loc)))
    }

    pub fn get_vector<T: Follow<'a>>(&self, id: u16) -> Option<Vector<'a, T>> {
        self.field_loc(id)
            .map(|loc| Vector::new(self.buf, deref(self.buf, loc)))
    }

    pub fn get_table(&self, id: u16) -> Option<Table<'a>> {
        self.field_loc(id)
            .map(|loc| Table::new(self.buf, deref(self.buf, loc)))
    }
}

/// A table inside a finished buffer, open for in-place scalar mutation.
///
/// Mutation never changes the layout: only fields that are present can be
/// overwritten, with a value of the same width.
#[derive(Debug)]
pub struct TableMut<'a> {
    buf: &'a mut [u8],
    loc: usize,
}

/// The root table of a buffer, for mutation.
pub fn root_table_mut(buf: &mut [u8]) -> TableMut<'_> {
    let loc = read_u32_le(buf, 0) as usize;
    TableMut::new(buf, loc)
}

/// The root table of a size-prefixed buffer, for mutation.
pub fn size_prefixed_root_table_mut(buf: &mut [u8]) -> TableMut<'_> {
    let loc = deref(buf, SIZE_SIZE_PREFIX);
    TableMut::new(buf, loc)
}

impl<'a> TableMut<'a> {
    pub fn new(buf: &'a mut [u8], loc: usize) -> Self {
        Self { buf, loc }
    }

    pub fn as_table(&self) -> Table<'_> {
        Table::new(self.buf, self.loc)
    }

    /// Overwrite a present scalar field. Returns `false`, leaving the buffer
    /// untouched, when the field is absent.
    pub fn mutate<T: Scalar>(&mut self, id: u16, value: T) -> bool {
        let Some(offset) = self.as_table().offset_of(id) else {
            return false;
        };
        let loc = self.loc + offset as usize;
        value.write_le(&mut self.buf[loc..loc + T::SIZE]);
        true
    }

    /// [`mutate`](Self::mutate) for a type only known at runtime.
    pub fn mutate_value(&mut self, id: u16, ty: ScalarType, value: ScalarValue) -> bool {
        let Some(offset) = self.as_table().offset_of(id) else {
            return false;
        };
        let loc = self.loc + offset as usize;
        ty.write(value, &mut self.buf[loc..loc + ty.size()]);
        true
    }

    /// A nested table field, for mutation.
    pub fn table_mut(&mut self, id: u16) -> Option<TableMut<'_>> {
        let loc = self.as_table().get_table(id)?.loc();
        Some(TableMut::new(self.buf, loc))
    }
}
