//! Table builder.
//!
//! Data is laid out bottom-up: children (strings, vectors, nested tables)
//! are written before the parent that refers to them, so every offset
//! points at something already complete.
//!
//! Objects in progress live on an explicit stack. Their fields are buffered
//! until [`Builder::end_object`], which is what allows a child to be built
//! while its parent is still open: the parent has not written anything yet.

use std::collections::HashMap;

use serde::Deserialize;
use tabula_core::layout::{
    FILE_IDENTIFIER_LENGTH, MAX_BUFFER_SIZE, MAX_FIELD_ID, SIZE_SIZE_PREFIX, SIZE_SOFFSET,
    SIZE_UOFFSET, field_id_to_voffset, vtable_len,
};
use tabula_core::{Scalar, ScalarType, ScalarValue};

use crate::arena::Arena;
use crate::offset::{Offset, StrRef, TableRef, VectorRef};
use crate::vtable::{VTableCache, VTableStats};

/// Misuse of the builder API.
///
/// These indicate a bug in the code driving the builder, not bad data.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("buffer already finished; reset the builder to start another")]
    Finished,
    #[error("buffer not finished yet")]
    NotFinished,
    #[error("no object in progress")]
    NoOpenObject,
    #[error("object nesting exceeds the limit of {limit}")]
    DepthExceeded { limit: usize },
    #[error("an object can declare at most {max} fields, got {0}", max = MAX_FIELD_ID as usize + 1)]
    TooManyFields(u16),
    #[error("field id {id} is outside the {field_count} fields declared for this object")]
    FieldOutOfRange { id: u16, field_count: u16 },
    #[error("field id {0} added twice")]
    DuplicateField(u16),
    #[error("table of {size} bytes exceeds the 65535-byte limit")]
    TableTooLarge { size: usize },
    #[error("buffer would grow to {requested} bytes (limit {MAX_BUFFER_SIZE})")]
    BufferTooLarge { requested: usize },
    #[error("offset {0} does not refer to data written in this session")]
    InvalidOffset(u32),
    #[error("{open} object(s) still in progress")]
    UnclosedObjects { open: usize },
}

/// Builder configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuilderOptions {
    /// Arena bytes allocated up front.
    pub(crate) initial_capacity: usize,
    /// Objects that may be in progress at once.
    pub(crate) max_depth: usize,
    /// Store fields even when they equal their default.
    pub(crate) force_defaults: bool,
    /// Share identical vtables within a session.
    pub(crate) dedup_vtables: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 1024,
            max_depth: 64,
            force_defaults: false,
            dedup_vtables: true,
        }
    }
}

impl BuilderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_capacity(mut self, bytes: usize) -> Self {
        self.initial_capacity = bytes;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn force_defaults(mut self, value: bool) -> Self {
        self.force_defaults = value;
        self
    }

    pub fn dedup_vtables(mut self, value: bool) -> Self {
        self.dedup_vtables = value;
        self
    }
}

/// A field buffered until its object ends.
#[derive(Clone, Copy, Debug)]
enum Pending {
    Scalar { bytes: [u8; 8], size: usize },
    /// Arena position of the target.
    Offset(u32),
}

impl Pending {
    fn size(&self) -> usize {
        match self {
            Self::Scalar { size, .. } => *size,
            Self::Offset(_) => SIZE_UOFFSET,
        }
    }
}

#[derive(Clone, Debug)]
struct ObjectInProgress {
    field_count: u16,
    fields: Vec<(u16, Pending)>,
}

/// Builds one buffer at a time. `Empty → Building → Finished`; only
/// [`reset`](Self::reset) leaves `Finished`.
#[derive(Debug)]
pub struct Builder {
    arena: Arena,
    vtables: VTableCache,
    shared_strings: HashMap<String, u32>,
    stack: Vec<ObjectInProgress>,
    options: BuilderOptions,
    finished: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self::with_options(BuilderOptions::default())
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_options(BuilderOptions::default().initial_capacity(capacity))
    }

    pub fn with_options(options: BuilderOptions) -> Self {
        Self {
            arena: Arena::with_capacity(options.initial_capacity),
            vtables: VTableCache::new(),
            shared_strings: HashMap::new(),
            stack: Vec::new(),
            options,
            finished: false,
        }
    }

    pub fn options(&self) -> &BuilderOptions {
        &self.options
    }

    /// Bytes written to the arena so far.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Objects currently in progress.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn vtable_stats(&self) -> VTableStats {
        self.vtables.stats()
    }

    /// Begin an object whose field ids lie in `0..field_count`.
    ///
    /// Starting while another object is open is not an error: the new
    /// object nests as a child and must be ended before its parent.
    pub fn start_object(&mut self, field_count: u16) -> Result<(), BuildError> {
        self.ensure_building()?;
        if self.stack.len() >= self.options.max_depth {
            return Err(BuildError::DepthExceeded {
                limit: self.options.max_depth,
            });
        }
        if field_count > MAX_FIELD_ID + 1 {
            return Err(BuildError::TooManyFields(field_count));
        }
        self.stack.push(ObjectInProgress {
            field_count,
            fields: Vec::new(),
        });
        Ok(())
    }

    /// Add a scalar field. Nothing is stored when `value == default`.
    pub fn add_field<T: Scalar>(&mut self, id: u16, value: T, default: T) -> Result<(), BuildError> {
        self.check_field(id)?;
        if value == default && !self.options.force_defaults {
            return Ok(());
        }
        let mut bytes = [0u8; 8];
        value.write_le(&mut bytes);
        self.push_pending(id, Pending::Scalar {
            bytes,
            size: T::SIZE,
        });
        Ok(())
    }

    /// Add a scalar field whose type is only known at runtime.
    pub fn add_value(
        &mut self,
        id: u16,
        ty: ScalarType,
        value: ScalarValue,
        default: ScalarValue,
    ) -> Result<(), BuildError> {
        self.check_field(id)?;
        let size = ty.size();
        let mut bytes = [0u8; 8];
        let mut default_bytes = [0u8; 8];
        ty.write(value, &mut bytes);
        ty.write(default, &mut default_bytes);
        if bytes[..size] == default_bytes[..size] && !self.options.force_defaults {
            return Ok(());
        }
        self.push_pending(id, Pending::Scalar { bytes, size });
        Ok(())
    }

    /// Add a field referring to an already written string, vector or table.
    pub fn add_offset<T>(&mut self, id: u16, offset: Offset<T>) -> Result<(), BuildError> {
        self.check_field(id)?;
        self.check_offset(offset.value())?;
        self.push_pending(id, Pending::Offset(offset.value()));
        Ok(())
    }

    /// Lay out the innermost open object and its vtable.
    ///
    /// Fields are written widest first so narrower ones pack without
    /// padding. A failure here leaves the arena in an unspecified state;
    /// the builder must be reset.
    pub fn end_object(&mut self) -> Result<Offset<TableRef>, BuildError> {
        self.ensure_building()?;
        let mut object = self.stack.pop().ok_or(BuildError::NoOpenObject)?;
        object
            .fields
            .sort_by_key(|(_, field)| std::cmp::Reverse(field.size()));

        let start = self.arena.len();
        let mut slots = Vec::with_capacity(object.fields.len());
        for &(id, field) in &object.fields {
            match field {
                Pending::Scalar { bytes, size } => {
                    self.arena.align(size, size)?;
                    self.arena.push_bytes(&bytes[..size])?;
                }
                Pending::Offset(target) => self.push_uoffset(target)?,
            }
            slots.push((id, self.arena.len()));
        }

        self.arena.align(SIZE_SOFFSET, SIZE_SOFFSET)?;
        self.arena.push(0i32)?;
        let table_pos = self.arena.len();
        let table_size = table_pos - start;
        let table_size = u16::try_from(table_size)
            .map_err(|_| BuildError::TableTooLarge { size: table_size })?;

        let used_ids = slots.iter().map(|&(id, _)| id as usize + 1).max().unwrap_or(0);
        let vtable_size = vtable_len(used_ids);
        let mut vtable = vec![0u8; vtable_size];
        vtable[0..2].copy_from_slice(&(vtable_size as u16).to_le_bytes());
        vtable[2..4].copy_from_slice(&table_size.to_le_bytes());
        for (id, pos) in slots {
            let entry = field_id_to_voffset(id);
            vtable[entry..entry + 2].copy_from_slice(&((table_pos - pos) as u16).to_le_bytes());
        }

        let reused = if self.options.dedup_vtables {
            self.vtables.find(&vtable)
        } else {
            None
        };
        let vtable_pos = match reused {
            Some(pos) => pos as usize,
            None => {
                self.arena.push_bytes(&vtable)?;
                let pos = self.arena.len();
                if self.options.dedup_vtables {
                    self.vtables.insert(&vtable, pos as u32);
                }
                pos
            }
        };

        // Positive when the vtable sits below the table in memory.
        let soffset = vtable_pos as i64 - table_pos as i64;
        self.arena.patch(table_pos, soffset as i32);
        Ok(Offset::new(table_pos as u32))
    }

    /// Write a NUL-terminated, length-prefixed string.
    pub fn create_string(&mut self, s: &str) -> Result<Offset<StrRef>, BuildError> {
        self.ensure_building()?;
        let bytes = s.as_bytes();
        self.arena.align(bytes.len() + 1, SIZE_UOFFSET)?;
        self.arena.push_zeros(1)?;
        self.arena.push_bytes(bytes)?;
        self.push_len(bytes.len())?;
        Ok(Offset::new(self.arena.len() as u32))
    }

    /// Like [`create_string`](Self::create_string), but identical strings
    /// within the session are written once.
    pub fn create_shared_string(&mut self, s: &str) -> Result<Offset<StrRef>, BuildError> {
        self.ensure_building()?;
        if let Some(&pos) = self.shared_strings.get(s) {
            return Ok(Offset::new(pos));
        }
        let offset = self.create_string(s)?;
        self.shared_strings.insert(s.to_owned(), offset.value());
        Ok(offset)
    }

    /// Write a vector of scalars.
    pub fn create_vector<T: Scalar>(&mut self, items: &[T]) -> Result<Offset<VectorRef>, BuildError> {
        self.ensure_building()?;
        let byte_len = self.vector_bytes(items.len(), T::SIZE)?;
        self.arena.align(byte_len, T::SIZE.max(SIZE_UOFFSET))?;
        self.arena.reserve(byte_len)?;
        for item in items.iter().rev() {
            self.arena.push(*item)?;
        }
        self.push_len(items.len())?;
        Ok(Offset::new(self.arena.len() as u32))
    }

    /// Write a vector of scalars whose type is only known at runtime.
    pub fn create_scalar_vector(
        &mut self,
        ty: ScalarType,
        values: &[ScalarValue],
    ) -> Result<Offset<VectorRef>, BuildError> {
        self.ensure_building()?;
        let size = ty.size();
        let byte_len = self.vector_bytes(values.len(), size)?;
        self.arena.align(byte_len, size.max(SIZE_UOFFSET))?;
        self.arena.reserve(byte_len)?;
        let mut bytes = [0u8; 8];
        for value in values.iter().rev() {
            ty.write(*value, &mut bytes);
            self.arena.push_bytes(&bytes[..size])?;
        }
        self.push_len(values.len())?;
        Ok(Offset::new(self.arena.len() as u32))
    }

    /// Write a vector of offsets to strings, tables or vectors.
    pub fn create_vector_of_offsets<T>(
        &mut self,
        items: &[Offset<T>],
    ) -> Result<Offset<VectorRef>, BuildError> {
        self.ensure_building()?;
        for item in items {
            self.check_offset(item.value())?;
        }
        let byte_len = self.vector_bytes(items.len(), SIZE_UOFFSET)?;
        self.arena.align(byte_len, SIZE_UOFFSET)?;
        self.arena.reserve(byte_len)?;
        for item in items.iter().rev() {
            self.push_uoffset(item.value())?;
        }
        self.push_len(items.len())?;
        Ok(Offset::new(self.arena.len() as u32))
    }

    pub fn create_vector_of_strings<S: AsRef<str>>(
        &mut self,
        items: &[S],
    ) -> Result<Offset<VectorRef>, BuildError> {
        let offsets = items
            .iter()
            .map(|s| self.create_string(s.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.create_vector_of_offsets(&offsets)
    }

    /// Seal the buffer: root offset first, then the optional file identifier.
    pub fn finish(
        &mut self,
        root: Offset<TableRef>,
        file_identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
    ) -> Result<(), BuildError> {
        self.finish_with(root, file_identifier, false)
    }

    /// Like [`finish`](Self::finish), preceded by a u32 holding the length
    /// of the rest of the buffer.
    pub fn finish_size_prefixed(
        &mut self,
        root: Offset<TableRef>,
        file_identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
    ) -> Result<(), BuildError> {
        self.finish_with(root, file_identifier, true)
    }

    fn finish_with(
        &mut self,
        root: Offset<TableRef>,
        file_identifier: Option<&[u8; FILE_IDENTIFIER_LENGTH]>,
        size_prefixed: bool,
    ) -> Result<(), BuildError> {
        self.ensure_building()?;
        if !self.stack.is_empty() {
            return Err(BuildError::UnclosedObjects {
                open: self.stack.len(),
            });
        }
        self.check_offset(root.value())?;

        let mut header = SIZE_UOFFSET;
        if file_identifier.is_some() {
            header += FILE_IDENTIFIER_LENGTH;
        }
        if size_prefixed {
            header += SIZE_SIZE_PREFIX;
        }
        let alignment = self.arena.min_align().max(SIZE_UOFFSET);
        self.arena.align(header, alignment)?;

        if let Some(ident) = file_identifier {
            self.arena.push_bytes(ident)?;
        }
        self.push_uoffset(root.value())?;
        if size_prefixed {
            self.push_len(self.arena.len())?;
        }

        self.finished = true;
        tracing::debug!(
            size = self.arena.len(),
            size_prefixed,
            vtables = self.vtables.len(),
            vtables_reused = self.vtables.stats().hits,
            "buffer finished"
        );
        Ok(())
    }

    /// The sealed buffer.
    pub fn finished_data(&self) -> Result<&[u8], BuildError> {
        if !self.finished {
            return Err(BuildError::NotFinished);
        }
        Ok(self.arena.data())
    }

    /// Take ownership of the sealed buffer.
    pub fn into_vec(self) -> Result<Vec<u8>, BuildError> {
        if !self.finished {
            return Err(BuildError::NotFinished);
        }
        Ok(self.arena.into_vec())
    }

    /// Start over with an empty arena, keeping the allocation.
    pub fn reset(&mut self) {
        self.arena.clear();
        self.vtables.clear();
        self.shared_strings.clear();
        self.stack.clear();
        self.finished = false;
    }

    fn ensure_building(&self) -> Result<(), BuildError> {
        if self.finished {
            return Err(BuildError::Finished);
        }
        Ok(())
    }

    fn check_field(&self, id: u16) -> Result<(), BuildError> {
        self.ensure_building()?;
        let object = self.stack.last().ok_or(BuildError::NoOpenObject)?;
        if id >= object.field_count {
            return Err(BuildError::FieldOutOfRange {
                id,
                field_count: object.field_count,
            });
        }
        if object.fields.iter().any(|&(existing, _)| existing == id) {
            return Err(BuildError::DuplicateField(id));
        }
        Ok(())
    }

    fn push_pending(&mut self, id: u16, field: Pending) {
        if let Some(object) = self.stack.last_mut() {
            object.fields.push((id, field));
        }
    }

    fn check_offset(&self, pos: u32) -> Result<(), BuildError> {
        if pos == 0 || pos as usize > self.arena.len() {
            return Err(BuildError::InvalidOffset(pos));
        }
        Ok(())
    }

    fn vector_bytes(&self, count: usize, elem_size: usize) -> Result<usize, BuildError> {
        count
            .checked_mul(elem_size)
            .filter(|&n| n <= MAX_BUFFER_SIZE)
            .ok_or(BuildError::BufferTooLarge {
                requested: usize::MAX,
            })
    }

    fn push_uoffset(&mut self, target: u32) -> Result<(), BuildError> {
        self.arena.align(SIZE_UOFFSET, SIZE_UOFFSET)?;
        let value = self.arena.len() + SIZE_UOFFSET - target as usize;
        self.arena.push(value as u32)
    }

    fn push_len(&mut self, len: usize) -> Result<(), BuildError> {
        let len = u32::try_from(len).map_err(|_| BuildError::BufferTooLarge { requested: len })?;
        self.arena.push(len)
    }
}
