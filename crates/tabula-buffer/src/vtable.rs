//! Vtables: per-table field-presence index, and the cache that shares
//! identical ones within a build session.

use std::collections::HashMap;

use tabula_core::VOffset;
use tabula_core::layout::{VTABLE_METADATA_SIZE, field_id_to_voffset, read_u16_le};

/// Read-only view of a vtable inside a buffer.
#[derive(Clone, Copy, Debug)]
pub struct VTable<'a> {
    buf: &'a [u8],
    loc: usize,
}

impl<'a> VTable<'a> {
    pub fn new(buf: &'a [u8], loc: usize) -> Self {
        Self { buf, loc }
    }

    pub fn loc(&self) -> usize {
        self.loc
    }

    /// Vtable size in bytes, header included.
    pub fn len(&self) -> usize {
        read_u16_le(self.buf, self.loc) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.field_count() == 0
    }

    /// Size in bytes of the table that owns this vtable.
    pub fn table_len(&self) -> usize {
        read_u16_le(self.buf, self.loc + 2) as usize
    }

    /// Number of field slots the vtable declares.
    pub fn field_count(&self) -> usize {
        self.len().saturating_sub(VTABLE_METADATA_SIZE) / 2
    }

    /// In-table offset of field `id`, or 0 when absent (including ids past
    /// the end of the vtable).
    pub fn get(&self, id: u16) -> VOffset {
        let pos = field_id_to_voffset(id);
        if pos >= self.len() {
            return 0;
        }
        read_u16_le(self.buf, self.loc + pos)
    }

    /// Raw bytes, header included.
    pub fn as_bytes(&self) -> &'a [u8] {
        &self.buf[self.loc..self.loc + self.len()]
    }
}

/// Hit/miss counters for a [`VTableCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VTableStats {
    /// Tables that reused an earlier vtable.
    pub hits: usize,
    /// Tables that had to write their own.
    pub misses: usize,
    /// Bytes not written thanks to reuse.
    pub bytes_saved: usize,
}

/// Content-addressed set of vtables written during one build session.
///
/// Keys are the complete vtable bytes, so the length prefix takes part in
/// the comparison.
#[derive(Clone, Debug, Default)]
pub struct VTableCache {
    written: HashMap<Box<[u8]>, u32>,
    stats: VTableStats,
}

impl VTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arena position of an identical vtable written earlier, if any.
    pub fn find(&mut self, vtable: &[u8]) -> Option<u32> {
        match self.written.get(vtable) {
            Some(&pos) => {
                self.stats.hits += 1;
                self.stats.bytes_saved += vtable.len();
                tracing::trace!(pos, len = vtable.len(), "vtable reused");
                Some(pos)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Register a vtable just committed at `pos`.
    pub fn insert(&mut self, vtable: &[u8], pos: u32) {
        self.written.entry(vtable.into()).or_insert(pos);
    }

    /// Distinct vtables registered.
    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    pub fn stats(&self) -> VTableStats {
        self.stats
    }

    pub fn clear(&mut self) {
        self.written.clear();
        self.stats = VTableStats::default();
    }
}
