//! Wire-level layout constants and offset arithmetic.
//!
//! Every buffer is little-endian. Offsets are relative so a finished buffer
//! can be moved around as raw bytes:
//! - `uoffset` (u32): target = position of the offset + value
//! - `soffset` (i32): vtable = table start − value
//! - `voffset` (u16): field position relative to its table start

/// Unsigned forward offset.
pub type UOffset = u32;
/// Signed table → vtable offset.
pub type SOffset = i32;
/// Vtable entry: in-table offset of a field, 0 when absent.
pub type VOffset = u16;

pub const SIZE_UOFFSET: usize = 4;
pub const SIZE_SOFFSET: usize = 4;
pub const SIZE_VOFFSET: usize = 2;
pub const SIZE_SIZE_PREFIX: usize = 4;

/// Length of the optional file identifier stored right after the root offset.
pub const FILE_IDENTIFIER_LENGTH: usize = 4;

/// Vtable header: own length + table length, both `VOffset`.
pub const VTABLE_METADATA_SIZE: usize = 2 * SIZE_VOFFSET;

/// Largest buffer the builder will produce and the verifier will accept.
pub const MAX_BUFFER_SIZE: usize = (1 << 31) - 1;

/// Highest field id whose vtable length still fits a `VOffset`.
pub const MAX_FIELD_ID: u16 = ((u16::MAX as usize - VTABLE_METADATA_SIZE) / SIZE_VOFFSET - 1) as u16;

/// Position of a field's entry inside its vtable.
///
/// ```
/// use tabula_core::layout::field_id_to_voffset;
/// assert_eq!(field_id_to_voffset(0), 4);
/// assert_eq!(field_id_to_voffset(3), 10);
/// ```
#[inline]
pub const fn field_id_to_voffset(id: u16) -> usize {
    VTABLE_METADATA_SIZE + id as usize * SIZE_VOFFSET
}

/// Vtable length needed to address field ids `0..field_count`.
#[inline]
pub const fn vtable_len(field_count: usize) -> usize {
    VTABLE_METADATA_SIZE + field_count * SIZE_VOFFSET
}

/// Bytes of zero padding that make `len` a multiple of `align`.
///
/// `align` must be a power of two.
#[inline]
pub const fn padding_bytes(len: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    len.wrapping_neg() & (align - 1)
}

/// Round up to the next multiple of `align` (a power of two).
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    value + padding_bytes(value, align)
}

/// Read a little-endian u16 at `offset`.
#[inline]
pub fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

/// Read a little-endian u32 at `offset`.
#[inline]
pub fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// Read a little-endian i32 at `offset`.
#[inline]
pub fn read_i32_le(bytes: &[u8], offset: usize) -> i32 {
    read_u32_le(bytes, offset) as i32
}
