//! Buffer header: optional size prefix, root offset, optional file identifier.
//!
//! Layout (all little-endian):
//! - 0-3: size prefix, only in size-prefixed buffers
//! - then u32 uoffset to the root table
//! - then 4 identifier bytes, when the writer supplied one

use tabula_core::layout::{FILE_IDENTIFIER_LENGTH, SIZE_SIZE_PREFIX, SIZE_UOFFSET, read_u32_le};

/// Where the root offset lives.
#[inline]
pub const fn root_pos(size_prefixed: bool) -> usize {
    if size_prefixed { SIZE_SIZE_PREFIX } else { 0 }
}

/// Bytes that would hold the file identifier, if the buffer is long enough.
pub fn file_identifier(buf: &[u8], size_prefixed: bool) -> Option<[u8; FILE_IDENTIFIER_LENGTH]> {
    let start = root_pos(size_prefixed) + SIZE_UOFFSET;
    buf.get(start..start + FILE_IDENTIFIER_LENGTH)?
        .try_into()
        .ok()
}

/// Whether the buffer carries `ident`.
pub fn has_identifier(buf: &[u8], ident: &[u8; FILE_IDENTIFIER_LENGTH], size_prefixed: bool) -> bool {
    file_identifier(buf, size_prefixed).as_ref() == Some(ident)
}

/// The size prefix: length of everything after it.
pub fn size_prefix(buf: &[u8]) -> Option<u32> {
    (buf.len() >= SIZE_SIZE_PREFIX).then(|| read_u32_le(buf, 0))
}

/// Render identifier bytes for messages: printable ASCII as-is, the rest escaped.
pub fn format_identifier(ident: &[u8]) -> String {
    ident.escape_ascii().to_string()
}
