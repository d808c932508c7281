//! Nested string framing and small little-endian helpers.
//!
//! Strings inside a frame payload are encoded as
//! ```text
//! [Length(1)] [Content(Length - 1)] [NUL(1)]
//! ```
//! where the length byte counts the trailing NUL. The longest encodable
//! content is therefore 254 bytes.

use std::net::Ipv4Addr;

/// Longest string content that fits behind a one-byte length prefix
pub const MAX_STRING_CONTENT: usize = 254;

/// Pack a byte-length-prefixed, NUL-terminated string.
///
/// Content longer than [`MAX_STRING_CONTENT`] is truncated so that the
/// length byte always matches the bytes that follow it.
pub fn pack_string(content: &[u8]) -> Vec<u8> {
    let content = &content[..content.len().min(MAX_STRING_CONTENT)];
    let mut out = Vec::with_capacity(content.len() + 2);
    out.push((content.len() + 1) as u8);
    out.extend_from_slice(content);
    out.push(0);
    out
}

/// Append a packed string to an existing buffer
pub fn put_string(buf: &mut Vec<u8>, content: &[u8]) {
    buf.extend_from_slice(&pack_string(content));
}

/// Unpack the string whose length byte sits at `offset`.
///
/// Returns the content (without the trailing NUL) and the number of bytes
/// the field occupies, length byte included. Lengths running past the end of
/// `data` are clipped; an `offset` at or past the end yields an empty string
/// that consumes nothing.
pub fn unpack_string(data: &[u8], offset: usize) -> (&[u8], usize) {
    let Some(&len) = data.get(offset) else {
        return (&[], 0);
    };
    let len = len as usize;
    let start = (offset + 1).min(data.len());
    let end = (offset + len).min(data.len()).max(start);
    (&data[start..end], 1 + len)
}

/// Render a little-endian packed IPv4 address
pub fn int_to_ip(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value.to_le_bytes())
}

pub(crate) fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub(crate) fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}
