//! Tokio codec for the top-level `u32-LE length || payload` frame.
//!
//! The decoder refuses any declared length above [`MAX_FRAME_LENGTH`]: a
//! header that large means the stream lost synchronization, and the
//! declared body is never read.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtocolError, Result};

/// Size of the frame length header
pub const FRAME_HEADER_LEN: usize = 4;

/// Largest frame body the master server ever sends
pub const MAX_FRAME_LENGTH: u32 = 65_535;

/// Parse a frame header, rejecting desynchronized lengths
pub fn parse_frame_header(header: [u8; FRAME_HEADER_LEN]) -> Result<u32> {
    let len = u32::from_le_bytes(header);
    if len > MAX_FRAME_LENGTH {
        return Err(ProtocolError::LengthOverflow(len));
    }
    Ok(len)
}

/// Prefix `payload` with its little-endian length
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.len() < FRAME_HEADER_LEN {
            return Ok(None);
        }

        let mut header = [0u8; FRAME_HEADER_LEN];
        header.copy_from_slice(&src[..FRAME_HEADER_LEN]);
        let len = parse_frame_header(header)? as usize;

        if src.len() < FRAME_HEADER_LEN + len {
            src.reserve(FRAME_HEADER_LEN + len - src.len());
            return Ok(None);
        }

        src.advance(FRAME_HEADER_LEN);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = ProtocolError;

    /// Outgoing frames are not held to [`MAX_FRAME_LENGTH`]; that cap only
    /// guards against a desynchronized peer.
    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        let len = u32::try_from(item.len()).map_err(|_| {
            ProtocolError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("frame of {} bytes does not fit a u32 length", item.len()),
            ))
        })?;
        dst.reserve(FRAME_HEADER_LEN + item.len());
        dst.put_u32_le(len);
        dst.extend_from_slice(&item);
        Ok(())
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<()> {
        self.encode(Bytes::copy_from_slice(item), dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::from(&[3u8, 0, 0, 0, b'a'][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 5);

        buf.extend_from_slice(b"bc");
        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], b"abc");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_rejects_overflow() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        buf.put_u32_le(65_536);
        let err = codec.decode(&mut buf).unwrap_err();
        assert!(matches!(err, ProtocolError::LengthOverflow(65_536)));
    }

    #[test]
    fn test_encode_matches_helper() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        codec.encode(&b"hello"[..], &mut buf).unwrap();
        assert_eq!(&buf[..], &encode_frame(b"hello")[..]);
        assert_eq!(&buf[..4], &[5, 0, 0, 0]);
    }

    #[test]
    fn test_encode_has_no_receive_cap() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        codec.encode(&vec![7u8; 70_000][..], &mut buf).unwrap();
        assert_eq!(&buf[..4], &70_000u32.to_le_bytes());
        assert_eq!(buf.len(), FRAME_HEADER_LEN + 70_000);
    }

    #[test]
    fn test_header_limit_is_inclusive() {
        assert_eq!(parse_frame_header(65_535u32.to_le_bytes()).unwrap(), 65_535);
        assert!(parse_frame_header(65_536u32.to_le_bytes()).is_err());
    }
}
