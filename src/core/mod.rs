//! # Core Protocol Components
//!
//! Low-level framing, nested strings, and server record decoding.
//!
//! Nothing in here performs I/O; the transport and protocol layers feed
//! bytes through these functions.
//!
//! ## Components
//! - **Codec**: Tokio codec for the top-level length-prefixed frame
//! - **Wire**: one-byte length-prefixed strings and little-endian helpers
//! - **Record**: the binary server record and name cleanup
//!
//! ## Wire Format
//! ```text
//! Frame:  [Length(4, LE)] [Payload(Length)]
//! String: [Length(1)] [Content(Length - 1)] [NUL]
//! ```
//!
//! ## Limits
//! - Maximum frame body: 65535 bytes (larger headers mean lost sync)
//! - Maximum string content: 254 bytes

pub mod codec;
pub mod record;
pub mod wire;
