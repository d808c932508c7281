//! # Server Records
//!
//! Decoding of the binary record the master server sends for each listed
//! game server. Layout, little-endian throughout:
//!
//! ```text
//! [IP(4)] [Port(2)] [QueryPort(2)] [Name(lp)] [Map(lp)] [Trailer(12)]
//!
//! Trailer:
//! [ParamF_lo(2)] [ParamF_hi(1)] [CurPlayers(1)] [MaxPlayers(1)] [Flags(1)]
//! [ParamG(2)] [ParamH(4)]
//! ```
//!
//! Some servers send a 10-byte trailer; it is padded with two zero bytes.
//! Anything shorter leaves the record without a trailer, which callers see
//! through [`ServerRecord::is_valid`].

use std::fmt;
use std::net::Ipv4Addr;

use crate::core::wire::{int_to_ip, read_u16_le, read_u32_le, unpack_string};
use crate::error::{ProtocolError, Result};

/// Size of the address/port block at the start of every record
pub const RECORD_HEADER_LEN: usize = 8;

/// Size of the numeric trailer
pub const TRAILER_LEN: usize = 12;

/// Trailer length the master server is known to send by mistake
pub const SHORT_TRAILER_LEN: usize = 10;

/// One capability bit of a record's flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerFlag {
    Classic,
    Standard,
    Instagib,
    Listen,
    Latest,
    Stats,
    Password,
}

impl ServerFlag {
    pub const ALL: [ServerFlag; 7] = [
        ServerFlag::Classic,
        ServerFlag::Standard,
        ServerFlag::Instagib,
        ServerFlag::Listen,
        ServerFlag::Latest,
        ServerFlag::Stats,
        ServerFlag::Password,
    ];

    pub fn bit(self) -> u8 {
        match self {
            ServerFlag::Classic => 0x40,
            ServerFlag::Standard => 0x20,
            ServerFlag::Instagib => 0x10,
            ServerFlag::Listen => 0x08,
            ServerFlag::Latest => 0x04,
            ServerFlag::Stats => 0x02,
            ServerFlag::Password => 0x01,
        }
    }
}

/// Set of [`ServerFlag`]s carried by the flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ServerFlags(u8);

impl ServerFlags {
    pub fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Raw flags byte as received
    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, flag: ServerFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.iter().next().is_none()
    }

    pub fn iter(self) -> impl Iterator<Item = ServerFlag> {
        ServerFlag::ALL.into_iter().filter(move |f| self.contains(*f))
    }
}

/// Filter bits carried in the third byte of `ParamH`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ServerFilters {
    pub has_players: bool,
}

impl ServerFilters {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            has_players: byte & 0x01 != 0,
        }
    }
}

/// Leftover trailer values with no known meaning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrailerParams {
    /// 24-bit value: `ParamF_lo + ParamF_hi * 65536`
    pub f: u32,
    pub g: u16,
    pub h: u32,
}

/// Decoded 12-byte trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordTrailer {
    pub cur_players: u8,
    pub max_players: u8,
    pub flags: ServerFlags,
    pub filters: ServerFilters,
    pub params: TrailerParams,
}

impl RecordTrailer {
    fn decode(raw: &[u8; TRAILER_LEN]) -> Self {
        let f = read_u16_le(raw, 0) as u32 + raw[2] as u32 * 65_536;
        let h = read_u32_le(raw, 8);
        Self {
            cur_players: raw[3],
            max_players: raw[4],
            flags: ServerFlags::from_bits(raw[5]),
            filters: ServerFilters::from_byte(((h >> 16) & 0xFF) as u8),
            params: TrailerParams {
                f,
                g: read_u16_le(raw, 6),
                h,
            },
        }
    }

    /// The raw filters byte, `(ParamH >> 16) & 0xFF`
    pub fn filters_byte(&self) -> u8 {
        ((self.params.h >> 16) & 0xFF) as u8
    }
}

/// One game server as listed by the master server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerRecord {
    pub ip: Ipv4Addr,
    pub port: u16,
    pub query_port: u16,
    pub name: String,
    pub map_name: String,
    /// `None` when the record arrived without a usable trailer
    pub trailer: Option<RecordTrailer>,
}

impl ServerRecord {
    /// Decode one record payload.
    ///
    /// Fails only when the 8-byte address block is incomplete. Name lengths
    /// that overrun the buffer are clipped and leave the trailer unset.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.len() < RECORD_HEADER_LEN {
            return Err(ProtocolError::MalformedRecord { len: raw.len() });
        }

        let ip = int_to_ip(read_u32_le(raw, 0));
        let port = read_u16_le(raw, 4);
        let query_port = read_u16_le(raw, 6);

        let mut offset = RECORD_HEADER_LEN;
        let (name, used) = unpack_string(raw, offset);
        offset += used;
        let (map_name, used) = unpack_string(raw, offset);
        offset += used;

        let rest = raw.get(offset..).unwrap_or(&[]);
        let rest = &rest[..rest.len().min(TRAILER_LEN)];
        let mut trailer = [0u8; TRAILER_LEN];
        let trailer = match rest.len() {
            TRAILER_LEN | SHORT_TRAILER_LEN => {
                trailer[..rest.len()].copy_from_slice(rest);
                Some(RecordTrailer::decode(&trailer))
            }
            _ => None,
        };

        Ok(Self {
            ip,
            port,
            query_port,
            name: clean_name(name),
            map_name: clean_name(map_name),
            trailer,
        })
    }

    /// Whether the full numeric trailer was present
    pub fn is_valid(&self) -> bool {
        self.trailer.is_some()
    }

    pub fn cur_players(&self) -> Option<u8> {
        self.trailer.map(|t| t.cur_players)
    }

    pub fn max_players(&self) -> Option<u8> {
        self.trailer.map(|t| t.max_players)
    }

    pub fn flags(&self) -> Option<ServerFlags> {
        self.trailer.map(|t| t.flags)
    }

    pub fn filters(&self) -> Option<ServerFilters> {
        self.trailer.map(|t| t.filters)
    }

    pub fn params(&self) -> Option<TrailerParams> {
        self.trailer.map(|t| t.params)
    }

    pub fn has_flag(&self, flag: ServerFlag) -> bool {
        self.flags().is_some_and(|f| f.contains(flag))
    }
}

impl fmt::Display for ServerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}\t{}", self.ip, self.port, self.name)
    }
}

const ESC: u8 = 0x1B;
const NBSP: u8 = 0xA0;

/// Remove colour codes and known encoding artifacts from a server or map name.
///
/// - `ESC` followed by three bytes is a colour code and is dropped
/// - non-breaking spaces become plain spaces
/// - `0xC2 ' '` (a UTF-8 NBSP whose second byte was already replaced) becomes `' '`
/// - `"zzz "` is removed
pub fn clean_name_bytes(raw: &[u8]) -> Vec<u8> {
    let mut stripped = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == ESC && i + 3 < raw.len() && !raw[i + 1..i + 4].contains(&b'\n') {
            i += 4;
            continue;
        }
        stripped.push(if raw[i] == NBSP { b' ' } else { raw[i] });
        i += 1;
    }

    let collapsed = replace_all(&stripped, &[0xC2, b' '], b" ");
    replace_all(&collapsed, b"zzz ", b"")
}

/// Clean a name and decode it as UTF-8, falling back to Latin-1
pub fn clean_name(raw: &[u8]) -> String {
    let cleaned = clean_name_bytes(raw);
    match String::from_utf8(cleaned) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

fn replace_all(haystack: &[u8], needle: &[u8], with: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(needle) {
            out.extend_from_slice(with);
            i += needle.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::wire::put_string;

    fn record(name: &[u8], map: &[u8], trailer: &[u8]) -> Vec<u8> {
        let mut raw = vec![10, 0, 0, 1];
        raw.extend_from_slice(&7777u16.to_le_bytes());
        raw.extend_from_slice(&7778u16.to_le_bytes());
        put_string(&mut raw, name);
        put_string(&mut raw, map);
        raw.extend_from_slice(trailer);
        raw
    }

    #[test]
    fn test_decode_full_record() {
        let trailer = [0x34, 0x12, 0x02, 5, 16, 0x40 | 0x01, 0xCD, 0xAB, 0, 0, 0x01, 0];
        let rec = ServerRecord::decode(&record(b"My Server", b"DM-Rankin", &trailer)).unwrap();

        assert_eq!(rec.ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(rec.port, 7777);
        assert_eq!(rec.query_port, 7778);
        assert_eq!(rec.name, "My Server");
        assert_eq!(rec.map_name, "DM-Rankin");
        assert_eq!(rec.cur_players(), Some(5));
        assert_eq!(rec.max_players(), Some(16));
        assert!(rec.has_flag(ServerFlag::Classic));
        assert!(rec.has_flag(ServerFlag::Password));
        assert!(!rec.has_flag(ServerFlag::Stats));

        let params = rec.params().unwrap();
        assert_eq!(params.f, 0x1234 + 2 * 65_536);
        assert_eq!(params.g, 0xABCD);
        assert_eq!(params.h, 0x0001_0000);
        assert_eq!(rec.filters(), Some(ServerFilters { has_players: true }));
    }

    #[test]
    fn test_flag_bits() {
        let only_classic = ServerFlags::from_bits(0x40);
        assert_eq!(only_classic.iter().collect::<Vec<_>>(), vec![ServerFlag::Classic]);
        assert!(ServerFlags::from_bits(0).is_empty());
        assert_eq!(ServerFlags::from_bits(0x7F).iter().count(), 7);
    }

    #[test]
    fn test_short_trailer_padded() {
        let ten = [1, 0, 0, 3, 8, 0x20, 9, 0, 0, 0];
        let mut twelve = ten.to_vec();
        twelve.extend_from_slice(&[0, 0]);

        let a = ServerRecord::decode(&record(b"a", b"b", &ten)).unwrap();
        let b = ServerRecord::decode(&record(b"a", b"b", &twelve)).unwrap();
        assert_eq!(a, b);
        assert!(a.is_valid());
    }

    #[test]
    fn test_missing_trailer_keeps_identity() {
        let rec = ServerRecord::decode(&record(b"Broken", b"CTF-Face", &[1, 2, 3])).unwrap();
        assert!(!rec.is_valid());
        assert_eq!(rec.name, "Broken");
        assert_eq!(rec.port, 7777);
        assert_eq!(rec.cur_players(), None);
        assert_eq!(rec.flags(), None);
        assert_eq!(rec.filters(), None);
    }

    #[test]
    fn test_eleven_byte_trailer_is_invalid() {
        let rec = ServerRecord::decode(&record(b"x", b"y", &[0; 11])).unwrap();
        assert!(!rec.is_valid());
    }

    #[test]
    fn test_truncated_header_rejected() {
        assert!(matches!(
            ServerRecord::decode(&[1, 2, 3]),
            Err(ProtocolError::MalformedRecord { len: 3 })
        ));
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name(b"\x1b\xff\x00\x00Red Team"), "Red Team");
        assert_eq!(clean_name(b"A\xa0B"), "A B");
        assert_eq!(clean_name(b"A\xc2\xa0B"), "A B");
        assert_eq!(clean_name(b"zzz Server"), "Server");
        assert_eq!(clean_name(b"Plain Name 123"), "Plain Name 123");
    }

    #[test]
    fn test_clean_name_latin1_fallback() {
        assert_eq!(clean_name(b"Caf\xe9"), "Caf\u{e9}");
        assert_eq!(clean_name("Café".as_bytes()), "Café");
    }
}
