//! Query request payloads and the response header.
//!
//! ## Request
//! ```text
//! [0x00] [TermCount(1)] { [Key(lp)] [Value(lp)] [Op(1)] } * TermCount
//! ```
//! `Op` is `0x04` for a negated term and `0x00` otherwise. With a single
//! term the first two bytes read as the little-endian header `256`, which
//! is the form [`build_query`] produces.
//!
//! ## Response header
//! ```text
//! [Count(4, LE)] [Extra(1)]
//! ```
//! `Count` server record frames follow. `Extra` has no documented meaning
//! and is passed through untouched.

use crate::core::wire::{put_string, read_u32_le};
use crate::error::{constants, ProtocolError, Result};

/// Operator byte marking a negated term
pub const NEGATE_OP: u8 = 0x04;

/// Length of the response header frame
pub const RESPONSE_HEADER_LEN: usize = 5;

/// Single-term request: `u16-LE(header) || lp(type) || lp(value) || 0x00`
pub fn build_query(header: u16, query_type: &str, query_value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(query_type.len() + query_value.len() + 7);
    out.extend_from_slice(&header.to_le_bytes());
    put_string(&mut out, query_type.as_bytes());
    put_string(&mut out, query_value.as_bytes());
    out.push(0x00);
    out
}

/// One `key = value` condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTerm {
    pub key: String,
    pub value: String,
    pub negate: bool,
}

impl QueryTerm {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            negate: false,
        }
    }

    pub fn negated(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            negate: true,
            ..Self::new(key, value)
        }
    }

    /// Build a term from the shorthand key syntax.
    ///
    /// A leading `^` negates the term; trailing `_` characters are dropped so
    /// the same key can be listed more than once, e.g. `"^currentplayers"` or
    /// `"gametype_"`.
    pub fn parse(key: &str, value: impl Into<String>) -> Self {
        let negate = key.starts_with('^');
        let key = key.trim_end_matches('_').trim_start_matches('^');
        Self {
            key: key.to_string(),
            value: value.into(),
            negate,
        }
    }

    fn op(&self) -> u8 {
        if self.negate {
            NEGATE_OP
        } else {
            0x00
        }
    }
}

/// Ordered set of query terms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    terms: Vec<QueryTerm>,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `key = value` term
    pub fn term(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.push(QueryTerm::new(key, value));
        self
    }

    /// Add a `key != value` term
    pub fn exclude(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.terms.push(QueryTerm::negated(key, value));
        self
    }

    pub fn push(&mut self, term: QueryTerm) {
        self.terms.push(term);
    }

    pub fn terms(&self) -> &[QueryTerm] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Encode the request payload.
    ///
    /// An empty filter is sent as one empty term, which matches every server.
    pub fn to_payload(&self) -> Result<Vec<u8>> {
        let match_all = [QueryTerm::new("", "")];
        let terms: &[QueryTerm] = if self.terms.is_empty() {
            &match_all
        } else {
            &self.terms
        };

        let count = u8::try_from(terms.len()).map_err(|_| {
            ProtocolError::InvalidQuery(format!("{} terms exceeds limit of 255", terms.len()))
        })?;

        let mut out = vec![0x00, count];
        for term in terms {
            put_string(&mut out, term.key.as_bytes());
            put_string(&mut out, term.value.as_bytes());
            out.push(term.op());
        }
        Ok(out)
    }
}

impl FromIterator<QueryTerm> for QueryFilter {
    fn from_iter<I: IntoIterator<Item = QueryTerm>>(iter: I) -> Self {
        Self {
            terms: iter.into_iter().collect(),
        }
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for QueryFilter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(k, v)| QueryTerm::parse(k.as_ref(), v))
            .collect()
    }
}

/// Header of a query response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Number of server record frames that follow
    pub count: u32,
    /// Opaque trailing byte
    pub extra: u8,
}

impl ResponseHeader {
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < RESPONSE_HEADER_LEN {
            return Err(ProtocolError::MalformedResponse(
                constants::ERR_SHORT_RESPONSE_HEADER.to_string(),
            ));
        }
        Ok(Self {
            count: read_u32_le(frame, 0),
            extra: frame[4],
        })
    }
}
