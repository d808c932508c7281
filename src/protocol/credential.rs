//! Credential (CD key) loading and validation.
//!
//! A credential is four groups of five characters from `[0-9A-Z]`, joined
//! by hyphens. Input is trimmed and uppercased before validation; anything
//! else is rejected before it can reach the handshake.

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use tracing::debug;

use crate::error::{ProtocolError, Result};

const GROUPS: usize = 4;
const GROUP_LEN: usize = 5;

/// Length of a well-formed credential, hyphens included
pub const CREDENTIAL_LEN: usize = GROUPS * GROUP_LEN + GROUPS - 1;

/// A validated, uppercased credential
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Normalize and validate a credential string
    pub fn parse(raw: &str) -> Result<Self> {
        let key = raw.trim().to_uppercase();
        if !is_well_formed(&key) {
            return Err(ProtocolError::MalformedCredential);
        }
        Ok(Self(key))
    }

    /// Read the credential from the first line of `path`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ProtocolError::ReadFailure(format!("{}: {e}", path.display()))
        })?;

        let mut line = String::new();
        BufReader::new(file)
            .read_line(&mut line)
            .map_err(|e| ProtocolError::ReadFailure(format!("{}: {e}", path.display())))?;

        let credential = Self::parse(&line)?;
        debug!(path = %path.display(), "Loaded credential");
        Ok(credential)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for Credential {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(*****-*****-*****-*****)")
    }
}

fn is_well_formed(key: &str) -> bool {
    key.len() == CREDENTIAL_LEN
        && key.split('-').count() == GROUPS
        && key.split('-').all(|group| {
            group.len() == GROUP_LEN
                && group
                    .bytes()
                    .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
        })
}
