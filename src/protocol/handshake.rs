//! Challenge/response authentication with the master server.
//!
//! The exchange is linear:
//!
//! ```text
//! Connected --challenge--> ChallengeReceived --"APPROVED"--> Approved --"VERIFIED"--> Verified
//! ```
//!
//! 1. The server sends a challenge string as soon as the socket opens.
//! 2. The client answers with `MD5(key)`, `MD5(key || challenge)` (lowercase
//!    hex), its identifier, its type and a fixed block of version bytes.
//! 3. The server answers `APPROVED`; the client sends the fixed verify blob.
//! 4. The server answers `VERIFIED`; the session is authenticated.
//!
//! An [`AuthHandshake`] is consumed by [`AuthHandshake::run`], so a spent
//! handshake can never be replayed on the same connection.

use md5::{Digest, Md5};
use tracing::{debug, info, instrument, warn};

use crate::core::wire::{pack_string, put_string, unpack_string};
use crate::error::{constants, ErrorKind, ProtocolError, Result};
use crate::protocol::credential::Credential;
use crate::transport::TransportSession;
use crate::utils::metrics::{global_metrics, Timer};

/// Client identifier sent after the hashes
pub const CLIENT_IDENTIFIER: &[u8] = b"UT2K4CLIENT";

/// Client type sent after the version bytes
pub const CLIENT_TYPE: &[u8] = b"int";

/// Opaque bytes sent between the identifier and the client type
pub const CLIENT_VERSION_BYTES: [u8; 5] = [0x29, 0x0D, 0x00, 0x00, 0x05];

/// Opaque bytes closing the challenge response
pub const CLIENT_SUFFIX: [u8; 13] = [
    0x16, 0x04, 0x00, 0x00, 0x86, 0x80, 0x00, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00,
];

/// Fixed key blob sent once the challenge response is approved
pub const VERIFY_BLOB: &[u8] = b"0014e800000000000000000000000000";

pub const APPROVED: &[u8] = b"APPROVED";
pub const VERIFIED: &[u8] = b"VERIFIED";

/// Progress of a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Connected,
    ChallengeReceived,
    Approved,
    Verified,
}

/// Lowercase hex MD5 digest
pub fn md5_hex(data: &[u8]) -> String {
    let digest = Md5::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// `(MD5(key), MD5(key || challenge))` as lowercase hex
pub fn make_hashes(credential: &Credential, challenge: &[u8]) -> (String, String) {
    let salted = [credential.as_bytes(), challenge].concat();
    (md5_hex(credential.as_bytes()), md5_hex(&salted))
}

/// Payload answering the server's challenge
pub fn build_challenge_response(credential: &Credential, challenge: &[u8]) -> Vec<u8> {
    let (key_hash, salted_hash) = make_hashes(credential, challenge);

    let mut out = Vec::with_capacity(128);
    put_string(&mut out, key_hash.as_bytes());
    put_string(&mut out, salted_hash.as_bytes());
    put_string(&mut out, CLIENT_IDENTIFIER);
    out.extend_from_slice(&CLIENT_VERSION_BYTES);
    put_string(&mut out, CLIENT_TYPE);
    out.extend_from_slice(&CLIENT_SUFFIX);
    out
}

/// Payload sent after approval
pub fn build_verify_request() -> Vec<u8> {
    pack_string(VERIFY_BLOB)
}

/// One authentication attempt over a connected session
pub struct AuthHandshake<'a> {
    credential: &'a Credential,
    state: HandshakeState,
}

impl<'a> AuthHandshake<'a> {
    pub fn new(credential: &'a Credential) -> Self {
        Self {
            credential,
            state: HandshakeState::Connected,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Drive the exchange to completion, connecting first if needed.
    ///
    /// Any failure closes the connection; the failure stays readable through
    /// [`TransportSession::last_error`].
    #[instrument(skip_all, fields(addr = %session.addr()))]
    pub async fn run(mut self, session: &mut TransportSession) -> Result<()> {
        let _timer = Timer::start("authenticate");
        global_metrics().handshake_attempt();

        if let Err(e) = self.exchange(session).await {
            let kind = e.kind().or(session.last_error());
            warn!(state = ?self.state, error = %e, "Handshake failed, closing connection");
            global_metrics().handshake_failed();
            session.disconnect();
            if let Some(kind) = kind {
                session.record_error(kind);
            }
            return Err(e);
        }

        session.mark_authenticated();
        global_metrics().handshake_success();
        info!("Authenticated with master server");
        Ok(())
    }

    async fn exchange(&mut self, session: &mut TransportSession) -> Result<()> {
        if !session.is_connected() {
            session.connect().await?;
        }

        let frame = session.read_frame().await?;
        if frame.is_empty() {
            return Err(ProtocolError::MalformedResponse(
                constants::ERR_EMPTY_CHALLENGE.to_string(),
            ));
        }
        let challenge = unpack_string(&frame, 0).0.to_vec();
        self.state = HandshakeState::ChallengeReceived;
        debug!(challenge_len = challenge.len(), "Received challenge");

        let response = build_challenge_response(self.credential, &challenge);
        session.write_frame(&response).await?;
        self.expect(session, APPROVED, ErrorKind::ApproveFailure).await?;
        self.state = HandshakeState::Approved;
        debug!("Challenge response approved");

        session.write_frame(&build_verify_request()).await?;
        self.expect(session, VERIFIED, ErrorKind::VerifyFailure).await?;
        self.state = HandshakeState::Verified;
        Ok(())
    }

    /// A reply other than `wanted`, a failed read included, is `failure`
    async fn expect(
        &self,
        session: &mut TransportSession,
        wanted: &[u8],
        failure: ErrorKind,
    ) -> Result<()> {
        let reply = session
            .read_frame()
            .await
            .map(|frame| unpack_string(&frame, 0).0.to_vec())
            .unwrap_or_default();

        if reply == wanted {
            return Ok(());
        }

        debug!(reply = %String::from_utf8_lossy(&reply), "Unexpected handshake reply");
        Err(failure.into())
    }
}
