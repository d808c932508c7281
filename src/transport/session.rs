//! # TCP Session
//!
//! One [`TransportSession`] owns exactly one TCP connection to the master
//! server and all of the mutable state around it.
//!
//! ## Responsibilities
//! - Open, close and reopen the connection
//! - Deadline-bounded raw reads that hand back partial data on expiry
//! - Length-prefixed frame reads and writes
//! - Classify socket failures and keep the most recent one in a
//!   last-error slot that callers may poll and clear
//!
//! A session is driven through `&mut self`, so it can never serve two
//! operations at once.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::codec::Encoder;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ClientConfig;
use crate::core::codec::{parse_frame_header, FrameCodec, FRAME_HEADER_LEN};
use crate::error::{constants, ErrorKind, ProtocolError, Result};
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::{deadline_after, until_deadline, with_timeout_error};

/// Observable state of a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub connected: bool,
    pub authenticated: bool,
    /// Read/connect/write timeout; zero disables it
    pub timeout: Duration,
    pub last_error: Option<ErrorKind>,
}

/// A single TCP connection to a master server
#[derive(Debug)]
pub struct TransportSession {
    addr: String,
    stream: Option<BufReader<TcpStream>>,
    state: SessionState,
    /// Set once a connection has been opened; tells closed from never-opened
    opened: bool,
}

impl TransportSession {
    /// Create an unconnected session for `addr` (`host:port`)
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            stream: None,
            state: SessionState {
                connected: false,
                authenticated: false,
                timeout,
                last_error: None,
            },
            opened: false,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.address.clone(), config.timeout)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.authenticated
    }

    pub fn timeout(&self) -> Duration {
        self.state.timeout
    }

    /// Change the timeout used by subsequent operations
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.state.timeout = timeout;
    }

    /// Most recent error, left in place
    pub fn last_error(&self) -> Option<ErrorKind> {
        self.state.last_error
    }

    /// Return and clear the most recent error
    pub fn check_error(&mut self) -> Option<ErrorKind> {
        self.state.last_error.take()
    }

    pub(crate) fn record_error(&mut self, kind: ErrorKind) {
        self.state.last_error = Some(kind);
    }

    pub(crate) fn mark_authenticated(&mut self) {
        self.state.authenticated = true;
    }

    /// Open the connection. A failed attempt resets the socket once before
    /// giving up.
    #[instrument(skip(self), fields(addr = %self.addr))]
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            self.disconnect();
        }
        self.state.last_error = None;

        match self.open_stream().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Connect failed, resetting socket");
                self.reset_socket().await
            }
        }
    }

    /// Close the connection. Safe to call on a closed session.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            global_metrics().connection_closed();
            debug!(addr = %self.addr, "Disconnected");
        }
        self.state.connected = false;
        self.state.authenticated = false;
        self.state.last_error = None;
    }

    /// Drop the current socket and open a fresh one
    #[instrument(skip(self), fields(addr = %self.addr))]
    pub async fn reset_socket(&mut self) -> Result<()> {
        self.disconnect();
        match self.open_stream().await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "Unable to reopen socket");
                global_metrics().connection_error();
                self.state.last_error = Some(e.kind().unwrap_or(ErrorKind::SocketFailure));
                Err(e)
            }
        }
    }

    async fn open_stream(&mut self) -> Result<()> {
        let addr = self.addr.clone();
        let stream = with_timeout_error(
            async move {
                TcpStream::connect(addr.as_str())
                    .await
                    .map_err(ProtocolError::from_socket)
            },
            self.state.timeout,
        )
        .await?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "Unable to set TCP_NODELAY");
        }

        self.stream = Some(BufReader::new(stream));
        self.opened = true;
        self.state.connected = true;
        self.state.authenticated = false;
        global_metrics().connection_established();
        info!(addr = %self.addr, "Connected to master server");
        Ok(())
    }

    /// Read up to `n` bytes before `timeout` elapses (zero waits forever).
    ///
    /// Returns whatever arrived; a result shorter than `n` means the read
    /// failed and the cause is in [`last_error`](Self::last_error).
    pub async fn read_raw(&mut self, n: usize, timeout: Duration) -> Vec<u8> {
        let missing = self.missing_stream_kind();
        let Some(stream) = self.stream.as_mut() else {
            self.state.last_error = Some(missing);
            return Vec::new();
        };

        let deadline = deadline_after(timeout);
        let mut out = vec![0u8; n];
        let mut filled = 0;
        let mut failure = None;

        while filled < n {
            let chunk = &mut out[filled..];
            let read = until_deadline(
                async { stream.read(chunk).await.map_err(ProtocolError::from_socket) },
                deadline,
            )
            .await;

            match read {
                Ok(0) => {
                    failure = Some(ErrorKind::SocketClosed);
                    break;
                }
                Ok(k) => filled += k,
                Err(e) => {
                    failure = Some(e.kind().unwrap_or(ErrorKind::SocketFailure));
                    break;
                }
            }
        }

        if let Some(kind) = failure {
            debug!(wanted = n, got = filled, error = %kind, "{}", constants::ERR_SHORT_READ);
            self.state.last_error = Some(kind);
        }
        out.truncate(filled);
        out
    }

    /// Read one `u32-LE length || payload` frame.
    ///
    /// A declared length above 65535 drops the connection without reading
    /// the body.
    pub async fn read_frame(&mut self) -> Result<Vec<u8>> {
        if self.stream.is_none() {
            let kind = self.missing_stream_kind();
            self.state.last_error = Some(kind);
            return Err(kind.into());
        }
        self.state.last_error = None;
        let timeout = self.state.timeout;

        let raw_header = self.read_raw(FRAME_HEADER_LEN, timeout).await;
        if raw_header.len() < FRAME_HEADER_LEN {
            return Err(self.short_read_error());
        }

        let mut header = [0u8; FRAME_HEADER_LEN];
        header.copy_from_slice(&raw_header);
        let len = match parse_frame_header(header) {
            Ok(len) => len as usize,
            Err(e) => {
                error!(error = %e, "Frame header out of sync, dropping connection");
                global_metrics().protocol_error();
                self.disconnect();
                self.state.last_error = Some(ErrorKind::LengthOverflow);
                return Err(e);
            }
        };

        let body = self.read_raw(len, timeout).await;
        if body.len() < len {
            return Err(self.short_read_error());
        }

        global_metrics().frame_received((FRAME_HEADER_LEN + len) as u64);
        Ok(body)
    }

    /// Send `payload` behind its little-endian length
    pub async fn write_frame(&mut self, payload: &[u8]) -> Result<()> {
        let missing = self.missing_stream_kind();
        let Some(stream) = self.stream.as_mut() else {
            self.state.last_error = Some(missing);
            return Err(missing.into());
        };

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        FrameCodec.encode(payload, &mut buf)?;

        let sent = with_timeout_error(
            async {
                let socket = stream.get_mut();
                socket
                    .write_all(&buf)
                    .await
                    .map_err(ProtocolError::from_socket)?;
                socket.flush().await.map_err(ProtocolError::from_socket)
            },
            self.state.timeout,
        )
        .await;

        match sent {
            Ok(()) => {
                global_metrics().frame_sent(buf.len() as u64);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Frame write failed");
                global_metrics().connection_error();
                self.state.last_error = Some(e.kind().unwrap_or(ErrorKind::SocketFailure));
                Err(e)
            }
        }
    }

    /// Error for I/O without a socket: closed if one was ever opened
    fn missing_stream_kind(&self) -> ErrorKind {
        if self.opened {
            ErrorKind::SocketClosed
        } else {
            ErrorKind::SocketNotOpen
        }
    }

    fn short_read_error(&mut self) -> ProtocolError {
        let kind = *self.state.last_error.get_or_insert(ErrorKind::Timeout);
        if kind != ErrorKind::Timeout {
            global_metrics().connection_error();
        }
        ProtocolError::from(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn pair() -> (TransportSession, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let mut session = TransportSession::new(addr, Duration::from_millis(500));
        let (connected, accepted) = tokio::join!(session.connect(), listener.accept());
        connected.unwrap();
        (session, accepted.unwrap().0)
    }

    #[tokio::test]
    async fn test_unopened_session() {
        let mut session = TransportSession::new("127.0.0.1:1", Duration::from_millis(100));
        assert!(session.read_raw(4, Duration::ZERO).await.is_empty());
        assert_eq!(session.check_error(), Some(ErrorKind::SocketNotOpen));
        assert_eq!(session.last_error(), None);
        assert!(matches!(
            session.write_frame(b"x").await,
            Err(ProtocolError::SocketNotOpen)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (mut session, _peer) = pair().await;
        assert!(session.is_connected());
        session.disconnect();
        session.disconnect();
        assert!(!session.is_connected());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_read_raw_returns_partial_on_deadline() {
        let (mut session, mut peer) = pair().await;
        peer.write_all(&[1, 2]).await.unwrap();

        let got = session.read_raw(4, Duration::from_millis(100)).await;
        assert_eq!(got, vec![1, 2]);
        assert_eq!(session.last_error(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (mut session, mut peer) = pair().await;
        session.write_frame(b"hello").await.unwrap();

        let mut buf = [0u8; 9];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, &[5, 0, 0, 0, b'h', b'e', b'l', b'l', b'o']);

        peer.write_all(&[3, 0, 0, 0, b'a', b'b', b'c']).await.unwrap();
        assert_eq!(session.read_frame().await.unwrap(), b"abc");
    }

    #[tokio::test]
    async fn test_oversized_frame_disconnects() {
        let (mut session, mut peer) = pair().await;
        peer.write_all(&70_000u32.to_le_bytes()).await.unwrap();

        let err = session.read_frame().await.unwrap_err();
        assert!(matches!(err, ProtocolError::LengthOverflow(70_000)));
        assert!(!session.is_connected());
        assert_eq!(session.last_error(), Some(ErrorKind::LengthOverflow));
    }

    #[tokio::test]
    async fn test_io_after_disconnect_is_socket_closed() {
        let (mut session, _peer) = pair().await;
        session.disconnect();

        assert!(matches!(
            session.read_frame().await,
            Err(ProtocolError::SocketClosed)
        ));
        assert_eq!(session.check_error(), Some(ErrorKind::SocketClosed));

        assert!(session.read_raw(4, Duration::ZERO).await.is_empty());
        assert_eq!(session.check_error(), Some(ErrorKind::SocketClosed));

        assert!(matches!(
            session.write_frame(b"x").await,
            Err(ProtocolError::SocketClosed)
        ));
        assert_eq!(session.last_error(), Some(ErrorKind::SocketClosed));
    }

    #[tokio::test]
    async fn test_never_opened_read_frame_is_not_open() {
        let mut session = TransportSession::new("127.0.0.1:1", Duration::from_millis(100));
        assert!(matches!(
            session.read_frame().await,
            Err(ProtocolError::SocketNotOpen)
        ));
        assert_eq!(session.last_error(), Some(ErrorKind::SocketNotOpen));
    }

    #[tokio::test]
    async fn test_large_write_is_sent_whole() {
        let (mut session, mut peer) = pair().await;
        let payload = vec![0xAB; 70_000];

        let reader = tokio::spawn(async move {
            let mut header = [0u8; 4];
            peer.read_exact(&mut header).await.unwrap();
            let mut body = vec![0u8; u32::from_le_bytes(header) as usize];
            peer.read_exact(&mut body).await.unwrap();
            body
        });

        session.write_frame(&payload).await.unwrap();
        assert!(session.is_connected());
        assert_eq!(session.last_error(), None);
        assert_eq!(reader.await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_peer_close_is_socket_closed() {
        let (mut session, peer) = pair().await;
        drop(peer);
        let err = session.read_frame().await.unwrap_err();
        assert!(matches!(err, ProtocolError::SocketClosed));
    }

    #[tokio::test]
    async fn test_connect_refused_records_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let mut session = TransportSession::new(addr, Duration::from_millis(500));
        assert!(session.connect().await.is_err());
        assert!(!session.is_connected());
        assert!(session.last_error().is_some());
    }
}
