use tracing::{debug, info, instrument, warn};

use crate::config::{ClientConfig, DEFAULT_QUERY_HEADER};
use crate::core::record::ServerRecord;
use crate::error::Result;
use crate::protocol::credential::Credential;
use crate::protocol::handshake::AuthHandshake;
use crate::protocol::query::{build_query, QueryFilter, ResponseHeader};
use crate::transport::TransportSession;
use crate::utils::metrics::{global_metrics, Timer};

/// Query client for a master server.
///
/// Each query runs a full cycle on the owned session: connect and
/// authenticate when needed, send the request, collect the listed records,
/// then disconnect. The master server closes the connection after one
/// query, so the next call starts over with a fresh handshake.
///
/// # Example
/// ```ignore
/// let config = MasterConfig::from_env()?;
/// let mut client = MasterClient::from_config(&config.client)?;
/// for server in client.query("gametype", "xDeathMatch").await? {
///     println!("{server}");
/// }
/// ```
#[derive(Debug)]
pub struct MasterClient {
    session: TransportSession,
    credential: Credential,
    query_header: u16,
    last_response: Option<ResponseHeader>,
}

impl MasterClient {
    pub fn new(session: TransportSession, credential: Credential) -> Self {
        Self {
            session,
            credential,
            query_header: DEFAULT_QUERY_HEADER,
            last_response: None,
        }
    }

    /// Build a client from configuration, loading the credential file it names
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let credential = Credential::from_file(&config.credential_file)?;
        Ok(Self::with_credential(config, credential))
    }

    /// Build a client from configuration with an already loaded credential
    pub fn with_credential(config: &ClientConfig, credential: Credential) -> Self {
        Self {
            query_header: config.query_header,
            ..Self::new(TransportSession::from_config(config), credential)
        }
    }

    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TransportSession {
        &mut self.session
    }

    /// Header of the most recent query response
    pub fn last_response(&self) -> Option<ResponseHeader> {
        self.last_response
    }

    /// Connect if needed and run the handshake, unless already authenticated
    pub async fn authenticate(&mut self) -> Result<()> {
        if self.session.is_authenticated() {
            return Ok(());
        }
        AuthHandshake::new(&self.credential)
            .run(&mut self.session)
            .await
    }

    /// List servers where `query_type == query_value`.
    ///
    /// The result may hold fewer records than
    /// [`last_response`](Self::last_response) announced. Undecodable record
    /// frames are skipped, and a timeout or read failure partway through the
    /// batch ends it early with the records collected so far. In that case
    /// the cause stays in the session's
    /// [`last_error`](TransportSession::last_error). A length overflow or a
    /// closed socket fails the whole query.
    pub async fn query(&mut self, query_type: &str, query_value: &str) -> Result<Vec<ServerRecord>> {
        let header = self.query_header;
        self.query_with_header(query_type, query_value, header).await
    }

    /// Same as [`query`](Self::query) with an explicit request header
    #[instrument(skip(self), fields(addr = %self.session.addr()))]
    pub async fn query_with_header(
        &mut self,
        query_type: &str,
        query_value: &str,
        header: u16,
    ) -> Result<Vec<ServerRecord>> {
        let payload = build_query(header, query_type, query_value);
        self.run_query(&payload).await
    }

    /// List servers matching every term of `filter`; the result may be
    /// short in the same ways as [`query`](Self::query)
    #[instrument(skip_all, fields(addr = %self.session.addr(), terms = filter.terms().len()))]
    pub async fn query_filter(&mut self, filter: &QueryFilter) -> Result<Vec<ServerRecord>> {
        let payload = filter.to_payload()?;
        self.run_query(&payload).await
    }

    async fn run_query(&mut self, payload: &[u8]) -> Result<Vec<ServerRecord>> {
        let _timer = Timer::start("query");
        self.last_response = None;

        let result = self.exchange(payload).await;

        // The server hangs up after one cycle either way
        let failure = self.session.last_error();
        self.session.disconnect();
        let kind = match &result {
            Ok(records) => {
                info!(records = records.len(), "Query complete");
                failure
            }
            Err(e) => {
                warn!(error = %e, "Query failed");
                e.kind().or(failure)
            }
        };
        if let Some(kind) = kind {
            self.session.record_error(kind);
        }
        result
    }

    async fn exchange(&mut self, payload: &[u8]) -> Result<Vec<ServerRecord>> {
        self.authenticate().await?;

        global_metrics().query_issued();
        self.session.write_frame(payload).await?;

        let header = ResponseHeader::parse(&self.session.read_frame().await?)?;
        self.last_response = Some(header);
        debug!(count = header.count, extra = header.extra, "Query accepted");

        let mut records = Vec::with_capacity(header.count.min(4096) as usize);
        for index in 0..header.count {
            let frame = match self.session.read_frame().await {
                Ok(frame) => frame,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        received = records.len(),
                        expected = header.count,
                        error = %e,
                        "Record batch cut short"
                    );
                    break;
                }
            };
            match ServerRecord::decode(&frame) {
                Ok(record) => {
                    global_metrics().record_received(record.is_valid());
                    if !record.is_valid() {
                        debug!(index, server = %record, "Record missing trailer");
                    }
                    records.push(record);
                }
                Err(e) => {
                    warn!(index, error = %e, "Skipping undecodable record");
                    global_metrics().protocol_error();
                }
            }
        }
        Ok(records)
    }
}
