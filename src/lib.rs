//! # master-query
//!
//! Async client for the legacy master-server protocol that multiplayer game
//! servers register with and that server browsers query.
//!
//! ## Architecture
//! - [`transport`]: one TCP connection with deadline-bounded reads and
//!   length-prefixed frames
//! - [`core`]: frame codec, nested string framing, server record decoding
//! - [`protocol`]: credential, challenge/response handshake, query payloads
//! - [`service`]: [`MasterClient`], one call per query cycle
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging,
//!   metrics and timeouts
//!
//! ## Quick Start
//! ```no_run
//! use master_query::{MasterClient, MasterConfig};
//!
//! # async fn run() -> master_query::Result<()> {
//! let config = MasterConfig::from_env()?;
//! master_query::init_logging(&config.logging);
//!
//! let mut client = MasterClient::from_config(&config.client)?;
//! for server in client.query("gametype", "xDeathMatch").await? {
//!     println!("{server}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::{ClientConfig, LoggingConfig, MasterConfig};
pub use core::record::{ServerFlag, ServerFlags, ServerRecord};
pub use error::{ErrorKind, ProtocolError, Result};
pub use protocol::{Credential, QueryFilter, QueryTerm, ResponseHeader};
pub use service::MasterClient;
pub use transport::TransportSession;
pub use utils::logging::init_logging;
