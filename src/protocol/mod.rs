//! # Protocol Layer
//!
//! Authentication and query messages exchanged with the master server.
//!
//! ## Components
//! - **Credential**: loading and validating the client key
//! - **Handshake**: MD5 challenge/response reaching the authenticated state
//! - **Query**: request payloads and the response header
//!
//! ## Session Flow
//! ```text
//! connect -> challenge -> APPROVED -> VERIFIED -> query -> count -> N records -> closed
//! ```
//! The server closes the connection after one query, so every query needs a
//! fresh connect and handshake.

pub mod credential;
pub mod handshake;
pub mod query;


pub use credential::Credential;
pub use handshake::{AuthHandshake, HandshakeState};
pub use query::{build_query, QueryFilter, QueryTerm, ResponseHeader};
