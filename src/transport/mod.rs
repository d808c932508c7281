//! # Transport Layer
//!
//! TCP transport to the master server.
//!
//! The master server closes the connection after one query cycle, so a
//! session is short-lived: connect, authenticate, query once, disconnect.
//!
//! ## Components
//! - **Session**: one owned TCP connection with deadline-bounded reads and
//!   length-prefixed frame I/O

pub mod session;

pub use session::{SessionState, TransportSession};
