//! # Service Layer
//!
//! High-level entry point that ties the session, handshake and query
//! pieces into one call per query cycle.

pub mod client;

pub use client::MasterClient;
