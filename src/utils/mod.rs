//! # Utility Modules
//!
//! Supporting utilities for timing, logging, and observability.
//!
//! ## Components
//! - **Timeout**: deadline helpers where a zero duration disables the timeout
//! - **Logging**: `tracing-subscriber` setup driven by [`LoggingConfig`](crate::config::LoggingConfig)
//! - **Metrics**: thread-safe counters for connections, handshakes, frames and records

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{global_metrics, Metrics, MetricsSnapshot};
