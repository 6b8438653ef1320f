//! # dot1x-daemon
//!
//! The runtime shell around the dot1x engine: endpoint abstractions for
//! the raw Ethernet and UDP sides (with pcap and tokio implementations),
//! the per-context worker task that multiplexes packets, the 1 Hz tick
//! and management requests, and the TOML daemon configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod endpoint;
pub mod error;
pub mod management;
pub mod worker;

pub use config::DaemonConfig;
pub use error::{DaemonError, Result};
pub use worker::{AuthWorker, SuppWorker, WorkerHandle};
