//! # dot1x-types
//!
//! Shared types, errors, and data structures for the dot1x port access
//! control daemon.
//!
//! This crate provides the foundational types used across all dot1x
//! components: the error taxonomy, MAC address handling, per-port
//! parameters with their IEEE 802.1X managed-object ranges, and the
//! per-port counter and session statistics blocks.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod consts;
pub mod counters;
pub mod error;
pub mod net;
pub mod params;

pub use error::{Error, Result};
pub use net::MacAddress;
