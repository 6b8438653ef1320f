//! # dot1x-eapol
//!
//! EAPOL framing and EAP packet codec.
//!
//! Implements the wire formats of IEEE Std 802.1X-2010 §11 (EAPOL PDUs)
//! and RFC 3748 §4 (EAP packets). Parsing is strict about declared
//! lengths and tolerant of trailing padding, per the receive rules of
//! both standards; anything malformed comes back as a typed error so the
//! caller can bump the right counter and drop the frame silently.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod eap;
pub mod frame;

pub use eap::{
    build_failure, build_nak, build_request, build_response, build_success, next_id, EapCode,
    EapPacket, EapType, EAP_HEADER_LEN,
};
pub use frame::{EapolFrame, EapolPacketType, EAPOL_HEADER_LEN, EAPOL_VERSION};

use thiserror::Error;

/// Codec-level decode failures.
///
/// These never propagate past the receive path; they select which
/// counter gets incremented before the frame is discarded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The PDU is shorter than its fixed header.
    #[error("PDU shorter than header: {0} octets")]
    ShortHeader(usize),

    /// The received body is shorter than the declared body length.
    #[error("body length {declared} declared but only {received} octets received")]
    BodyTruncated {
        /// Length from the packet header.
        declared: usize,
        /// Octets actually present.
        received: usize,
    },

    /// The EAP length field is inconsistent with the received octets.
    #[error("EAP length {declared} exceeds received {received} octets")]
    EapTruncated {
        /// Length from the EAP header.
        declared: usize,
        /// Octets actually present.
        received: usize,
    },

    /// The EAP length field is smaller than the EAP header itself.
    #[error("EAP length {0} smaller than header")]
    EapLengthUnderflow(usize),

    /// The packet type octet is not one this implementation handles.
    #[error("unrecognized EAPOL packet type {0}")]
    UnknownPacketType(u8),

    /// The EAP code octet is outside 1..=4.
    #[error("unrecognized EAP code {0}")]
    UnknownCode(u8),

    /// A Request/Response carried no Type octet.
    #[error("EAP request/response without a type octet")]
    MissingType,
}
