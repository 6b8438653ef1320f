//! # dot1x-radius
//!
//! RADIUS client codec for the 802.1X authenticator: Access-Request
//! construction with the RFC 3579 EAP attributes, and verification of
//! Access-Accept/Reject/Challenge replies (Response Authenticator per
//! RFC 2865 §3, Message-Authenticator per RFC 2869 §5.14).
//!
//! Verification failures are typed so the caller can log and silently
//! drop the datagram; nothing in here ever answers a bad packet.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod attribute;
pub mod packet;

pub use attribute::{AttributeIter, RADIUS_HEADER_LEN};
pub use packet::{AccessRequest, RadiusCode, RadiusReply, ReplyHeader};

use thiserror::Error;

/// RADIUS codec errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RadiusError {
    /// Datagram shorter than the RADIUS header or shorter than its
    /// declared length.
    #[error("datagram length {received} inconsistent with declared {declared}")]
    BadLength {
        /// Length from the packet header.
        declared: usize,
        /// Octets actually received.
        received: usize,
    },

    /// The code octet is not one a client expects.
    #[error("unexpected RADIUS code {0}")]
    UnexpectedCode(u8),

    /// An attribute header overruns the packet or declares length < 2.
    #[error("malformed attribute at offset {0}")]
    MalformedAttribute(usize),

    /// The Response Authenticator did not verify.
    #[error("response authenticator mismatch")]
    ResponseAuthenticator,

    /// The Message-Authenticator attribute is absent.
    #[error("missing Message-Authenticator attribute")]
    MissingMessageAuthenticator,

    /// The Message-Authenticator attribute did not verify.
    #[error("message authenticator mismatch")]
    MessageAuthenticator,

    /// The concatenated EAP-Message attributes do not hold a full EAP
    /// header.
    #[error("EAP message shorter than an EAP header: {0} octets")]
    ShortEapMessage(usize),

    /// Building a request would exceed the RADIUS length limit.
    #[error("request would exceed maximum RADIUS packet size")]
    RequestTooLarge,
}
