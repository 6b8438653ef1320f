//! # dot1x-eap
//!
//! The EAP layer of dot1x: the RFC 4137 peer and full-authenticator
//! state machines, and the peer-side methods they dispatch to
//! (Identity handling, MD5-Challenge, EAP-TLS with fragmentation per
//! RFC 5216/9190).
//!
//! Both machines are plain synchronous structs driven by `step()` calls
//! from the composite FSM runner; they signal the PAE layer through the
//! same boolean rendez-vous variables the standards name (`eapReq`,
//! `eapResp`, `aaaEapResp`, ...). Nothing here does I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod full_auth;
pub mod methods;
pub mod peer;

pub use full_auth::{EapAuthSm, EapAuthState};
pub use methods::{MethodState, PeerConfig, PeerDecision, PeerMethod};
pub use peer::{EapPeerSm, EapPeerState};
