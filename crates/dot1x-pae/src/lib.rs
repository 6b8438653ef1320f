//! # dot1x-pae
//!
//! The per-port engine of dot1x: the IEEE 802.1X-2004 authenticator
//! state machines (PAE, backend authentication, reauthentication timer),
//! their supplicant mirrors, the composite FSM runner that drives every
//! machine to quiescence after each event, and the RADIUS pass-through
//! glue that bridges the EAP layer's `aaa*` variables to the wire codec.
//!
//! The engine is sans-io: inbound packets arrive through
//! `process_eapol`/`process_radius`, the 1 Hz tick through `tick`, and
//! outbound traffic accumulates in queues the caller drains after each
//! call. That keeps every state machine synchronous and directly
//! testable.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod authenticator;
pub mod observer;
pub mod output;
pub mod supplicant;

pub use authenticator::{
    AuthPaeState, AuthPort, AuthenticatorConfig, AuthenticatorContext, BackendState,
    ReauthTimerState,
};
pub use observer::PortObserver;
pub use output::{TxEapolFrame, TxRadiusDatagram};
pub use supplicant::{
    SuppBackendState, SuppPaeState, SuppPort, SupplicantConfig, SupplicantContext,
};
