//! State-change callbacks.

use dot1x_eap::{EapAuthState, EapPeerState};
use dot1x_types::params::PortStatus;

use crate::authenticator::{AuthPaeState, BackendState, ReauthTimerState};
use crate::supplicant::{SuppBackendState, SuppPaeState};

/// Observer notified after any state machine of a port changes state.
///
/// Every method has a no-op default so implementors subscribe only to
/// what they care about. Callbacks run inside the composite FSM loop;
/// keep them cheap.
#[allow(unused_variables)]
pub trait PortObserver: Send + Sync {
    /// Authenticator PAE state changed.
    fn on_pae_state(&self, port: u16, state: AuthPaeState) {}

    /// Backend authentication state changed.
    fn on_backend_state(&self, port: u16, state: BackendState) {}

    /// Reauthentication timer state changed.
    fn on_reauth_state(&self, port: u16, state: ReauthTimerState) {}

    /// EAP full-authenticator state changed.
    fn on_eap_auth_state(&self, port: u16, state: EapAuthState) {}

    /// Supplicant PAE state changed.
    fn on_supp_pae_state(&self, port: u16, state: SuppPaeState) {}

    /// Supplicant backend state changed.
    fn on_supp_backend_state(&self, port: u16, state: SuppBackendState) {}

    /// EAP peer state changed.
    fn on_eap_peer_state(&self, port: u16, state: EapPeerState) {}

    /// Controlled-port status changed.
    fn on_port_status(&self, port: u16, status: PortStatus) {}
}
